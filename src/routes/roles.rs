use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::Principal;
use crate::auth::policy::{Action, Resource};
use crate::db;
use crate::error::{conflict_on_unique, AppError};
use crate::middleware::audit;
use crate::models::{Permission, Role, RoleDetail, User};
use crate::state::SharedState;

async fn load_active(pool: &PgPool, id: Uuid) -> Result<Role, AppError> {
    db::roles::find_by_id(pool, id)
        .await?
        .filter(|r| r.audit.active)
        .ok_or_else(|| AppError::NotFound("Role not found".to_string()))
}

async fn persist(pool: &PgPool, role: &Role) -> Result<Role, AppError> {
    match db::roles::update(pool, role).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::roles::find_by_id(pool, role.id).await?.is_some() {
                Err(AppError::Conflict(
                    "Role was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Role not found".to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    #[serde(default)]
    pub system_role: bool,
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<CreateRole>,
) -> Result<Json<Role>, AppError> {
    principal.authorize(Resource::Role, Action::Create, None)?;

    if req.name.is_empty() || req.code.is_empty() {
        return Err(AppError::Validation(
            "name and code are required".to_string(),
        ));
    }
    // Role codes are matched case-insensitively everywhere; store the
    // canonical uppercase form.
    let code = req.code.to_uppercase();

    if db::roles::find_by_code(&state.pool, &code).await?.is_some() {
        return Err(AppError::Conflict(format!("Role code already exists: {code}")));
    }

    let role = db::roles::create(
        &state.pool,
        &req.name,
        &code,
        req.description.as_deref(),
        req.system_role,
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A role with this name or code already exists"))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "role.created",
        "role",
        Some(role.id),
        None,
    )
    .await;

    Ok(Json(role))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

pub async fn list(
    principal: Principal,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Role, Action::Read, None)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let params = db::roles::ListParams {
        limit: per_page,
        offset: (page - 1) * per_page,
        search: query.search.clone(),
    };

    let roles = db::roles::list(&state.pool, &params).await?;
    let total = db::roles::count(&state.pool, query.search.as_deref()).await?;

    Ok(Json(serde_json::json!({
        "roles": roles,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleDetail>, AppError> {
    principal.authorize(Resource::Role, Action::Read, None)?;

    let role = load_active(&state.pool, id).await?;
    let permissions = db::roles::permissions_of(&state.pool, role.id).await?;
    Ok(Json(RoleDetail { role, permissions }))
}

pub async fn get_by_code(
    principal: Principal,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoleDetail>, AppError> {
    principal.authorize(Resource::Role, Action::Read, None)?;

    let role = db::roles::find_by_code(&state.pool, &code.to_uppercase())
        .await?
        .filter(|r| r.audit.active)
        .ok_or_else(|| AppError::NotFound(format!("Role not found: {code}")))?;
    let permissions = db::roles::permissions_of(&state.pool, role.id).await?;
    Ok(Json(RoleDetail { role, permissions }))
}

#[derive(Deserialize)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRole>,
) -> Result<Json<Role>, AppError> {
    principal.authorize(Resource::Role, Action::Update, None)?;

    let mut role = load_active(&state.pool, id).await?;
    if role.system_role && req.active == Some(false) {
        return Err(AppError::Conflict(
            "System roles cannot be deactivated".to_string(),
        ));
    }

    if let Some(name) = req.name {
        role.name = name;
    }
    if let Some(description) = req.description {
        role.description = Some(description);
    }
    if let Some(active) = req.active {
        role.audit.active = active;
    }

    let updated = persist(&state.pool, &role).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "role.updated",
        "role",
        Some(updated.id),
        None,
    )
    .await;

    Ok(Json(updated))
}

pub async fn delete(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Role, Action::Delete, None)?;

    let role = db::roles::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;
    if role.system_role {
        return Err(AppError::Conflict(
            "System roles cannot be deleted".to_string(),
        ));
    }

    db::roles::delete(&state.pool, id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "role.deleted",
        "role",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

pub async fn list_permissions(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Permission>>, AppError> {
    principal.authorize(Resource::Role, Action::Read, None)?;

    let role = load_active(&state.pool, id).await?;
    let permissions = db::roles::permissions_of(&state.pool, role.id).await?;
    Ok(Json(permissions))
}

pub async fn check_permission(
    principal: Principal,
    State(state): State<SharedState>,
    Path((id, code)): Path<(Uuid, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Role, Action::Read, None)?;

    let role = load_active(&state.pool, id).await?;
    let granted = db::roles::has_permission(&state.pool, role.id, &code).await?;
    Ok(Json(serde_json::json!({ "granted": granted })))
}

pub async fn assign_permission(
    principal: Principal,
    State(state): State<SharedState>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Role, Action::AssignPermission, None)?;

    let role = load_active(&state.pool, id).await?;
    let permission = db::permissions::find_by_id(&state.pool, permission_id)
        .await?
        .filter(|p| p.audit.active)
        .ok_or_else(|| AppError::NotFound(format!("Permission not found: {permission_id}")))?;

    db::roles::add_permission(&state.pool, role.id, permission.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "role.permission_assigned",
        "role",
        Some(role.id),
        Some(serde_json::json!({ "permission": permission.code })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Permission assigned" })))
}

pub async fn remove_permission(
    principal: Principal,
    State(state): State<SharedState>,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Role, Action::RemovePermission, None)?;

    let role = load_active(&state.pool, id).await?;
    let permission = db::permissions::find_by_id(&state.pool, permission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Permission not found: {permission_id}")))?;

    db::roles::remove_permission(&state.pool, role.id, permission.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "role.permission_removed",
        "role",
        Some(role.id),
        Some(serde_json::json!({ "permission": permission.code })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Permission removed" })))
}

pub async fn remove_all_permissions(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Role, Action::RemoveAllPermissions, None)?;

    let role = load_active(&state.pool, id).await?;
    db::roles::remove_all_permissions(&state.pool, role.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "role.all_permissions_removed",
        "role",
        Some(role.id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "All permissions removed" })))
}

pub async fn list_users(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<User>>, AppError> {
    principal.authorize(Resource::Role, Action::Read, None)?;

    let role = load_active(&state.pool, id).await?;
    let users = db::roles::users_of(&state.pool, role.id).await?;
    Ok(Json(users))
}
