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
use crate::models::{Permission, PermissionType, Role};
use crate::state::SharedState;

async fn load_active(pool: &PgPool, id: Uuid) -> Result<Permission, AppError> {
    db::permissions::find_by_id(pool, id)
        .await?
        .filter(|p| p.audit.active)
        .ok_or_else(|| AppError::NotFound("Permission not found".to_string()))
}

async fn persist(pool: &PgPool, permission: &Permission) -> Result<Permission, AppError> {
    match db::permissions::update(pool, permission).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::permissions::find_by_id(pool, permission.id).await?.is_some() {
                Err(AppError::Conflict(
                    "Permission was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Permission not found".to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
pub struct CreatePermission {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub system_permission: bool,
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<CreatePermission>,
) -> Result<Json<Permission>, AppError> {
    principal.authorize(Resource::Permission, Action::Create, None)?;

    if req.code.is_empty() || req.name.is_empty() || req.resource.is_empty() || req.action.is_empty()
    {
        return Err(AppError::Validation(
            "code, name, resource and action are required".to_string(),
        ));
    }

    if db::permissions::exists_by_code(&state.pool, &req.code).await? {
        return Err(AppError::Conflict(format!(
            "Permission code already exists: {}",
            req.code
        )));
    }

    let permission = db::permissions::create(
        &state.pool,
        &db::permissions::NewPermission {
            code: &req.code,
            name: &req.name,
            description: req.description.as_deref(),
            kind: req.kind,
            resource: &req.resource,
            action: &req.action,
            system_permission: req.system_permission,
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A permission with this code already exists"))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "permission.created",
        "permission",
        Some(permission.id),
        None,
    )
    .await;

    Ok(Json(permission))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<PermissionType>,
    pub resource: Option<String>,
}

pub async fn list(
    principal: Principal,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Permission, Action::Read, None)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let params = db::permissions::ListParams {
        limit: per_page,
        offset: (page - 1) * per_page,
        kind: query.kind,
        resource: query.resource.clone(),
    };

    let permissions = db::permissions::list(&state.pool, &params).await?;
    let total =
        db::permissions::count(&state.pool, query.kind, query.resource.as_deref()).await?;

    Ok(Json(serde_json::json!({
        "permissions": permissions,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Permission>, AppError> {
    principal.authorize(Resource::Permission, Action::Read, None)?;
    let permission = load_active(&state.pool, id).await?;
    Ok(Json(permission))
}

pub async fn get_by_code(
    principal: Principal,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<Permission>, AppError> {
    principal.authorize(Resource::Permission, Action::Read, None)?;

    let permission = db::permissions::find_by_code(&state.pool, &code)
        .await?
        .filter(|p| p.audit.active)
        .ok_or_else(|| AppError::NotFound(format!("Permission not found: {code}")))?;
    Ok(Json(permission))
}

#[derive(Deserialize)]
pub struct UpdatePermission {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePermission>,
) -> Result<Json<Permission>, AppError> {
    principal.authorize(Resource::Permission, Action::Update, None)?;

    let mut permission = load_active(&state.pool, id).await?;
    if permission.system_permission && req.active == Some(false) {
        return Err(AppError::Conflict(
            "System permissions cannot be deactivated".to_string(),
        ));
    }

    if let Some(name) = req.name {
        permission.name = name;
    }
    if let Some(description) = req.description {
        permission.description = Some(description);
    }
    if let Some(active) = req.active {
        permission.audit.active = active;
    }

    let updated = persist(&state.pool, &permission).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "permission.updated",
        "permission",
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
    principal.authorize(Resource::Permission, Action::Delete, None)?;

    let permission = db::permissions::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Permission not found".to_string()))?;
    if permission.system_permission {
        return Err(AppError::Conflict(
            "System permissions cannot be deleted".to_string(),
        ));
    }

    db::permissions::delete(&state.pool, id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "permission.deleted",
        "permission",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

pub async fn list_roles(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Role>>, AppError> {
    principal.authorize(Resource::Permission, Action::Read, None)?;

    let permission = load_active(&state.pool, id).await?;
    let roles = db::permissions::roles_of(&state.pool, permission.id).await?;
    Ok(Json(roles))
}

/// The caller's own effective permission codes, derived from its roles.
pub async fn effective(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, AppError> {
    let roles: Vec<String> = principal.roles.iter().cloned().collect();
    let codes = db::permissions::effective_codes(&state.pool, &roles).await?;
    Ok(Json(codes))
}
