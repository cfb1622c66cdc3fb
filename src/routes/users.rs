use std::sync::LazyLock;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::Principal;
use crate::auth::policy::{Action, Resource};
use crate::db;
use crate::error::{conflict_on_unique, AppError};
use crate::middleware::audit;
use crate::models::{Role, User, UserStatus};
use crate::state::SharedState;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

fn validate_email(email: &str) -> Result<(), AppError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email address".to_string()))
    }
}

/// Resolve an id to an existing, non-soft-deleted user.
async fn load_active(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    db::users::find_by_id(pool, id)
        .await?
        .filter(|u| u.audit.active)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Write back a mutated user. A missed compare-and-swap on the version
/// counter is a Conflict when the row still exists, NotFound otherwise.
async fn persist(pool: &PgPool, user: &User) -> Result<User, AppError> {
    match db::users::update(pool, user).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::users::find_by_id(pool, user.id).await?.is_some() {
                Err(AppError::Conflict(
                    "User was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("User not found".to_string()))
            }
        }
    }
}

async fn check_unique(
    pool: &PgPool,
    username: Option<&str>,
    email: Option<&str>,
    external_id: Option<&str>,
) -> Result<(), AppError> {
    if let Some(username) = username {
        if db::users::exists_by_username(pool, username).await? {
            return Err(AppError::Conflict(format!(
                "Username already exists: {username}"
            )));
        }
    }
    if let Some(email) = email {
        if db::users::exists_by_email(pool, email).await? {
            return Err(AppError::Conflict(format!("Email already exists: {email}")));
        }
    }
    if let Some(external_id) = external_id {
        if db::users::exists_by_external_id(pool, external_id).await? {
            return Err(AppError::Conflict(format!(
                "External identity already linked: {external_id}"
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub external_id: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<CreateUser>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::Create, None)?;

    if req.username.is_empty()
        || req.email.is_empty()
        || req.first_name.is_empty()
        || req.last_name.is_empty()
    {
        return Err(AppError::Validation(
            "username, email, first_name and last_name are required".to_string(),
        ));
    }
    validate_email(&req.email)?;

    check_unique(
        &state.pool,
        Some(&req.username),
        Some(&req.email),
        req.external_id.as_deref(),
    )
    .await?;

    let user = db::users::create(
        &state.pool,
        &db::users::NewUser {
            username: &req.username,
            email: &req.email,
            first_name: &req.first_name,
            last_name: &req.last_name,
            phone_number: req.phone_number.as_deref(),
            external_id: req.external_id.as_deref(),
            department: req.department.as_deref(),
            position: req.position.as_deref(),
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A user with this username or email already exists"))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.created",
        "user",
        Some(user.id),
        None,
    )
    .await;

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub status: Option<UserStatus>,
}

pub async fn list(
    principal: Principal,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::Read, None)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let params = db::users::ListParams {
        limit: per_page,
        offset: (page - 1) * per_page,
        sort_by: db::users::SortColumn::parse(query.sort_by.as_deref().unwrap_or("created_at")),
        sort_order: db::users::SortOrder::parse(query.sort_order.as_deref().unwrap_or("desc")),
        search: query.search.clone(),
        status: query.status,
    };

    let users = db::users::list(&state.pool, &params).await?;
    let total = db::users::count(&state.pool, query.status, query.search.as_deref()).await?;

    Ok(Json(serde_json::json!({
        "users": users,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

pub async fn me(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<User>, AppError> {
    let user = db::users::find_by_username(&state.pool, &principal.username)
        .await?
        .filter(|u| u.audit.active)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = load_active(&state.pool, id).await?;
    principal.authorize(Resource::User, Action::Read, Some(&user.username))?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    /// Advisory workflow label; PENDING and SUSPENDED are reachable only
    /// through this administrative setter.
    pub status: Option<UserStatus>,
}

async fn apply_update(
    state: &SharedState,
    principal: &Principal,
    mut user: User,
    req: UpdateUser,
) -> Result<User, AppError> {
    // Uniqueness checks run before anything is written.
    let new_username = req.username.filter(|u| *u != user.username);
    let new_email = req.email.filter(|e| *e != user.email);
    if let Some(email) = &new_email {
        validate_email(email)?;
    }
    check_unique(
        &state.pool,
        new_username.as_deref(),
        new_email.as_deref(),
        None,
    )
    .await?;

    if let Some(username) = new_username {
        user.username = username;
    }
    if let Some(email) = new_email {
        user.email = email;
    }
    if let Some(first_name) = req.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name;
    }
    if let Some(phone_number) = req.phone_number {
        user.phone_number = Some(phone_number);
    }
    if let Some(department) = req.department {
        user.department = Some(department);
    }
    if let Some(position) = req.position {
        user.position = Some(position);
    }
    if let Some(status) = req.status {
        user.status = status;
    }

    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.updated",
        "user",
        Some(updated.id),
        None,
    )
    .await;

    Ok(updated)
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUser>,
) -> Result<Json<User>, AppError> {
    let user = load_active(&state.pool, id).await?;
    principal.authorize(Resource::User, Action::Update, Some(&user.username))?;
    let updated = apply_update(&state, &principal, user, req).await?;
    Ok(Json(updated))
}

pub async fn update_me(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<UpdateUser>,
) -> Result<Json<User>, AppError> {
    let user = db::users::find_by_username(&state.pool, &principal.username)
        .await?
        .filter(|u| u.audit.active)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let updated = apply_update(&state, &principal, user, req).await?;
    Ok(Json(updated))
}

pub async fn delete(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::Delete, None)?;

    if !db::users::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.deleted",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

pub async fn soft_delete(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::SoftDelete, None)?;

    let mut user = load_active(&state.pool, id).await?;
    user.deactivate();
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.deactivated",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(updated))
}

pub async fn activate(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::Activate, None)?;

    // Reactivation must reach soft-deleted records.
    let mut user = db::users::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    user.activate();
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.activated",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(updated))
}

pub async fn deactivate(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::Deactivate, None)?;

    let mut user = load_active(&state.pool, id).await?;
    user.deactivate();
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.deactivated",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct LockQuery {
    pub until: DateTime<Utc>,
}

pub async fn lock(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LockQuery>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::Lock, None)?;

    if query.until <= Utc::now() {
        return Err(AppError::Validation(
            "Lock expiry must be in the future".to_string(),
        ));
    }

    let mut user = load_active(&state.pool, id).await?;
    user.lock(query.until);
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.locked",
        "user",
        Some(id),
        Some(serde_json::json!({ "until": query.until })),
    )
    .await;

    Ok(Json(updated))
}

pub async fn unlock(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::Unlock, None)?;

    let mut user = load_active(&state.pool, id).await?;
    user.unlock();
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.unlocked",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(updated))
}

pub async fn verify_email(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let mut user = load_active(&state.pool, id).await?;
    principal.authorize(Resource::User, Action::VerifyEmail, Some(&user.username))?;

    user.verify_email();
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.email_verified",
        "user",
        Some(id),
        None,
    )
    .await;

    Ok(Json(updated))
}

/// Called by the identity-sync path on a failed authentication. Counts the
/// attempt and applies the configured lockout once the threshold is hit.
pub async fn record_login_failure(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::RecordLogin, None)?;

    let mut user = load_active(&state.pool, id).await?;
    user.increment_login_attempts();
    if user.login_attempts >= state.config.max_login_attempts && !user.is_locked() {
        user.lock(Utc::now() + Duration::minutes(state.config.lock_minutes));
    }
    let updated = persist(&state.pool, &user).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.login_failed",
        "user",
        Some(id),
        Some(serde_json::json!({ "attempts": updated.login_attempts })),
    )
    .await;

    Ok(Json(updated))
}

/// Called by the identity-sync path on a successful authentication.
pub async fn record_login_success(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    principal.authorize(Resource::User, Action::RecordLogin, None)?;

    let mut user = load_active(&state.pool, id).await?;
    if user.is_locked() {
        return Err(AppError::Conflict("User account is locked".to_string()));
    }
    user.update_last_login();
    let updated = persist(&state.pool, &user).await?;

    Ok(Json(updated))
}

pub async fn list_roles(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Role>>, AppError> {
    let user = load_active(&state.pool, id).await?;
    principal.authorize(Resource::User, Action::Read, Some(&user.username))?;

    let roles = db::users::roles_of(&state.pool, user.id).await?;
    Ok(Json(roles))
}

async fn load_active_role(pool: &PgPool, role_id: Uuid) -> Result<Role, AppError> {
    db::roles::find_by_id(pool, role_id)
        .await?
        .filter(|r| r.audit.active)
        .ok_or_else(|| AppError::NotFound(format!("Role not found: {role_id}")))
}

pub async fn assign_role(
    principal: Principal,
    State(state): State<SharedState>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::AssignRole, None)?;

    let user = load_active(&state.pool, id).await?;
    let role = load_active_role(&state.pool, role_id).await?;

    db::users::add_role(&state.pool, user.id, role.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.role_assigned",
        "user",
        Some(user.id),
        Some(serde_json::json!({ "role": role.code })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Role assigned" })))
}

/// All-or-nothing: every role id is resolved before the first write, so
/// one bad id leaves the user's role set untouched.
pub async fn assign_roles(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(role_ids): Json<Vec<Uuid>>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::AssignRole, None)?;

    let user = load_active(&state.pool, id).await?;

    let mut resolved = Vec::with_capacity(role_ids.len());
    for role_id in &role_ids {
        resolved.push(load_active_role(&state.pool, *role_id).await?.id);
    }

    db::users::add_roles(&state.pool, user.id, &resolved).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.roles_assigned",
        "user",
        Some(user.id),
        Some(serde_json::json!({ "count": resolved.len() })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Roles assigned" })))
}

pub async fn remove_role(
    principal: Principal,
    State(state): State<SharedState>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::RemoveRole, None)?;

    let user = load_active(&state.pool, id).await?;
    let role = db::roles::find_by_id(&state.pool, role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Role not found: {role_id}")))?;

    db::users::remove_role(&state.pool, user.id, role.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.role_removed",
        "user",
        Some(user.id),
        Some(serde_json::json!({ "role": role.code })),
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Role removed" })))
}

pub async fn remove_all_roles(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::RemoveAllRoles, None)?;

    let user = load_active(&state.pool, id).await?;
    db::users::remove_all_roles(&state.pool, user.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "user.all_roles_removed",
        "user",
        Some(user.id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "All roles removed" })))
}

pub async fn statistics(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::Inspect, None)?;

    let active = db::users::count_by_status(&state.pool, UserStatus::Active).await?;
    let inactive = db::users::count_by_status(&state.pool, UserStatus::Inactive).await?;
    let locked = db::users::count_by_status(&state.pool, UserStatus::Locked).await?;

    Ok(Json(serde_json::json!({
        "active_users": active,
        "inactive_users": inactive,
        "locked_users": locked,
    })))
}

pub async fn list_locked(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<Vec<User>>, AppError> {
    principal.authorize(Resource::User, Action::Inspect, None)?;
    let users = db::users::list_locked(&state.pool).await?;
    Ok(Json(users))
}

pub async fn check_username(
    principal: Principal,
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::Inspect, None)?;
    let exists = db::users::exists_by_username(&state.pool, &username).await?;
    Ok(Json(serde_json::json!({ "exists": exists })))
}

pub async fn check_email(
    principal: Principal,
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::User, Action::Inspect, None)?;
    let exists = db::users::exists_by_email(&state.pool, &email).await?;
    Ok(Json(serde_json::json!({ "exists": exists })))
}
