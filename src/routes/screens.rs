use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::Principal;
use crate::auth::policy::{Action, Resource};
use crate::db;
use crate::error::{conflict_on_unique, AppError};
use crate::middleware::audit;
use crate::models::{Screen, ScreenType};
use crate::routes::effective_set;
use crate::state::SharedState;

async fn load_active(pool: &PgPool, id: Uuid) -> Result<Screen, AppError> {
    db::screens::find_by_id(pool, id)
        .await?
        .filter(|s| s.audit.active)
        .ok_or_else(|| AppError::NotFound("Screen not found".to_string()))
}

async fn persist(pool: &PgPool, screen: &Screen) -> Result<Screen, AppError> {
    match db::screens::update(pool, screen).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::screens::find_by_id(pool, screen.id).await?.is_some() {
                Err(AppError::Conflict(
                    "Screen was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Screen not found".to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
pub struct CreateScreen {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ScreenType,
    pub module: Option<String>,
    pub route: Option<String>,
    pub component: Option<String>,
    #[serde(default)]
    pub public_access: bool,
    #[serde(default = "default_true")]
    pub auth_required: bool,
    #[serde(default)]
    pub required_permissions: Vec<String>,
}

fn default_true() -> bool {
    true
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<CreateScreen>,
) -> Result<Json<Screen>, AppError> {
    principal.authorize(Resource::Screen, Action::Create, None)?;

    if req.code.is_empty() || req.name.is_empty() {
        return Err(AppError::Validation(
            "code and name are required".to_string(),
        ));
    }
    if db::screens::exists_by_code(&state.pool, &req.code).await? {
        return Err(AppError::Conflict(format!(
            "Screen code already exists: {}",
            req.code
        )));
    }

    let screen = db::screens::create(
        &state.pool,
        &db::screens::NewScreen {
            code: &req.code,
            name: &req.name,
            description: req.description.as_deref(),
            kind: req.kind,
            module: req.module.as_deref(),
            route: req.route.as_deref(),
            component: req.component.as_deref(),
            public_access: req.public_access,
            auth_required: req.auth_required,
            required_permissions: req.required_permissions,
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A screen with this code already exists"))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "screen.created",
        "screen",
        Some(screen.id),
        None,
    )
    .await;

    Ok(Json(screen))
}

pub async fn list(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Screen>>, AppError> {
    principal.authorize(Resource::Screen, Action::Read, None)?;
    let screens = db::screens::list_all(&state.pool).await?;
    Ok(Json(screens))
}

/// The subset of screens the caller can open, by its effective permission
/// set. ADMIN is not special-cased here: an admin without the codes still
/// fails a screen's gate, matching what the frontend would enforce.
pub async fn accessible(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Screen>>, AppError> {
    principal.authorize(Resource::Screen, Action::Read, None)?;

    let granted = effective_set(&state.pool, &principal).await?;
    let screens = db::screens::list_all(&state.pool)
        .await?
        .into_iter()
        .filter(|s| s.accessible_by(&granted))
        .collect();
    Ok(Json(screens))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Screen>, AppError> {
    principal.authorize(Resource::Screen, Action::Read, None)?;
    let screen = load_active(&state.pool, id).await?;
    Ok(Json(screen))
}

/// Whether the caller clears this screen's gate.
pub async fn check_access(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Screen, Action::Read, None)?;

    let screen = load_active(&state.pool, id).await?;
    let granted = effective_set(&state.pool, &principal).await?;
    Ok(Json(serde_json::json!({
        "accessible": screen.accessible_by(&granted),
    })))
}

#[derive(Deserialize)]
pub struct UpdateScreen {
    pub name: Option<String>,
    pub description: Option<String>,
    pub module: Option<String>,
    pub route: Option<String>,
    pub component: Option<String>,
    pub public_access: Option<bool>,
    pub auth_required: Option<bool>,
    pub required_permissions: Option<Vec<String>>,
    pub active: Option<bool>,
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateScreen>,
) -> Result<Json<Screen>, AppError> {
    principal.authorize(Resource::Screen, Action::Update, None)?;

    let mut screen = load_active(&state.pool, id).await?;

    if let Some(name) = req.name {
        screen.name = name;
    }
    if let Some(description) = req.description {
        screen.description = Some(description);
    }
    if let Some(module) = req.module {
        screen.module = Some(module);
    }
    if let Some(route) = req.route {
        screen.route = Some(route);
    }
    if let Some(component) = req.component {
        screen.component = Some(component);
    }
    if let Some(public_access) = req.public_access {
        screen.public_access = public_access;
    }
    if let Some(auth_required) = req.auth_required {
        screen.auth_required = auth_required;
    }
    if let Some(required_permissions) = req.required_permissions {
        screen.required_permissions = required_permissions;
    }
    if let Some(active) = req.active {
        screen.audit.active = active;
    }

    let updated = persist(&state.pool, &screen).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "screen.updated",
        "screen",
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
    principal.authorize(Resource::Screen, Action::Delete, None)?;

    if !db::screens::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Screen not found".to_string()));
    }

    audit::log_event(
        &state.pool,
        &principal.username,
        "screen.deleted",
        "screen",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
