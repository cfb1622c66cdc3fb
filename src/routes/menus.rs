use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::Principal;
use crate::auth::policy::{Action, Resource, ADMIN};
use crate::db;
use crate::error::{conflict_on_unique, AppError};
use crate::middleware::audit;
use crate::models::{build_tree, Menu, MenuNode};
use crate::routes::effective_set;
use crate::state::SharedState;

async fn load_active(pool: &PgPool, id: Uuid) -> Result<Menu, AppError> {
    db::menus::find_by_id(pool, id)
        .await?
        .filter(|m| m.audit.active)
        .ok_or_else(|| AppError::NotFound("Menu not found".to_string()))
}

async fn persist(pool: &PgPool, menu: &Menu) -> Result<Menu, AppError> {
    match db::menus::update(pool, menu).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::menus::find_by_id(pool, menu.id).await?.is_some() {
                Err(AppError::Conflict(
                    "Menu was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Menu not found".to_string()))
            }
        }
    }
}

/// Levels are derived from the parent chain, never accepted from the client.
async fn level_for(pool: &PgPool, parent_id: Option<Uuid>) -> Result<i32, AppError> {
    match parent_id {
        None => Ok(0),
        Some(pid) => {
            let parent = load_active(pool, pid).await?;
            Ok(parent.level + 1)
        }
    }
}

#[derive(Deserialize)]
pub struct CreateMenu {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    pub parent_id: Option<Uuid>,
    pub required_permission: Option<String>,
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<CreateMenu>,
) -> Result<Json<Menu>, AppError> {
    principal.authorize(Resource::Menu, Action::Create, None)?;

    if req.code.is_empty() || req.name.is_empty() {
        return Err(AppError::Validation(
            "code and name are required".to_string(),
        ));
    }
    if db::menus::exists_by_code(&state.pool, &req.code).await? {
        return Err(AppError::Conflict(format!(
            "Menu code already exists: {}",
            req.code
        )));
    }

    let level = level_for(&state.pool, req.parent_id).await?;

    let menu = db::menus::create(
        &state.pool,
        &db::menus::NewMenu {
            code: &req.code,
            name: &req.name,
            description: req.description.as_deref(),
            url: req.url.as_deref(),
            icon: req.icon.as_deref(),
            display_order: req.display_order,
            parent_id: req.parent_id,
            required_permission: req.required_permission.as_deref(),
            level,
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A menu with this code already exists"))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "menu.created",
        "menu",
        Some(menu.id),
        None,
    )
    .await;

    Ok(Json(menu))
}

/// Flat listing, narrowed to what the caller is allowed to see. ADMIN sees
/// the whole catalog.
pub async fn list(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Menu>>, AppError> {
    principal.authorize(Resource::Menu, Action::Read, None)?;

    let menus = db::menus::list_all(&state.pool).await?;
    if principal.has_role(ADMIN) {
        return Ok(Json(menus));
    }

    let granted = effective_set(&state.pool, &principal).await?;
    let visible = menus.into_iter().filter(|m| m.visible_to(&granted)).collect();
    Ok(Json(visible))
}

/// The caller's navigation tree: visibility filtering first, then assembly,
/// so children of a hidden parent disappear with it.
pub async fn tree(
    principal: Principal,
    State(state): State<SharedState>,
) -> Result<Json<Vec<MenuNode>>, AppError> {
    principal.authorize(Resource::Menu, Action::Read, None)?;

    let menus = db::menus::list_all(&state.pool).await?;
    let filtered = if principal.has_role(ADMIN) {
        menus
    } else {
        let granted = effective_set(&state.pool, &principal).await?;
        menus.into_iter().filter(|m| m.visible_to(&granted)).collect()
    };

    Ok(Json(build_tree(filtered)))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Menu>, AppError> {
    principal.authorize(Resource::Menu, Action::Read, None)?;
    let menu = load_active(&state.pool, id).await?;
    Ok(Json(menu))
}

#[derive(Deserialize)]
pub struct UpdateMenu {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub display_order: Option<i32>,
    pub visible: Option<bool>,
    pub parent_id: Option<Option<Uuid>>,
    pub required_permission: Option<Option<String>>,
    pub active: Option<bool>,
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMenu>,
) -> Result<Json<Menu>, AppError> {
    principal.authorize(Resource::Menu, Action::Update, None)?;

    let mut menu = load_active(&state.pool, id).await?;

    if let Some(name) = req.name {
        menu.name = name;
    }
    if let Some(description) = req.description {
        menu.description = Some(description);
    }
    if let Some(url) = req.url {
        menu.url = Some(url);
    }
    if let Some(icon) = req.icon {
        menu.icon = Some(icon);
    }
    if let Some(display_order) = req.display_order {
        menu.display_order = display_order;
    }
    if let Some(visible) = req.visible {
        menu.visible = visible;
    }
    if let Some(parent_id) = req.parent_id {
        if parent_id == Some(menu.id) {
            return Err(AppError::Validation(
                "A menu cannot be its own parent".to_string(),
            ));
        }
        menu.level = level_for(&state.pool, parent_id).await?;
        menu.parent_id = parent_id;
    }
    if let Some(required_permission) = req.required_permission {
        menu.required_permission = required_permission;
    }
    if let Some(active) = req.active {
        menu.audit.active = active;
    }

    let updated = persist(&state.pool, &menu).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "menu.updated",
        "menu",
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
    principal.authorize(Resource::Menu, Action::Delete, None)?;

    // Children are re-rooted by the schema (parent_id set to NULL).
    if !db::menus::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Menu not found".to_string()));
    }

    audit::log_event(
        &state.pool,
        &principal.username,
        "menu.deleted",
        "menu",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
