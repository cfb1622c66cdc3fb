use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::Principal;
use crate::auth::policy::{Action, Resource};
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::{ProfileType, User, UserProfile};
use crate::state::SharedState;

async fn load_active(pool: &PgPool, id: Uuid) -> Result<UserProfile, AppError> {
    db::profiles::find_by_id(pool, id)
        .await?
        .filter(|p| p.audit.active)
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

/// Profiles are owned records; the self-access branch needs the owning
/// user's username.
async fn owner_of(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
    db::users::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

async fn persist(pool: &PgPool, profile: &UserProfile) -> Result<UserProfile, AppError> {
    match db::profiles::update(pool, profile).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::profiles::find_by_id(pool, profile.id).await?.is_some() {
                Err(AppError::Conflict(
                    "Profile was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Profile not found".to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
pub struct CreateProfile {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ProfileType,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_object")]
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_object")]
    pub preferences: serde_json::Value,
    pub context: Option<String>,
}

fn default_object() -> serde_json::Value {
    serde_json::json!({})
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CreateProfile>,
) -> Result<Json<UserProfile>, AppError> {
    let user = owner_of(&state.pool, user_id).await?;
    principal.authorize(Resource::Profile, Action::Create, Some(&user.username))?;

    if req.name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let profile = db::profiles::create(
        &state.pool,
        &db::profiles::NewProfile {
            user_id: user.id,
            name: &req.name,
            description: req.description.as_deref(),
            kind: req.kind,
            is_public: req.is_public,
            attributes: req.attributes,
            permissions: req.permissions,
            preferences: req.preferences,
            context: req.context.as_deref(),
        },
    )
    .await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "profile.created",
        "profile",
        Some(profile.id),
        None,
    )
    .await;

    Ok(Json(profile))
}

pub async fn list_for_user(
    principal: Principal,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let user = owner_of(&state.pool, user_id).await?;
    principal.authorize(Resource::Profile, Action::Read, Some(&user.username))?;

    let profiles = db::profiles::list_by_user(&state.pool, user.id).await?;
    Ok(Json(profiles))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = load_active(&state.pool, id).await?;
    let user = owner_of(&state.pool, profile.user_id).await?;

    // Public profiles are readable by any authenticated principal.
    if !profile.is_public {
        principal.authorize(Resource::Profile, Action::Read, Some(&user.username))?;
    }
    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub attributes: Option<serde_json::Value>,
    pub permissions: Option<Vec<String>>,
    pub preferences: Option<serde_json::Value>,
    pub context: Option<String>,
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProfile>,
) -> Result<Json<UserProfile>, AppError> {
    let mut profile = load_active(&state.pool, id).await?;
    let user = owner_of(&state.pool, profile.user_id).await?;
    principal.authorize(Resource::Profile, Action::Update, Some(&user.username))?;

    if let Some(name) = req.name {
        profile.name = name;
    }
    if let Some(description) = req.description {
        profile.description = Some(description);
    }
    if let Some(is_public) = req.is_public {
        profile.is_public = is_public;
    }
    if let Some(attributes) = req.attributes {
        profile.attributes = attributes;
    }
    if let Some(permissions) = req.permissions {
        profile.permissions = permissions;
    }
    if let Some(preferences) = req.preferences {
        profile.preferences = preferences;
    }
    if let Some(context) = req.context {
        profile.context = Some(context);
    }

    let updated = persist(&state.pool, &profile).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "profile.updated",
        "profile",
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
    let profile = db::profiles::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let user = owner_of(&state.pool, profile.user_id).await?;
    principal.authorize(Resource::Profile, Action::Delete, Some(&user.username))?;

    db::profiles::delete(&state.pool, id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "profile.deleted",
        "profile",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

/// Flip the default flag to this profile; the previous default is cleared
/// in the same transaction.
pub async fn set_default(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = load_active(&state.pool, id).await?;
    let user = owner_of(&state.pool, profile.user_id).await?;
    principal.authorize(Resource::Profile, Action::Update, Some(&user.username))?;

    let updated = db::profiles::set_default(&state.pool, user.id, profile.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "profile.default_set",
        "profile",
        Some(updated.id),
        None,
    )
    .await;

    Ok(Json(updated))
}
