use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::Principal;
use crate::auth::policy::{Action, Resource};
use crate::db;
use crate::error::{conflict_on_unique, AppError};
use crate::middleware::audit;
use crate::models::{Paper, PaperStatus, PaperType};
use crate::routes::effective_set;
use crate::state::SharedState;

async fn load_active(pool: &PgPool, id: Uuid) -> Result<Paper, AppError> {
    db::papers::find_by_id(pool, id)
        .await?
        .filter(|p| p.audit.active)
        .ok_or_else(|| AppError::NotFound("Paper not found".to_string()))
}

/// Per-paper gate: the record exists but the caller lacks a required code,
/// so this is Forbidden, not NotFound.
async fn require_readable(
    pool: &PgPool,
    principal: &Principal,
    paper: &Paper,
) -> Result<(), AppError> {
    let granted = effective_set(pool, principal).await?;
    if paper.readable_by(&granted) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Insufficient privileges for this paper".to_string(),
        ))
    }
}

async fn persist(pool: &PgPool, paper: &Paper) -> Result<Paper, AppError> {
    match db::papers::update(pool, paper).await? {
        Some(updated) => Ok(updated),
        None => {
            if db::papers::find_by_id(pool, paper.id).await?.is_some() {
                Err(AppError::Conflict(
                    "Paper was modified concurrently".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Paper not found".to_string()))
            }
        }
    }
}

#[derive(Deserialize)]
pub struct CreatePaper {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: PaperType,
    pub category: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub required_permissions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create(
    principal: Principal,
    State(state): State<SharedState>,
    Json(req): Json<CreatePaper>,
) -> Result<Json<Paper>, AppError> {
    principal.authorize(Resource::Paper, Action::Create, None)?;

    if req.code.is_empty() || req.title.is_empty() {
        return Err(AppError::Validation(
            "code and title are required".to_string(),
        ));
    }
    if db::papers::exists_by_code(&state.pool, &req.code).await? {
        return Err(AppError::Conflict(format!(
            "Paper code already exists: {}",
            req.code
        )));
    }

    // Authorship is recorded when the principal maps to a managed user.
    let created_by = db::users::find_by_username(&state.pool, &principal.username)
        .await?
        .map(|u| u.id);

    let paper = db::papers::create(
        &state.pool,
        &db::papers::NewPaper {
            code: &req.code,
            title: &req.title,
            description: req.description.as_deref(),
            kind: req.kind,
            category: req.category.as_deref(),
            expires_at: req.expires_at,
            created_by,
            required_permissions: req.required_permissions,
            tags: req.tags,
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A paper with this code already exists"))?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "paper.created",
        "paper",
        Some(paper.id),
        None,
    )
    .await;

    Ok(Json(paper))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<PaperStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Listing hides papers the caller cannot read instead of erroring.
pub async fn list(
    principal: Principal,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    principal.authorize(Resource::Paper, Action::Read, None)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let params = db::papers::ListParams {
        limit: per_page,
        offset: (page - 1) * per_page,
        status: query.status,
        category: query.category.clone(),
        search: query.search.clone(),
    };

    let granted = effective_set(&state.pool, &principal).await?;
    let papers: Vec<Paper> = db::papers::list(&state.pool, &params)
        .await?
        .into_iter()
        .filter(|p| p.readable_by(&granted))
        .collect();
    let total = db::papers::count(
        &state.pool,
        query.status,
        query.category.as_deref(),
        query.search.as_deref(),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "papers": papers,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

pub async fn get(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Paper>, AppError> {
    principal.authorize(Resource::Paper, Action::Read, None)?;

    let paper = load_active(&state.pool, id).await?;
    require_readable(&state.pool, &principal, &paper).await?;
    Ok(Json(paper))
}

#[derive(Deserialize)]
pub struct UpdatePaper {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<PaperStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub required_permissions: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

pub async fn update(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaper>,
) -> Result<Json<Paper>, AppError> {
    principal.authorize(Resource::Paper, Action::Update, None)?;

    let mut paper = load_active(&state.pool, id).await?;
    require_readable(&state.pool, &principal, &paper).await?;

    if let Some(title) = req.title {
        paper.title = title;
    }
    if let Some(description) = req.description {
        paper.description = Some(description);
    }
    if let Some(category) = req.category {
        paper.category = Some(category);
    }
    if let Some(status) = req.status {
        paper.status = status;
    }
    if let Some(expires_at) = req.expires_at {
        paper.expires_at = Some(expires_at);
    }
    if let Some(required_permissions) = req.required_permissions {
        paper.required_permissions = required_permissions;
    }
    if let Some(tags) = req.tags {
        paper.tags = tags;
    }

    let updated = persist(&state.pool, &paper).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "paper.updated",
        "paper",
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
    principal.authorize(Resource::Paper, Action::Delete, None)?;

    let paper = load_active(&state.pool, id).await?;
    require_readable(&state.pool, &principal, &paper).await?;

    db::papers::delete(&state.pool, paper.id).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "paper.deleted",
        "paper",
        Some(id),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

pub async fn publish(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Paper>, AppError> {
    principal.authorize(Resource::Paper, Action::Publish, None)?;

    let mut paper = load_active(&state.pool, id).await?;
    require_readable(&state.pool, &principal, &paper).await?;

    if paper.is_expired() {
        return Err(AppError::Conflict(
            "An expired paper cannot be published".to_string(),
        ));
    }

    paper.publish();
    let updated = persist(&state.pool, &paper).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "paper.published",
        "paper",
        Some(updated.id),
        None,
    )
    .await;

    Ok(Json(updated))
}

pub async fn archive(
    principal: Principal,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Paper>, AppError> {
    principal.authorize(Resource::Paper, Action::Archive, None)?;

    let mut paper = load_active(&state.pool, id).await?;
    require_readable(&state.pool, &principal, &paper).await?;

    paper.archive();
    let updated = persist(&state.pool, &paper).await?;

    audit::log_event(
        &state.pool,
        &principal.username,
        "paper.archived",
        "paper",
        Some(updated.id),
        None,
    )
    .await;

    Ok(Json(updated))
}
