use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Paper, PaperStatus, PaperType};

pub struct NewPaper<'a> {
    pub code: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub kind: PaperType,
    pub category: Option<&'a str>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_by: Option<Uuid>,
    pub required_permissions: Vec<String>,
    pub tags: Vec<String>,
}

pub async fn create(pool: &PgPool, new: &NewPaper<'_>) -> Result<Paper, sqlx::Error> {
    sqlx::query_as::<_, Paper>(
        "INSERT INTO papers (code, title, description, type, category, expires_at,
                             created_by, required_permissions, tags)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(new.code)
    .bind(new.title)
    .bind(new.description)
    .bind(new.kind)
    .bind(new.category)
    .bind(new.expires_at)
    .bind(new.created_by)
    .bind(&new.required_permissions)
    .bind(&new.tags)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Paper>, sqlx::Error> {
    sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists_by_code(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM papers WHERE code = $1)")
        .bind(code)
        .fetch_one(pool)
        .await
}

pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
    pub status: Option<PaperStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Vec<Paper>, sqlx::Error> {
    let pattern = params.search.as_ref().map(|s| format!("%{s}%"));

    sqlx::query_as::<_, Paper>(
        "SELECT * FROM papers
         WHERE active
           AND ($1::paper_status IS NULL OR status = $1)
           AND ($2::text IS NULL OR category = $2)
           AND ($3::text IS NULL OR title ILIKE $3 OR code ILIKE $3)
         ORDER BY created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(params.status)
    .bind(&params.category)
    .bind(pattern)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(pool)
    .await
}

pub async fn count(
    pool: &PgPool,
    status: Option<PaperStatus>,
    category: Option<&str>,
    search: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let pattern = search.map(|s| format!("%{s}%"));

    sqlx::query_scalar(
        "SELECT COUNT(*) FROM papers
         WHERE active
           AND ($1::paper_status IS NULL OR status = $1)
           AND ($2::text IS NULL OR category = $2)
           AND ($3::text IS NULL OR title ILIKE $3 OR code ILIKE $3)",
    )
    .bind(status)
    .bind(category)
    .bind(pattern)
    .fetch_one(pool)
    .await
}

/// Compare-and-swap update; None means gone or stale version.
pub async fn update(pool: &PgPool, paper: &Paper) -> Result<Option<Paper>, sqlx::Error> {
    sqlx::query_as::<_, Paper>(
        "UPDATE papers
         SET code = $3, title = $4, description = $5, type = $6, status = $7,
             category = $8, published_at = $9, expires_at = $10,
             required_permissions = $11, tags = $12, active = $13,
             updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(paper.id)
    .bind(paper.audit.version)
    .bind(&paper.code)
    .bind(&paper.title)
    .bind(&paper.description)
    .bind(paper.kind)
    .bind(paper.status)
    .bind(&paper.category)
    .bind(paper.published_at)
    .bind(paper.expires_at)
    .bind(&paper.required_permissions)
    .bind(&paper.tags)
    .bind(paper.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM papers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
