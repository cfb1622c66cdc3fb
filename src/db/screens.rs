use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Screen, ScreenType};

pub struct NewScreen<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub kind: ScreenType,
    pub module: Option<&'a str>,
    pub route: Option<&'a str>,
    pub component: Option<&'a str>,
    pub public_access: bool,
    pub auth_required: bool,
    pub required_permissions: Vec<String>,
}

pub async fn create(pool: &PgPool, new: &NewScreen<'_>) -> Result<Screen, sqlx::Error> {
    sqlx::query_as::<_, Screen>(
        "INSERT INTO screens (code, name, description, type, module, route,
                              component, public_access, auth_required, required_permissions)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(new.code)
    .bind(new.name)
    .bind(new.description)
    .bind(new.kind)
    .bind(new.module)
    .bind(new.route)
    .bind(new.component)
    .bind(new.public_access)
    .bind(new.auth_required)
    .bind(&new.required_permissions)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Screen>, sqlx::Error> {
    sqlx::query_as::<_, Screen>("SELECT * FROM screens WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists_by_code(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM screens WHERE code = $1)")
        .bind(code)
        .fetch_one(pool)
        .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Screen>, sqlx::Error> {
    sqlx::query_as::<_, Screen>("SELECT * FROM screens WHERE active ORDER BY code")
        .fetch_all(pool)
        .await
}

/// Compare-and-swap update; None means gone or stale version.
pub async fn update(pool: &PgPool, screen: &Screen) -> Result<Option<Screen>, sqlx::Error> {
    sqlx::query_as::<_, Screen>(
        "UPDATE screens
         SET code = $3, name = $4, description = $5, type = $6, module = $7,
             route = $8, component = $9, public_access = $10, auth_required = $11,
             required_permissions = $12, active = $13,
             updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(screen.id)
    .bind(screen.audit.version)
    .bind(&screen.code)
    .bind(&screen.name)
    .bind(&screen.description)
    .bind(screen.kind)
    .bind(&screen.module)
    .bind(&screen.route)
    .bind(&screen.component)
    .bind(screen.public_access)
    .bind(screen.auth_required)
    .bind(&screen.required_permissions)
    .bind(screen.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM screens WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
