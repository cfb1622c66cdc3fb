use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Permission, PermissionType, Role};

pub struct NewPermission<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub kind: PermissionType,
    pub resource: &'a str,
    pub action: &'a str,
    pub system_permission: bool,
}

pub async fn create(pool: &PgPool, new: &NewPermission<'_>) -> Result<Permission, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        "INSERT INTO permissions (code, name, description, type, resource, action, system_permission)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(new.code)
    .bind(new.name)
    .bind(new.description)
    .bind(new.kind)
    .bind(new.resource)
    .bind(new.action)
    .bind(new.system_permission)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
}

pub async fn exists_by_code(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM permissions WHERE code = $1)")
        .bind(code)
        .fetch_one(pool)
        .await
}

pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
    pub kind: Option<PermissionType>,
    pub resource: Option<String>,
}

pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Vec<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        "SELECT * FROM permissions
         WHERE active
           AND ($1::permission_type IS NULL OR type = $1)
           AND ($2::text IS NULL OR resource = $2)
         ORDER BY code LIMIT $3 OFFSET $4",
    )
    .bind(params.kind)
    .bind(&params.resource)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(pool)
    .await
}

pub async fn count(
    pool: &PgPool,
    kind: Option<PermissionType>,
    resource: Option<&str>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM permissions
         WHERE active
           AND ($1::permission_type IS NULL OR type = $1)
           AND ($2::text IS NULL OR resource = $2)",
    )
    .bind(kind)
    .bind(resource)
    .fetch_one(pool)
    .await
}

/// Compare-and-swap update; None means gone or stale version.
pub async fn update(pool: &PgPool, permission: &Permission) -> Result<Option<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        "UPDATE permissions
         SET code = $3, name = $4, description = $5, type = $6, resource = $7,
             action = $8, system_permission = $9, active = $10,
             updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(permission.id)
    .bind(permission.audit.version)
    .bind(&permission.code)
    .bind(&permission.name)
    .bind(&permission.description)
    .bind(permission.kind)
    .bind(&permission.resource)
    .bind(&permission.action)
    .bind(permission.system_permission)
    .bind(permission.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn roles_of(pool: &PgPool, permission_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT r.* FROM roles r
         JOIN role_permissions rp ON rp.role_id = r.id
         WHERE rp.permission_id = $1
         ORDER BY r.code",
    )
    .bind(permission_id)
    .fetch_all(pool)
    .await
}

/// The effective permission set of a principal: the union of permission
/// codes across all of its active roles. Both the stored code and the
/// derived `resource:action` form are honored by resource gates.
pub async fn effective_codes(
    pool: &PgPool,
    role_codes: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT DISTINCT unnest(ARRAY[p.code, p.resource || ':' || p.action])
         FROM permissions p
         JOIN role_permissions rp ON rp.permission_id = p.id
         JOIN roles r ON r.id = rp.role_id
         WHERE p.active AND r.active AND r.code = ANY($1)",
    )
    .bind(role_codes)
    .fetch_all(pool)
    .await
}
