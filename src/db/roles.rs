use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Permission, Role, User};

pub async fn create(
    pool: &PgPool,
    name: &str,
    code: &str,
    description: Option<&str>,
    system_role: bool,
) -> Result<Role, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "INSERT INTO roles (name, code, description, system_role)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(name)
    .bind(code)
    .bind(description)
    .bind(system_role)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
}

pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
    pub search: Option<String>,
}

pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Vec<Role>, sqlx::Error> {
    let pattern = params.search.as_ref().map(|s| format!("%{s}%"));

    sqlx::query_as::<_, Role>(
        "SELECT * FROM roles
         WHERE active
           AND ($1::text IS NULL OR name ILIKE $1 OR code ILIKE $1)
         ORDER BY code LIMIT $2 OFFSET $3",
    )
    .bind(pattern)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &PgPool, search: Option<&str>) -> Result<i64, sqlx::Error> {
    let pattern = search.map(|s| format!("%{s}%"));

    sqlx::query_scalar(
        "SELECT COUNT(*) FROM roles
         WHERE active AND ($1::text IS NULL OR name ILIKE $1 OR code ILIKE $1)",
    )
    .bind(pattern)
    .fetch_one(pool)
    .await
}

/// Compare-and-swap update; None means gone or stale version.
pub async fn update(pool: &PgPool, role: &Role) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "UPDATE roles
         SET name = $3, code = $4, description = $5, system_role = $6,
             active = $7, updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(role.id)
    .bind(role.audit.version)
    .bind(&role.name)
    .bind(&role.code)
    .bind(&role.description)
    .bind(role.system_role)
    .bind(role.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn permissions_of(pool: &PgPool, role_id: Uuid) -> Result<Vec<Permission>, sqlx::Error> {
    sqlx::query_as::<_, Permission>(
        "SELECT p.* FROM permissions p
         JOIN role_permissions rp ON rp.permission_id = p.id
         WHERE rp.role_id = $1
         ORDER BY p.code",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
}

pub async fn has_permission(
    pool: &PgPool,
    role_id: Uuid,
    code: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (
             SELECT 1 FROM role_permissions rp
             JOIN permissions p ON p.id = rp.permission_id
             WHERE rp.role_id = $1 AND p.code = $2
         )",
    )
    .bind(role_id)
    .bind(code)
    .fetch_one(pool)
    .await
}

/// Idempotent: adding an edge twice has no additional effect.
pub async fn add_permission(
    pool: &PgPool,
    role_id: Uuid,
    permission_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(role_id)
    .bind(permission_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// No-op when the edge is absent.
pub async fn remove_permission(
    pool: &PgPool,
    role_id: Uuid,
    permission_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
        .bind(role_id)
        .bind(permission_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_all_permissions(pool: &PgPool, role_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn users_of(pool: &PgPool, role_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT u.* FROM users u
         JOIN user_roles ur ON ur.user_id = u.id
         WHERE ur.role_id = $1 AND u.active
         ORDER BY u.username",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
}
