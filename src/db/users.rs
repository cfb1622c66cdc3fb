use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Role, User, UserStatus};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone_number: Option<&'a str>,
    pub external_id: Option<&'a str>,
    pub department: Option<&'a str>,
    pub position: Option<&'a str>,
}

pub async fn create(pool: &PgPool, new: &NewUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, first_name, last_name, phone_number,
                            external_id, department, \"position\")
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(new.username)
    .bind(new.email)
    .bind(new.first_name)
    .bind(new.last_name)
    .bind(new.phone_number)
    .bind(new.external_id)
    .bind(new.department)
    .bind(new.position)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn exists_by_username(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await
}

pub async fn exists_by_email(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
}

pub async fn exists_by_external_id(pool: &PgPool, external_id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE external_id = $1)")
        .bind(external_id)
        .fetch_one(pool)
        .await
}

#[derive(Debug, Clone, Copy)]
pub enum SortColumn {
    CreatedAt,
    Username,
    Email,
    LastLoginAt,
}

impl SortColumn {
    pub fn parse(s: &str) -> Self {
        match s {
            "username" => Self::Username,
            "email" => Self::Email,
            "last_login_at" => Self::LastLoginAt,
            _ => Self::CreatedAt,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Username => "username",
            Self::Email => "email",
            Self::LastLoginAt => "last_login_at",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    pub search: Option<String>,
    pub status: Option<UserStatus>,
}

/// List active users, optionally narrowed by status and a free-text search
/// over username, email and name.
pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Vec<User>, sqlx::Error> {
    let pattern = params.search.as_ref().map(|s| format!("%{s}%"));

    sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM users
         WHERE active
           AND ($1::user_status IS NULL OR status = $1)
           AND ($2::text IS NULL OR username ILIKE $2 OR email ILIKE $2
                OR first_name ILIKE $2 OR last_name ILIKE $2)
         ORDER BY {} {} LIMIT $3 OFFSET $4",
        params.sort_by.as_sql(),
        params.sort_order.as_sql(),
    ))
    .bind(params.status)
    .bind(pattern)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(pool)
    .await
}

pub async fn count(
    pool: &PgPool,
    status: Option<UserStatus>,
    search: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let pattern = search.map(|s| format!("%{s}%"));

    sqlx::query_scalar(
        "SELECT COUNT(*) FROM users
         WHERE active
           AND ($1::user_status IS NULL OR status = $1)
           AND ($2::text IS NULL OR username ILIKE $2 OR email ILIKE $2
                OR first_name ILIKE $2 OR last_name ILIKE $2)",
    )
    .bind(status)
    .bind(pattern)
    .fetch_one(pool)
    .await
}

/// Persist a mutated user with a compare-and-swap on `version`. Returns
/// None when the row is gone or the version is stale; the caller decides
/// between NotFound and Conflict.
pub async fn update(pool: &PgPool, user: &User) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users
         SET username = $3, email = $4, first_name = $5, last_name = $6,
             phone_number = $7, external_id = $8, status = $9,
             email_verified = $10, last_login_at = $11, login_attempts = $12,
             locked_until = $13, department = $14, \"position\" = $15,
             active = $16, updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(user.id)
    .bind(user.audit.version)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone_number)
    .bind(&user.external_id)
    .bind(user.status)
    .bind(user.email_verified)
    .bind(user.last_login_at)
    .bind(user.login_attempts)
    .bind(user.locked_until)
    .bind(&user.department)
    .bind(&user.position)
    .bind(user.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn roles_of(pool: &PgPool, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT r.* FROM roles r
         JOIN user_roles ur ON ur.role_id = r.id
         WHERE ur.user_id = $1
         ORDER BY r.code",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Idempotent: adding an edge twice has no additional effect.
pub async fn add_role(pool: &PgPool, user_id: Uuid, role_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// No-op when the edge is absent.
pub async fn remove_role(pool: &PgPool, user_id: Uuid, role_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_all_roles(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert every edge inside one transaction. Callers must have resolved
/// all role ids beforehand so a bad id aborts before any write.
pub async fn add_roles(pool: &PgPool, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for role_id in role_ids {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

pub async fn count_by_status(pool: &PgPool, status: UserStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
}

/// Users whose lock has not yet expired, by the computed predicate rather
/// than the advisory status.
pub async fn list_locked(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE locked_until IS NOT NULL AND locked_until > now()
         ORDER BY locked_until",
    )
    .fetch_all(pool)
    .await
}
