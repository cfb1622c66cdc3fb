use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ProfileType, UserProfile};

pub struct NewProfile<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub kind: ProfileType,
    pub is_public: bool,
    pub attributes: serde_json::Value,
    pub permissions: Vec<String>,
    pub preferences: serde_json::Value,
    pub context: Option<&'a str>,
}

pub async fn create(pool: &PgPool, new: &NewProfile<'_>) -> Result<UserProfile, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>(
        "INSERT INTO user_profiles (user_id, name, description, type, is_public,
                                    attributes, permissions, preferences, context)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.description)
    .bind(new.kind)
    .bind(new.is_public)
    .bind(&new.attributes)
    .bind(&new.permissions)
    .bind(&new.preferences)
    .bind(new.context)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserProfile>, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>(
        "SELECT * FROM user_profiles WHERE user_id = $1 AND active ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Compare-and-swap update; None means gone or stale version.
pub async fn update(pool: &PgPool, profile: &UserProfile) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>(
        "UPDATE user_profiles
         SET name = $3, description = $4, type = $5, is_public = $6,
             attributes = $7, permissions = $8, preferences = $9, context = $10,
             active = $11, updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(profile.id)
    .bind(profile.audit.version)
    .bind(&profile.name)
    .bind(&profile.description)
    .bind(profile.kind)
    .bind(profile.is_public)
    .bind(&profile.attributes)
    .bind(&profile.permissions)
    .bind(&profile.preferences)
    .bind(&profile.context)
    .bind(profile.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_profiles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Make one profile the user's default. The previous default is cleared in
/// the same transaction so at most one profile per user carries the flag.
pub async fn set_default(
    pool: &PgPool,
    user_id: Uuid,
    profile_id: Uuid,
) -> Result<Option<UserProfile>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE user_profiles SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let updated = sqlx::query_as::<_, UserProfile>(
        "UPDATE user_profiles
         SET is_default = TRUE, updated_at = now(), version = version + 1
         WHERE id = $1 AND user_id = $2
         RETURNING *",
    )
    .bind(profile_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}
