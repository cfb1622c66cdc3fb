use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Menu;

pub struct NewMenu<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub url: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub display_order: i32,
    pub parent_id: Option<Uuid>,
    pub required_permission: Option<&'a str>,
    pub level: i32,
}

pub async fn create(pool: &PgPool, new: &NewMenu<'_>) -> Result<Menu, sqlx::Error> {
    sqlx::query_as::<_, Menu>(
        "INSERT INTO menus (code, name, description, url, icon, display_order,
                            parent_id, required_permission, level)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(new.code)
    .bind(new.name)
    .bind(new.description)
    .bind(new.url)
    .bind(new.icon)
    .bind(new.display_order)
    .bind(new.parent_id)
    .bind(new.required_permission)
    .bind(new.level)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Menu>, sqlx::Error> {
    sqlx::query_as::<_, Menu>("SELECT * FROM menus WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists_by_code(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM menus WHERE code = $1)")
        .bind(code)
        .fetch_one(pool)
        .await
}

/// One ordered scan of the active menus; tree assembly happens in memory.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Menu>, sqlx::Error> {
    sqlx::query_as::<_, Menu>(
        "SELECT * FROM menus WHERE active ORDER BY level, display_order, code",
    )
    .fetch_all(pool)
    .await
}

/// Compare-and-swap update; None means gone or stale version.
pub async fn update(pool: &PgPool, menu: &Menu) -> Result<Option<Menu>, sqlx::Error> {
    sqlx::query_as::<_, Menu>(
        "UPDATE menus
         SET code = $3, name = $4, description = $5, url = $6, icon = $7,
             display_order = $8, visible = $9, parent_id = $10,
             required_permission = $11, level = $12, active = $13,
             updated_at = now(), version = version + 1
         WHERE id = $1 AND version = $2
         RETURNING *",
    )
    .bind(menu.id)
    .bind(menu.audit.version)
    .bind(&menu.code)
    .bind(&menu.name)
    .bind(&menu.description)
    .bind(&menu.url)
    .bind(&menu.icon)
    .bind(menu.display_order)
    .bind(menu.visible)
    .bind(menu.parent_id)
    .bind(&menu.required_permission)
    .bind(menu.level)
    .bind(menu.audit.active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM menus WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
