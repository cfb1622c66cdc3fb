pub mod users;
pub mod roles;
pub mod permissions;
pub mod profiles;
pub mod menus;
pub mod screens;
pub mod papers;

use std::collections::HashSet;

use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::PgPool;

use crate::auth::extractor::Principal;
use crate::db;
use crate::error::AppError;
use crate::state::SharedState;

/// The caller's effective permission codes, unioned across its roles.
pub(crate) async fn effective_set(
    pool: &PgPool,
    principal: &Principal,
) -> Result<HashSet<String>, AppError> {
    let roles: Vec<String> = principal.roles.iter().cloned().collect();
    let codes = db::permissions::effective_codes(pool, &roles).await?;
    Ok(codes.into_iter().collect())
}

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Users
        .route("/api/v1/users", get(users::list).post(users::create))
        .route("/api/v1/users/me", get(users::me).put(users::update_me))
        .route("/api/v1/users/statistics", get(users::statistics))
        .route("/api/v1/users/locked", get(users::list_locked))
        .route(
            "/api/v1/users/check/username/{username}",
            get(users::check_username),
        )
        .route("/api/v1/users/check/email/{email}", get(users::check_email))
        .route(
            "/api/v1/users/{id}",
            get(users::get).put(users::update).delete(users::soft_delete),
        )
        .route("/api/v1/users/{id}/hard", delete(users::delete))
        .route("/api/v1/users/{id}/activate", post(users::activate))
        .route("/api/v1/users/{id}/deactivate", post(users::deactivate))
        .route("/api/v1/users/{id}/lock", post(users::lock))
        .route("/api/v1/users/{id}/unlock", post(users::unlock))
        .route("/api/v1/users/{id}/verify-email", post(users::verify_email))
        .route(
            "/api/v1/users/{id}/login-failure",
            post(users::record_login_failure),
        )
        .route(
            "/api/v1/users/{id}/login-success",
            post(users::record_login_success),
        )
        // User role assignment
        .route(
            "/api/v1/users/{id}/roles",
            get(users::list_roles)
                .post(users::assign_roles)
                .delete(users::remove_all_roles),
        )
        .route(
            "/api/v1/users/{id}/roles/{role_id}",
            post(users::assign_role).delete(users::remove_role),
        )
        // Profiles
        .route(
            "/api/v1/users/{id}/profiles",
            get(profiles::list_for_user).post(profiles::create),
        )
        .route(
            "/api/v1/profiles/{id}",
            get(profiles::get)
                .put(profiles::update)
                .delete(profiles::delete),
        )
        .route("/api/v1/profiles/{id}/default", post(profiles::set_default))
        // Roles
        .route("/api/v1/roles", get(roles::list).post(roles::create))
        .route("/api/v1/roles/code/{code}", get(roles::get_by_code))
        .route(
            "/api/v1/roles/{id}",
            get(roles::get).put(roles::update).delete(roles::delete),
        )
        .route(
            "/api/v1/roles/{id}/permissions",
            get(roles::list_permissions).delete(roles::remove_all_permissions),
        )
        .route(
            "/api/v1/roles/{id}/permissions/{permission_id}",
            post(roles::assign_permission).delete(roles::remove_permission),
        )
        .route(
            "/api/v1/roles/{id}/has-permission/{code}",
            get(roles::check_permission),
        )
        .route("/api/v1/roles/{id}/users", get(roles::list_users))
        // Permissions
        .route(
            "/api/v1/permissions",
            get(permissions::list).post(permissions::create),
        )
        .route("/api/v1/permissions/effective", get(permissions::effective))
        .route(
            "/api/v1/permissions/code/{code}",
            get(permissions::get_by_code),
        )
        .route(
            "/api/v1/permissions/{id}",
            get(permissions::get)
                .put(permissions::update)
                .delete(permissions::delete),
        )
        .route(
            "/api/v1/permissions/{id}/roles",
            get(permissions::list_roles),
        )
        // Menus
        .route("/api/v1/menus", get(menus::list).post(menus::create))
        .route("/api/v1/menus/tree", get(menus::tree))
        .route(
            "/api/v1/menus/{id}",
            get(menus::get).put(menus::update).delete(menus::delete),
        )
        // Screens
        .route("/api/v1/screens", get(screens::list).post(screens::create))
        .route("/api/v1/screens/accessible", get(screens::accessible))
        .route(
            "/api/v1/screens/{id}",
            get(screens::get)
                .put(screens::update)
                .delete(screens::delete),
        )
        .route("/api/v1/screens/{id}/access", get(screens::check_access))
        // Papers
        .route("/api/v1/papers", get(papers::list).post(papers::create))
        .route(
            "/api/v1/papers/{id}",
            get(papers::get).put(papers::update).delete(papers::delete),
        )
        .route("/api/v1/papers/{id}/publish", post(papers::publish))
        .route("/api/v1/papers/{id}/archive", post(papers::archive))
}
