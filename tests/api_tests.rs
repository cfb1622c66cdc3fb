mod common;

use reqwest::StatusCode;
use serde_json::json;

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    common::cleanup(app).await;
}

// ── Authentication ──────────────────────────────────────────────

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/api/v1/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = common::spawn_app().await;

    let (_, status) = app.get_auth("/api/v1/users", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn role_codes_from_token_are_case_normalized() {
    let app = common::spawn_app().await;

    // Lowercase role in the token still clears an ADMIN-only gate.
    let token = app.token("root", &["admin"]);
    let (body, status) = app.get_auth("/api/v1/users/statistics", &token).await;
    assert_eq!(status, StatusCode::OK, "statistics failed: {body}");

    common::cleanup(app).await;
}

// ── User creation & validation ──────────────────────────────────

#[tokio::test]
async fn create_and_fetch_user() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    assert_eq!(user["username"], "alice");
    assert_eq!(user["status"], "ACTIVE");
    assert_eq!(user["active"], true);
    assert_eq!(user["version"], 0);
    assert_eq!(user["email_verified"], false);

    let id = user["id"].as_str().unwrap();
    let (fetched, status) = app.get_auth(&format!("/api/v1/users/{id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["email"], "alice@example.com");

    common::cleanup(app).await;
}

#[tokio::test]
async fn duplicate_username_conflicts_without_partial_persist() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;

    let (body, status) = app
        .post_auth(
            "/api/v1/users",
            &admin,
            &json!({
                "username": "alice",
                "email": "other@example.com",
                "first_name": "Other",
                "last_name": "Person",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "expected conflict: {body}");

    // Nothing was written for the rejected request.
    let (check, _) = app
        .get_auth("/api/v1/users/check/email/other@example.com", &admin)
        .await;
    assert_eq!(check["exists"], false);

    common::cleanup(app).await;
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;

    let (_, status) = app
        .post_auth(
            "/api/v1/users",
            &admin,
            &json!({
                "username": "alice2",
                "email": "alice@example.com",
                "first_name": "Alice",
                "last_name": "Two",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::cleanup(app).await;
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let (_, status) = app
        .post_auth(
            "/api/v1/users",
            &admin,
            &json!({
                "username": "bob",
                "email": "not-an-email",
                "first_name": "Bob",
                "last_name": "Jones",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn empty_required_fields_are_rejected() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let (_, status) = app
        .post_auth(
            "/api/v1/users",
            &admin,
            &json!({
                "username": "",
                "email": "bob@example.com",
                "first_name": "Bob",
                "last_name": "Jones",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

// ── Listing, search & pagination ────────────────────────────────

#[tokio::test]
async fn list_users_paginates_and_counts() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;
    app.create_user(&admin, "bob", "bob@example.com").await;
    app.create_user(&admin, "carol", "carol@example.com").await;

    let (body, status) = app
        .get_auth("/api/v1/users?page=1&per_page=2&sort_by=username&sort_order=asc", &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "alice");

    let (page2, _) = app
        .get_auth("/api/v1/users?page=2&per_page=2&sort_by=username&sort_order=asc", &admin)
        .await;
    assert_eq!(page2["users"].as_array().unwrap().len(), 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn search_narrows_user_listing() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;
    app.create_user(&admin, "bob", "bob@example.com").await;

    let (body, _) = app.get_auth("/api/v1/users?search=ali", &admin).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["users"][0]["username"], "alice");

    common::cleanup(app).await;
}

#[tokio::test]
async fn soft_deleted_users_are_hidden_from_listing() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();

    let (_, status) = app.delete_auth(&format!("/api/v1/users/{id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);

    let (body, _) = app.get_auth("/api/v1/users", &admin).await;
    assert_eq!(body["total"], 0);

    // Fetch by id also treats the record as gone.
    let (_, status) = app.get_auth(&format!("/api/v1/users/{id}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

// ── Self-access ─────────────────────────────────────────────────

#[tokio::test]
async fn user_without_roles_can_read_and_update_own_record() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let alice = app.create_user(&admin, "alice", "alice@example.com").await;
    let alice_id = alice["id"].as_str().unwrap();
    let alice_token = app.token("alice", &[]);

    let (body, status) = app
        .get_auth(&format!("/api/v1/users/{alice_id}"), &alice_token)
        .await;
    assert_eq!(status, StatusCode::OK, "self read failed: {body}");

    let (updated, status) = app
        .put_auth(
            &format!("/api/v1/users/{alice_id}"),
            &alice_token,
            &json!({ "department": "Engineering" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["department"], "Engineering");
    assert_eq!(updated["version"], 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn user_without_roles_cannot_touch_other_records() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;
    let bob = app.create_user(&admin, "bob", "bob@example.com").await;
    let bob_id = bob["id"].as_str().unwrap();

    let alice_token = app.token("alice", &[]);
    let (_, status) = app
        .get_auth(&format!("/api/v1/users/{bob_id}"), &alice_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn self_access_never_unlocks_hard_delete() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let alice = app.create_user(&admin, "alice", "alice@example.com").await;
    let alice_id = alice["id"].as_str().unwrap();
    let alice_token = app.token("alice", &[]);

    let (_, status) = app
        .delete_auth(&format!("/api/v1/users/{alice_id}/hard"), &alice_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn me_resolves_the_token_principal() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;
    let alice_token = app.token("alice", &[]);

    let (body, status) = app.get_auth("/api/v1/users/me", &alice_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    // A principal with no managed record gets NotFound, not Forbidden.
    let ghost_token = app.token("ghost", &[]);
    let (_, status) = app.get_auth("/api/v1/users/me", &ghost_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

// ── Deny vs not-found ───────────────────────────────────────────

#[tokio::test]
async fn denial_is_distinguishable_from_absence() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let alice = app.create_user(&admin, "alice", "alice@example.com").await;
    let alice_id = alice["id"].as_str().unwrap();
    let nobody = app.token("nobody", &[]);

    // Existing record, no privileges: Forbidden.
    let (_, status) = app
        .get_auth(&format!("/api/v1/users/{alice_id}"), &nobody)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Absent record: NotFound, even for a privileged caller.
    let missing = uuid::Uuid::now_v7();
    let (_, status) = app.get_auth(&format!("/api/v1/users/{missing}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

#[tokio::test]
async fn viewer_role_reads_but_cannot_mutate() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let alice = app.create_user(&admin, "alice", "alice@example.com").await;
    let alice_id = alice["id"].as_str().unwrap();
    let viewer = app.token("viewer", &["USER_VIEWER"]);

    let (_, status) = app
        .get_auth(&format!("/api/v1/users/{alice_id}"), &viewer)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/users/{alice_id}"),
            &viewer,
            &json!({ "department": "Sales" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

// ── Lifecycle: activate, deactivate, lock ───────────────────────

#[tokio::test]
async fn deactivate_then_activate_round_trip() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();

    let (body, status) = app
        .post_auth(&format!("/api/v1/users/{id}/deactivate"), &admin, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
    assert_eq!(body["status"], "INACTIVE");

    // Reactivation reaches the soft-deleted record.
    let (body, status) = app
        .post_auth(&format!("/api/v1/users/{id}/activate"), &admin, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);
    assert_eq!(body["status"], "ACTIVE");

    common::cleanup(app).await;
}

#[tokio::test]
async fn lock_and_unlock_a_user() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();

    let (body, status) = app
        .post_auth(
            &format!("/api/v1/users/{id}/lock?until=2099-01-01T00:00:00Z"),
            &admin,
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "lock failed: {body}");
    assert_eq!(body["status"], "LOCKED");
    assert!(body["locked_until"].is_string());

    let (locked, _) = app.get_auth("/api/v1/users/locked", &admin).await;
    assert_eq!(locked.as_array().unwrap().len(), 1);

    let (body, status) = app
        .post_auth(&format!("/api/v1/users/{id}/unlock"), &admin, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");
    assert!(body["locked_until"].is_null());
    assert_eq!(body["login_attempts"], 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn lock_rejects_past_expiry() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();

    let (_, status) = app
        .post_auth(
            &format!("/api/v1/users/{id}/lock?until=2001-01-01T00:00:00Z"),
            &admin,
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn repeated_login_failures_trigger_the_lockout() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();

    // Threshold is 3 in the test config.
    for attempt in 1..=2 {
        let (body, status) = app
            .post_auth(&format!("/api/v1/users/{id}/login-failure"), &admin, &json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["login_attempts"], attempt);
        assert!(body["locked_until"].is_null());
    }

    let (body, status) = app
        .post_auth(&format!("/api/v1/users/{id}/login-failure"), &admin, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login_attempts"], 3);
    assert_eq!(body["status"], "LOCKED");
    assert!(body["locked_until"].is_string());

    // A successful login is refused while the lock holds.
    let (_, status) = app
        .post_auth(&format!("/api/v1/users/{id}/login-success"), &admin, &json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::cleanup(app).await;
}

#[tokio::test]
async fn successful_login_resets_attempts() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();

    let (_, _) = app
        .post_auth(&format!("/api/v1/users/{id}/login-failure"), &admin, &json!({}))
        .await;

    let (body, status) = app
        .post_auth(&format!("/api/v1/users/{id}/login-success"), &admin, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login_attempts"], 0);
    assert!(body["last_login_at"].is_string());

    common::cleanup(app).await;
}

#[tokio::test]
async fn verify_email_is_one_way_and_self_serviceable() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let id = user["id"].as_str().unwrap();
    let alice_token = app.token("alice", &[]);

    let (body, status) = app
        .post_auth(&format!("/api/v1/users/{id}/verify-email"), &alice_token, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_verified"], true);

    common::cleanup(app).await;
}

// ── Optimistic concurrency ──────────────────────────────────────

#[tokio::test]
async fn stale_version_update_misses_the_compare_and_swap() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let created = app.create_user(&admin, "alice", "alice@example.com").await;
    let id: uuid::Uuid = created["id"].as_str().unwrap().parse().unwrap();

    // Snapshot the row at version 0.
    let stale = warden::db::users::find_by_id(&app.pool, id)
        .await
        .unwrap()
        .unwrap();

    // Someone else wins the race and bumps the version.
    let (body, status) = app
        .put_auth(
            &format!("/api/v1/users/{id}"),
            &admin,
            &json!({ "department": "Engineering" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);

    // Writing through the stale snapshot misses the CAS.
    let result = warden::db::users::update(&app.pool, &stale).await.unwrap();
    assert!(result.is_none());

    // The winner's write is intact.
    let (current, _) = app.get_auth(&format!("/api/v1/users/{id}"), &admin).await;
    assert_eq!(current["department"], "Engineering");
    assert_eq!(current["version"], 1);

    common::cleanup(app).await;
}

// ── Role catalog ────────────────────────────────────────────────

#[tokio::test]
async fn role_crud_requires_role_manager() {
    let app = common::spawn_app().await;
    let rm = app.token("rm", &["ROLE_MANAGER"]);
    let um = app.token("um", &["USER_MANAGER"]);

    let (_, status) = app
        .post_auth("/api/v1/roles", &um, &json!({ "name": "Reporter", "code": "REPORTER" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let role = app.create_role(&rm, "Reporter", "reporter").await;
    // Codes are stored in canonical uppercase.
    assert_eq!(role["code"], "REPORTER");

    let (body, status) = app.get_auth("/api/v1/roles/code/REPORTER", &rm).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Reporter");
    assert!(body["permissions"].as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn duplicate_role_code_conflicts() {
    let app = common::spawn_app().await;
    let rm = app.token("rm", &["ROLE_MANAGER"]);

    app.create_role(&rm, "Reporter", "REPORTER").await;
    let (_, status) = app
        .post_auth("/api/v1/roles", &rm, &json!({ "name": "Other", "code": "reporter" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::cleanup(app).await;
}

#[tokio::test]
async fn system_roles_cannot_be_deleted() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let (role, status) = app
        .post_auth(
            "/api/v1/roles",
            &admin,
            &json!({ "name": "Root", "code": "ROOT", "system_role": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = role["id"].as_str().unwrap();

    let (_, status) = app.delete_auth(&format!("/api/v1/roles/{id}"), &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::cleanup(app).await;
}

// ── Role-permission graph ───────────────────────────────────────

#[tokio::test]
async fn permission_assignment_is_visible_from_both_sides() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();
    let perm = app
        .create_permission(&admin, "REPORT_READ", "report", "read")
        .await;
    let perm_id = perm["id"].as_str().unwrap();

    let (_, status) = app
        .post_auth(
            &format!("/api/v1/roles/{role_id}/permissions/{perm_id}"),
            &admin,
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Role side.
    let (perms, _) = app
        .get_auth(&format!("/api/v1/roles/{role_id}/permissions"), &admin)
        .await;
    assert_eq!(perms.as_array().unwrap().len(), 1);
    assert_eq!(perms[0]["code"], "REPORT_READ");

    // Permission side.
    let (roles, _) = app
        .get_auth(&format!("/api/v1/permissions/{perm_id}/roles"), &admin)
        .await;
    assert_eq!(roles.as_array().unwrap().len(), 1);
    assert_eq!(roles[0]["code"], "REPORTER");

    let (check, _) = app
        .get_auth(
            &format!("/api/v1/roles/{role_id}/has-permission/REPORT_READ"),
            &admin,
        )
        .await;
    assert_eq!(check["granted"], true);

    common::cleanup(app).await;
}

#[tokio::test]
async fn permission_assignment_is_idempotent_and_removal_is_a_noop_when_absent() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();
    let perm = app
        .create_permission(&admin, "REPORT_READ", "report", "read")
        .await;
    let perm_id = perm["id"].as_str().unwrap();

    for _ in 0..2 {
        let (_, status) = app
            .post_auth(
                &format!("/api/v1/roles/{role_id}/permissions/{perm_id}"),
                &admin,
                &json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (perms, _) = app
        .get_auth(&format!("/api/v1/roles/{role_id}/permissions"), &admin)
        .await;
    assert_eq!(perms.as_array().unwrap().len(), 1);

    // Remove twice: second removal is a no-op, not an error.
    for _ in 0..2 {
        let (_, status) = app
            .delete_auth(
                &format!("/api/v1/roles/{role_id}/permissions/{perm_id}"),
                &admin,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (perms, _) = app
        .get_auth(&format!("/api/v1/roles/{role_id}/permissions"), &admin)
        .await;
    assert!(perms.as_array().unwrap().is_empty());
    let (roles, _) = app
        .get_auth(&format!("/api/v1/permissions/{perm_id}/roles"), &admin)
        .await;
    assert!(roles.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn stripping_all_permissions_requires_admin() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();
    let rm = app.token("rm", &["ROLE_MANAGER"]);

    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();
    let perm = app
        .create_permission(&admin, "REPORT_READ", "report", "read")
        .await;
    let perm_id = perm["id"].as_str().unwrap();
    app.post_auth(
        &format!("/api/v1/roles/{role_id}/permissions/{perm_id}"),
        &admin,
        &json!({}),
    )
    .await;

    let (_, status) = app
        .delete_auth(&format!("/api/v1/roles/{role_id}/permissions"), &rm)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app
        .delete_auth(&format!("/api/v1/roles/{role_id}/permissions"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (perms, _) = app
        .get_auth(&format!("/api/v1/roles/{role_id}/permissions"), &admin)
        .await;
    assert!(perms.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn permission_catalog_is_admin_only() {
    let app = common::spawn_app().await;
    let rm = app.token("rm", &["ROLE_MANAGER"]);

    let (_, status) = app
        .post_auth(
            "/api/v1/permissions",
            &rm,
            &json!({
                "code": "X",
                "name": "X",
                "type": "FUNCTIONAL",
                "resource": "x",
                "action": "read",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

// ── User-role assignment ────────────────────────────────────────

#[tokio::test]
async fn role_assignment_is_visible_from_both_sides() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();

    let (_, status) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/roles/{role_id}"),
            &admin,
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (roles, _) = app
        .get_auth(&format!("/api/v1/users/{user_id}/roles"), &admin)
        .await;
    assert_eq!(roles.as_array().unwrap().len(), 1);
    assert_eq!(roles[0]["code"], "REPORTER");

    let (users, _) = app
        .get_auth(&format!("/api/v1/roles/{role_id}/users"), &admin)
        .await;
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["username"], "alice");

    // Removal clears both directions.
    let (_, status) = app
        .delete_auth(&format!("/api/v1/users/{user_id}/roles/{role_id}"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (users, _) = app
        .get_auth(&format!("/api/v1/roles/{role_id}/users"), &admin)
        .await;
    assert!(users.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn bulk_role_assignment_is_all_or_nothing() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();

    let bogus = uuid::Uuid::now_v7();
    let (_, status) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/roles"),
            &admin,
            &json!([role_id, bogus]),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The valid half must not have been applied.
    let (roles, _) = app
        .get_auth(&format!("/api/v1/users/{user_id}/roles"), &admin)
        .await;
    assert!(roles.as_array().unwrap().is_empty());

    // All valid ids: applied in one shot.
    let (_, status) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/roles"),
            &admin,
            &json!([role_id]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (roles, _) = app
        .get_auth(&format!("/api/v1/users/{user_id}/roles"), &admin)
        .await;
    assert_eq!(roles.as_array().unwrap().len(), 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn removing_all_roles_requires_admin() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();
    let um = app.token("um", &["USER_MANAGER"]);

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();
    app.post_auth(
        &format!("/api/v1/users/{user_id}/roles/{role_id}"),
        &admin,
        &json!({}),
    )
    .await;

    let (_, status) = app
        .delete_auth(&format!("/api/v1/users/{user_id}/roles"), &um)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app
        .delete_auth(&format!("/api/v1/users/{user_id}/roles"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (roles, _) = app
        .get_auth(&format!("/api/v1/users/{user_id}/roles"), &admin)
        .await;
    assert!(roles.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

// ── Effective permissions & screens ─────────────────────────────

/// Wire up REPORTER -> REPORT_READ and return the reporter's token.
async fn seed_reporter(app: &common::TestApp) -> String {
    let admin = app.admin_token();
    let role = app.create_role(&admin, "Reporter", "REPORTER").await;
    let role_id = role["id"].as_str().unwrap();
    let perm = app
        .create_permission(&admin, "REPORT_READ", "report", "read")
        .await;
    let perm_id = perm["id"].as_str().unwrap();
    let (_, status) = app
        .post_auth(
            &format!("/api/v1/roles/{role_id}/permissions/{perm_id}"),
            &admin,
            &json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.token("reporter", &["REPORTER"])
}

#[tokio::test]
async fn effective_codes_union_stored_and_derived_forms() {
    let app = common::spawn_app().await;
    let reporter = seed_reporter(&app).await;

    let (codes, status) = app.get_auth("/api/v1/permissions/effective", &reporter).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = codes.as_array().unwrap().iter().map(|c| c.as_str().unwrap()).collect();
    assert!(codes.contains(&"REPORT_READ"));
    assert!(codes.contains(&"report:read"));

    common::cleanup(app).await;
}

#[tokio::test]
async fn screen_access_follows_required_permissions() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();
    let reporter = seed_reporter(&app).await;
    let plain = app.token("plain", &[]);

    let (screen, status) = app
        .post_auth(
            "/api/v1/screens",
            &admin,
            &json!({
                "code": "reports",
                "name": "Reports",
                "type": "DASHBOARD",
                "required_permissions": ["REPORT_READ"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let screen_id = screen["id"].as_str().unwrap();

    let (accessible, _) = app.get_auth("/api/v1/screens/accessible", &reporter).await;
    assert_eq!(accessible.as_array().unwrap().len(), 1);

    let (accessible, _) = app.get_auth("/api/v1/screens/accessible", &plain).await;
    assert!(accessible.as_array().unwrap().is_empty());

    let (check, _) = app
        .get_auth(&format!("/api/v1/screens/{screen_id}/access"), &plain)
        .await;
    assert_eq!(check["accessible"], false);

    common::cleanup(app).await;
}

#[tokio::test]
async fn public_screens_bypass_permission_gates() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();
    let plain = app.token("plain", &[]);

    app.post_auth(
        "/api/v1/screens",
        &admin,
        &json!({
            "code": "landing",
            "name": "Landing",
            "type": "PAGE",
            "public_access": true,
            "required_permissions": ["REPORT_READ"],
        }),
    )
    .await;

    let (accessible, _) = app.get_auth("/api/v1/screens/accessible", &plain).await;
    assert_eq!(accessible.as_array().unwrap().len(), 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn screen_mutation_is_admin_only() {
    let app = common::spawn_app().await;
    let plain = app.token("plain", &[]);

    let (_, status) = app
        .post_auth(
            "/api/v1/screens",
            &plain,
            &json!({ "code": "x", "name": "X", "type": "PAGE" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

// ── Menus ───────────────────────────────────────────────────────

#[tokio::test]
async fn menu_tree_filters_gated_branches() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();
    let reporter = seed_reporter(&app).await;
    let plain = app.token("plain", &[]);

    let (parent, status) = app
        .post_auth(
            "/api/v1/menus",
            &admin,
            &json!({
                "code": "reports",
                "name": "Reports",
                "required_permission": "REPORT_READ",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let parent_id = parent["id"].as_str().unwrap();

    // Ungated child under the gated parent.
    let (child, status) = app
        .post_auth(
            "/api/v1/menus",
            &admin,
            &json!({
                "code": "monthly",
                "name": "Monthly",
                "parent_id": parent_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(child["level"], 1);

    // Reporter sees the branch.
    let (tree, _) = app.get_auth("/api/v1/menus/tree", &reporter).await;
    let tree = tree.as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["children"].as_array().unwrap().len(), 1);

    // Without the code, the parent is filtered and the child falls with it.
    let (tree, _) = app.get_auth("/api/v1/menus/tree", &plain).await;
    assert!(tree.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn hidden_menus_stay_hidden_even_when_granted() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();
    let reporter = seed_reporter(&app).await;

    let (menu, _) = app
        .post_auth(
            "/api/v1/menus",
            &admin,
            &json!({ "code": "beta", "name": "Beta", "required_permission": "REPORT_READ" }),
        )
        .await;
    let id = menu["id"].as_str().unwrap();
    app.put_auth(&format!("/api/v1/menus/{id}"), &admin, &json!({ "visible": false }))
        .await;

    let (tree, _) = app.get_auth("/api/v1/menus/tree", &reporter).await;
    assert!(tree.as_array().unwrap().is_empty());

    // ADMIN browses the full catalog regardless of gating.
    let (all, _) = app.get_auth("/api/v1/menus", &admin).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn menu_cannot_be_its_own_parent() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let (menu, _) = app
        .post_auth("/api/v1/menus", &admin, &json!({ "code": "m", "name": "M" }))
        .await;
    let id = menu["id"].as_str().unwrap();

    let (_, status) = app
        .put_auth(&format!("/api/v1/menus/{id}"), &admin, &json!({ "parent_id": id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

// ── Papers ──────────────────────────────────────────────────────

#[tokio::test]
async fn paper_gating_denies_rather_than_hides_on_direct_fetch() {
    let app = common::spawn_app().await;
    let reporter = seed_reporter(&app).await;
    let plain = app.token("plain", &[]);

    let (paper, status) = app
        .post_auth(
            "/api/v1/papers",
            &reporter,
            &json!({
                "code": "sec-policy",
                "title": "Security Policy",
                "type": "POLICY",
                "required_permissions": ["REPORT_READ"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = paper["id"].as_str().unwrap();

    // The record exists; an ungranted caller gets Forbidden, not NotFound.
    let (_, status) = app.get_auth(&format!("/api/v1/papers/{id}"), &plain).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (body, status) = app.get_auth(&format!("/api/v1/papers/{id}"), &reporter).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DRAFT");

    // Listing hides what a direct fetch would deny.
    let (list, _) = app.get_auth("/api/v1/papers", &plain).await;
    assert!(list["papers"].as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn publish_stamps_published_at_and_archive_follows() {
    let app = common::spawn_app().await;
    let reporter = seed_reporter(&app).await;

    let (paper, _) = app
        .post_auth(
            "/api/v1/papers",
            &reporter,
            &json!({ "code": "handbook", "title": "Handbook", "type": "MANUAL" }),
        )
        .await;
    let id = paper["id"].as_str().unwrap();
    assert!(paper["published_at"].is_null());

    let (body, status) = app
        .post_auth(&format!("/api/v1/papers/{id}/publish"), &reporter, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PUBLISHED");
    assert!(body["published_at"].is_string());

    let (body, status) = app
        .post_auth(&format!("/api/v1/papers/{id}/archive"), &reporter, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ARCHIVED");

    common::cleanup(app).await;
}

#[tokio::test]
async fn expired_papers_cannot_be_published() {
    let app = common::spawn_app().await;
    let token = app.token("writer", &[]);

    let (paper, _) = app
        .post_auth(
            "/api/v1/papers",
            &token,
            &json!({
                "code": "old-news",
                "title": "Old News",
                "type": "DOCUMENT",
                "expires_at": "2001-01-01T00:00:00Z",
            }),
        )
        .await;
    let id = paper["id"].as_str().unwrap();

    let (_, status) = app
        .post_auth(&format!("/api/v1/papers/{id}/publish"), &token, &json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::cleanup(app).await;
}

#[tokio::test]
async fn duplicate_paper_code_conflicts() {
    let app = common::spawn_app().await;
    let token = app.token("writer", &[]);

    app.post_auth(
        "/api/v1/papers",
        &token,
        &json!({ "code": "p1", "title": "One", "type": "DOCUMENT" }),
    )
    .await;
    let (_, status) = app
        .post_auth(
            "/api/v1/papers",
            &token,
            &json!({ "code": "p1", "title": "Two", "type": "DOCUMENT" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    common::cleanup(app).await;
}

// ── Profiles ────────────────────────────────────────────────────

#[tokio::test]
async fn profile_default_flag_is_exclusive_per_user() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let alice = app.token("alice", &[]);

    let (p1, status) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/profiles"),
            &alice,
            &json!({ "name": "work", "type": "PROFESSIONAL" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "profile create failed: {p1}");
    let (p2, _) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/profiles"),
            &alice,
            &json!({ "name": "home", "type": "PERSONAL" }),
        )
        .await;
    let p1_id = p1["id"].as_str().unwrap();
    let p2_id = p2["id"].as_str().unwrap();

    app.post_auth(&format!("/api/v1/profiles/{p1_id}/default"), &alice, &json!({}))
        .await;
    app.post_auth(&format!("/api/v1/profiles/{p2_id}/default"), &alice, &json!({}))
        .await;

    let (profiles, _) = app
        .get_auth(&format!("/api/v1/users/{user_id}/profiles"), &alice)
        .await;
    let profiles = profiles.as_array().unwrap();
    let defaults: Vec<_> = profiles.iter().filter(|p| p["is_default"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"].as_str().unwrap(), p2_id);

    common::cleanup(app).await;
}

#[tokio::test]
async fn private_profiles_are_not_readable_by_strangers() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let alice = app.token("alice", &[]);
    let stranger = app.token("stranger", &[]);

    let (private, _) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/profiles"),
            &alice,
            &json!({ "name": "work", "type": "PROFESSIONAL" }),
        )
        .await;
    let (public, _) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/profiles"),
            &alice,
            &json!({ "name": "card", "type": "PERSONAL", "is_public": true }),
        )
        .await;

    let private_id = private["id"].as_str().unwrap();
    let public_id = public["id"].as_str().unwrap();

    let (_, status) = app
        .get_auth(&format!("/api/v1/profiles/{private_id}"), &stranger)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app
        .get_auth(&format!("/api/v1/profiles/{public_id}"), &stranger)
        .await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}

#[tokio::test]
async fn profile_attributes_round_trip_as_json() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    let user = app.create_user(&admin, "alice", "alice@example.com").await;
    let user_id = user["id"].as_str().unwrap();
    let alice = app.token("alice", &[]);

    let (profile, _) = app
        .post_auth(
            &format!("/api/v1/users/{user_id}/profiles"),
            &alice,
            &json!({
                "name": "work",
                "type": "PROFESSIONAL",
                "attributes": { "desk": "B-12" },
                "preferences": { "theme": "dark" },
                "permissions": ["report:read"],
            }),
        )
        .await;
    assert_eq!(profile["attributes"]["desk"], "B-12");

    let id = profile["id"].as_str().unwrap();
    let (updated, status) = app
        .put_auth(
            &format!("/api/v1/profiles/{id}"),
            &alice,
            &json!({ "preferences": { "theme": "light" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["preferences"]["theme"], "light");
    assert_eq!(updated["version"], 1);

    common::cleanup(app).await;
}

// ── Statistics & existence checks ───────────────────────────────

#[tokio::test]
async fn statistics_count_by_status() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;
    let bob = app.create_user(&admin, "bob", "bob@example.com").await;
    let bob_id = bob["id"].as_str().unwrap();
    app.post_auth(&format!("/api/v1/users/{bob_id}/deactivate"), &admin, &json!({}))
        .await;

    let (stats, status) = app.get_auth("/api/v1/users/statistics", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["active_users"], 1);
    assert_eq!(stats["inactive_users"], 1);
    assert_eq!(stats["locked_users"], 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn existence_checks_report_taken_identifiers() {
    let app = common::spawn_app().await;
    let admin = app.admin_token();

    app.create_user(&admin, "alice", "alice@example.com").await;

    let (body, _) = app.get_auth("/api/v1/users/check/username/alice", &admin).await;
    assert_eq!(body["exists"], true);
    let (body, _) = app.get_auth("/api/v1/users/check/username/nobody", &admin).await;
    assert_eq!(body["exists"], false);
    let (body, _) = app
        .get_auth("/api/v1/users/check/email/alice@example.com", &admin)
        .await;
    assert_eq!(body["exists"], true);

    common::cleanup(app).await;
}
