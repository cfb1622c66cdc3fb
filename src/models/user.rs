use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditFields;

/// Advisory workflow label. The `active` audit flag is the authoritative
/// deleted/active signal; `status` is a display-level state on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Locked,
    Pending,
    Suspended,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub external_id: Option<String>,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub department: Option<String>,
    pub position: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Authoritative lock check: true iff a lock is set and still in the
    /// future. A lock expires on its own; `status` may keep reading LOCKED
    /// until an explicit `unlock`.
    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Utc::now())
    }

    pub fn is_locked_at(&self, at: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > at)
    }

    pub fn lock(&mut self, until: DateTime<Utc>) {
        self.locked_until = Some(until);
        self.status = UserStatus::Locked;
    }

    pub fn unlock(&mut self) {
        self.locked_until = None;
        self.login_attempts = 0;
        self.status = UserStatus::Active;
    }

    pub fn increment_login_attempts(&mut self) {
        self.login_attempts += 1;
    }

    pub fn reset_login_attempts(&mut self) {
        self.login_attempts = 0;
    }

    pub fn update_last_login(&mut self) {
        self.last_login_at = Some(Utc::now());
        self.reset_login_attempts();
    }

    /// One-directional; there is no "unverify".
    pub fn verify_email(&mut self) {
        self.email_verified = true;
    }

    pub fn activate(&mut self) {
        self.audit.active = true;
        self.status = UserStatus::Active;
    }

    /// Soft delete: the record is retained, only flagged inactive.
    pub fn deactivate(&mut self) {
        self.audit.active = false;
        self.status = UserStatus::Inactive;
    }
}
