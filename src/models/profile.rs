use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "profile_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    Personal,
    Professional,
    Departmental,
    Project,
    RoleBased,
    Temporary,
    System,
}

/// A named, typed context extension of a User. Owned exclusively by its
/// user and removed with it. At most one profile per user carries
/// `is_default`; `db::profiles::set_default` enforces that transactionally.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: ProfileType,
    pub is_default: bool,
    pub is_public: bool,
    pub attributes: serde_json::Value,
    pub permissions: Vec<String>,
    pub preferences: serde_json::Value,
    pub context: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl UserProfile {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.iter().any(|c| c == code)
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).and_then(|v| v.as_str())
    }

    pub fn preference_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.preference(key).unwrap_or(default)
    }
}
