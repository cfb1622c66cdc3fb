use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "permission_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    Menu,
    Screen,
    Paper,
    Profile,
    Api,
    Functional,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub resource: String,
    pub action: String,
    pub system_permission: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Permission {
    /// Canonical `resource:action` string compared during access checks.
    pub fn full_code(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}
