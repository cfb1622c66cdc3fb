use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "screen_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreenType {
    Page,
    Component,
    Modal,
    Dialog,
    Form,
    Report,
    Dashboard,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Screen {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: ScreenType,
    pub module: Option<String>,
    pub route: Option<String>,
    pub component: Option<String>,
    pub public_access: bool,
    pub auth_required: bool,
    pub required_permissions: Vec<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Screen {
    /// Public screens are open to everyone; otherwise every required code
    /// must be in the principal's effective permission set. An empty
    /// requirement set admits any authenticated principal.
    pub fn accessible_by(&self, granted: &HashSet<String>) -> bool {
        self.public_access
            || self
                .required_permissions
                .iter()
                .all(|code| granted.contains(code))
    }
}
