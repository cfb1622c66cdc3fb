use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AuditFields, Permission};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub system_role: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

/// A role together with its resolved permission set, as returned by the
/// detail endpoint. The underlying Role↔Permission relation lives in the
/// `role_permissions` join table and is only ever mutated through
/// `db::roles::{add,remove}_permission`.
#[derive(Debug, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl RoleDetail {
    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.code == code)
    }
}
