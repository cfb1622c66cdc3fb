use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "paper_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperType {
    Document,
    Form,
    Report,
    Template,
    Policy,
    Procedure,
    Manual,
    Guideline,
    Specification,
    Contract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "paper_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperStatus {
    Draft,
    PendingReview,
    UnderReview,
    Approved,
    Rejected,
    Published,
    Archived,
    Expired,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Paper {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: PaperType,
    pub status: PaperStatus,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub required_permissions: Vec<String>,
    pub tags: Vec<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Paper {
    /// Papers declaring no required permission are readable by any
    /// authenticated principal.
    pub fn readable_by(&self, granted: &HashSet<String>) -> bool {
        self.required_permissions
            .iter()
            .all(|code| granted.contains(code))
    }

    pub fn publish(&mut self) {
        self.status = PaperStatus::Published;
        self.published_at = Some(Utc::now());
    }

    pub fn archive(&mut self) {
        self.status = PaperStatus::Archived;
    }

    pub fn is_published(&self) -> bool {
        self.status == PaperStatus::Published
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at < Utc::now())
    }
}
