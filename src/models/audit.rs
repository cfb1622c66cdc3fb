use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit columns shared by every persisted entity.
///
/// `version` is the optimistic-concurrency counter and `active` the single
/// authoritative soft-delete signal. Both timestamps and the version bump
/// are maintained by the repository layer's UPDATE statements
/// (`updated_at = now(), version = version + 1`), never by handlers.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub active: bool,
}
