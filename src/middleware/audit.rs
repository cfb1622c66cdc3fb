use sqlx::PgPool;
use uuid::Uuid;

/// Record an audit event after a mutation. Failures are logged and never
/// fail the request.
pub async fn log_event(
    pool: &PgPool,
    actor: &str,
    action: &str,
    resource_type: &str,
    resource_id: Option<Uuid>,
    details: Option<serde_json::Value>,
) {
    if let Err(e) =
        crate::db::audit::log_event(pool, actor, action, resource_type, resource_id, details).await
    {
        tracing::error!("Failed to log audit event: {e}");
    }
}
