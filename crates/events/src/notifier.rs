//! The notifier port and its inbox-backed implementation.
//!
//! The core calls [`Notifier::notify`] to tell a user about an event and
//! moves on: delivery is fire-and-forget, failures are logged and never
//! propagated to the triggering state change. Transport beyond the
//! database inbox (email, push) is an external concern layered on top by
//! subscribing to the [`EventBus`](crate::bus::EventBus).

use async_trait::async_trait;
use helpdesk_core::types::DbId;
use helpdesk_db::repositories::NotificationRepo;
use helpdesk_db::DbPool;

/// Notification severity, stored on the inbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// The string stored in the `notifications.severity` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Collaborator port for delivering structured events to users.
///
/// Implementations must be best-effort: `notify` does not return a
/// result because the caller has already committed the state change the
/// notification describes and must not roll it back.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: DbId,
        event_type: &str,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: serde_json::Value,
    );
}

/// Inbox-backed notifier: writes one `notifications` row per call.
pub struct DbNotifier {
    pool: DbPool,
}

impl DbNotifier {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for DbNotifier {
    async fn notify(
        &self,
        user_id: DbId,
        event_type: &str,
        title: &str,
        message: &str,
        severity: Severity,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = NotificationRepo::create(
            &self.pool,
            user_id,
            event_type,
            title,
            message,
            severity.as_str(),
            &metadata,
        )
        .await
        {
            tracing::error!(
                error = %e,
                user_id,
                event_type,
                "Failed to write notification row"
            );
        }
    }
}
