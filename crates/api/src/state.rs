use std::sync::Arc;

use helpdesk_events::{EventBus, Notifier};

use crate::background::sla_monitor::SlaMonitor;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: helpdesk_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for publishing ticket events.
    pub event_bus: Arc<EventBus>,
    /// Collaborator port for user notifications (best-effort).
    pub notifier: Arc<dyn Notifier>,
    /// Background SLA monitor, exposed for operational control routes.
    pub sla_monitor: Arc<SlaMonitor>,
}
