//! Helpdesk event bus and notification infrastructure.
//!
//! Building blocks for the ticket event system:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TicketEvent`] — the canonical domain event envelope.
//! - [`Notifier`] — the collaborator port the core calls to tell a user
//!   about an event; [`DbNotifier`] is the inbox-backed implementation.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `events` table.

pub mod bus;
pub mod notifier;
pub mod persistence;

pub use bus::{EventBus, TicketEvent};
pub use notifier::{DbNotifier, Notifier, Severity};
pub use persistence::EventPersistence;

/// Dot-separated event type names published on the bus.
pub mod event_types {
    pub const TICKET_CREATED: &str = "ticket.created";
    pub const TICKET_ASSIGNED: &str = "ticket.assigned";
    pub const TICKET_COMMENTED: &str = "ticket.commented";
    pub const TICKET_RESOLVED: &str = "ticket.resolved";
    pub const TICKET_CLOSED: &str = "ticket.closed";
    pub const TICKET_CANCELLED: &str = "ticket.cancelled";
    pub const ASSIGNMENT_REQUESTED: &str = "assignment.requested";
    pub const ASSIGNMENT_ACCEPTED: &str = "assignment.accepted";
    pub const ASSIGNMENT_REJECTED: &str = "assignment.rejected";
    pub const SLA_RESPONSE_BREACH: &str = "sla.response_breach";
    pub const SLA_RESOLUTION_BREACH: &str = "sla.resolution_breach";
}
