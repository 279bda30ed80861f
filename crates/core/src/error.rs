use crate::status::TicketStatus;
use crate::types::DbId;

/// Domain-level error type shared by all crates.
///
/// Validation and permission failures are returned synchronously to the
/// caller; the API layer maps each variant onto an HTTP status and a
/// stable machine-readable code so clients can distinguish "stop
/// retrying" outcomes (e.g. [`CoreError::TicketAlreadyAssigned`]) from
/// internal failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The assignment request has already been accepted or rejected.
    #[error("Assignment request {request_id} has already been resolved")]
    AlreadyResolved { request_id: DbId },

    /// Lost the accept race: the ticket left `Open` between the request
    /// being offered and this response. The request stays `Pending`.
    #[error("Ticket {ticket_id} has already been assigned to another agent")]
    TicketAlreadyAssigned { ticket_id: DbId },

    /// Accepting would push the agent past their `max_tickets` limit.
    #[error("Agent {agent_id} is at capacity ({max_tickets} active tickets)")]
    AgentAtCapacity { agent_id: DbId, max_tickets: i32 },

    /// The requested lifecycle move is not legal from the current status.
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
