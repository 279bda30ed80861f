//! Assignment request entity models and DTOs.

use helpdesk_core::status::StatusId;
use helpdesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ticket::Ticket;

/// A row from the `assignment_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignmentRequest {
    pub id: DbId,
    pub ticket_id: DbId,
    pub agent_id: DbId,
    pub status_id: StatusId,
    pub requested_at: Timestamp,
    pub responded_at: Option<Timestamp>,
    pub response_note: Option<String>,
}

/// Body for `POST /api/v1/assignment-requests/{id}/accept` and `/reject`.
#[derive(Debug, Default, Deserialize)]
pub struct RespondRequest {
    pub note: Option<String>,
}

/// A request created by a broadcast, joined with the agent's user id so
/// the caller can address the notification.
#[derive(Debug, Clone, FromRow)]
pub struct BroadcastedRequest {
    pub id: DbId,
    pub ticket_id: DbId,
    pub agent_id: DbId,
    pub agent_user_id: DbId,
}

/// Result of a successful accept: the winning request and the updated
/// ticket, committed in the same transaction.
#[derive(Debug, Serialize)]
pub struct AcceptedAssignment {
    pub request: AssignmentRequest,
    pub ticket: Ticket,
}

/// Outcome of an accept attempt. Domain-level losses are ordinary
/// outcomes here, not database errors; the API layer maps them onto the
/// typed error kinds.
#[derive(Debug)]
pub enum AcceptOutcome {
    /// This request won; the ticket is now assigned to the agent.
    Accepted(Box<AcceptedAssignment>),
    /// The ticket left `Open` first; the request remains `Pending`.
    LostRace,
    /// The agent's active ticket count has reached `max_tickets`.
    AtCapacity { max_tickets: i32 },
}
