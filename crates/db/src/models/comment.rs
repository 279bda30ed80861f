//! Ticket comment entity models and DTOs.

use helpdesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `ticket_comments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TicketComment {
    pub id: DbId,
    pub ticket_id: DbId,
    pub author_id: DbId,
    pub body: String,
    pub is_internal: bool,
    pub created_at: Timestamp,
}

/// DTO for `POST /api/v1/tickets/{id}/comments`.
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateComment {
    #[validate(length(min = 1, max = 20000))]
    pub body: String,
    /// Internal comments are agent-only and park the ticket on the client.
    #[serde(default)]
    pub is_internal: bool,
}
