//! Ticket entity models and DTOs.

use helpdesk_core::status::StatusId;
use helpdesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tickets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub id: DbId,
    pub ticket_number: String,
    pub title: String,
    pub description: Option<String>,
    pub priority_id: StatusId,
    pub status_id: StatusId,
    pub category_id: DbId,
    pub subcategory_id: Option<DbId>,
    pub assignee_id: Option<DbId>,
    pub client_id: DbId,
    pub created_by: DbId,
    pub satisfaction_rating: Option<i16>,
    pub due_at: Option<Timestamp>,
    pub assigned_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub response_breach_at: Option<Timestamp>,
    pub resolution_breach_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /api/v1/tickets`.
#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateTicket {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    /// Priority id (1 = low .. 4 = critical).
    pub priority_id: StatusId,
    pub category_id: DbId,
    pub subcategory_id: Option<DbId>,
    /// The client the ticket is opened for. Defaults to the caller.
    pub client_id: Option<DbId>,
}

/// Query parameters for `GET /api/v1/tickets`.
#[derive(Debug, Default, Deserialize)]
pub struct TicketListQuery {
    pub status_id: Option<StatusId>,
    pub assignee_id: Option<DbId>,
    pub client_id: Option<DbId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// One ticket joined with its priority's SLA policy, as scanned by the
/// SLA monitor.
#[derive(Debug, Clone, FromRow)]
pub struct SlaScanRow {
    pub id: DbId,
    pub ticket_number: String,
    pub status_id: StatusId,
    pub priority_id: StatusId,
    pub assignee_id: Option<DbId>,
    pub client_id: DbId,
    pub created_at: Timestamp,
    pub assigned_at: Option<Timestamp>,
    pub response_breach_at: Option<Timestamp>,
    pub resolution_breach_at: Option<Timestamp>,
    pub response_minutes: Option<i32>,
    pub resolution_minutes: Option<i32>,
}
