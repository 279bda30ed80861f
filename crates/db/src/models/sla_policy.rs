//! SLA policy entity models and DTOs.

use helpdesk_core::status::StatusId;
use helpdesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sla_policies` table. One per priority.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SlaPolicy {
    pub id: DbId,
    pub priority_id: StatusId,
    pub response_minutes: i32,
    pub resolution_minutes: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `PUT /api/v1/sla/policies/{priority_id}`.
#[derive(Debug, Deserialize)]
pub struct UpsertSlaPolicy {
    pub response_minutes: i32,
    pub resolution_minutes: i32,
}
