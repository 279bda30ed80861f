//! Agent entity models and DTOs.

use helpdesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `agents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Agent {
    pub id: DbId,
    pub user_id: DbId,
    pub department: Option<String>,
    pub skill_tags: serde_json::Value,
    pub max_tickets: i32,
    pub created_at: Timestamp,
}

/// DTO for creating an agent profile.
#[derive(Debug, Deserialize)]
pub struct CreateAgent {
    pub user_id: DbId,
    pub department: Option<String>,
    pub skill_tags: Option<serde_json::Value>,
    pub max_tickets: Option<i32>,
}

/// An agent eligible for a category, joined with their user id.
#[derive(Debug, Clone, FromRow)]
pub struct EligibleAgent {
    pub agent_id: DbId,
    pub user_id: DbId,
}
