//! User entity models.

use helpdesk_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub role_id: i16,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// A user joined with their role name, as resolved by the actor
/// extractor on every request.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserWithRole {
    pub id: DbId,
    pub username: String,
    pub role: String,
    pub is_active: bool,
}

/// DTO for creating a user.
#[derive(Debug, serde::Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub role_id: i16,
}
