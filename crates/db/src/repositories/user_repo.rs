//! Repository for the `users` table.

use helpdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User, UserWithRole};

/// Column list for `users` queries.
const COLUMNS: &str = "id, username, role_id, is_active, created_at";

/// Provides user lookups for the actor extractor and test fixtures.
pub struct UserRepo;

impl UserRepo {
    /// Create a user.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, role_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(input.role_id)
            .fetch_one(pool)
            .await
    }

    /// IDs of all active users with the admin role.
    pub async fn list_active_admin_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT u.id FROM users u \
             JOIN roles r ON r.id = u.role_id \
             WHERE r.name = $1 AND u.is_active = true \
             ORDER BY u.id ASC",
        )
        .bind(helpdesk_core::roles::ROLE_ADMIN)
        .fetch_all(pool)
        .await
    }

    /// Find an active user joined with their role name.
    pub async fn find_active_with_role(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UserWithRole>, sqlx::Error> {
        sqlx::query_as::<_, UserWithRole>(
            "SELECT u.id, u.username, r.name AS role, u.is_active \
             FROM users u \
             JOIN roles r ON r.id = u.role_id \
             WHERE u.id = $1 AND u.is_active = true",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
