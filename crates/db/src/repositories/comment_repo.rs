//! Repository for the `ticket_comments` table.

use helpdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::comment::{CreateComment, TicketComment};

/// Column list for `ticket_comments` queries.
const COLUMNS: &str = "id, ticket_id, author_id, body, is_internal, created_at";

/// Provides comment persistence; the status toggle a comment triggers
/// lives in `TicketRepo::set_status_if`.
pub struct CommentRepo;

impl CommentRepo {
    /// Add a comment to a ticket.
    pub async fn create(
        pool: &PgPool,
        ticket_id: DbId,
        author_id: DbId,
        input: &CreateComment,
    ) -> Result<TicketComment, sqlx::Error> {
        let query = format!(
            "INSERT INTO ticket_comments (ticket_id, author_id, body, is_internal) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TicketComment>(&query)
            .bind(ticket_id)
            .bind(author_id)
            .bind(&input.body)
            .bind(input.is_internal)
            .fetch_one(pool)
            .await
    }

    /// List a ticket's comments, oldest first. When `include_internal`
    /// is false (client view), internal comments are filtered out.
    pub async fn list_for_ticket(
        pool: &PgPool,
        ticket_id: DbId,
        include_internal: bool,
    ) -> Result<Vec<TicketComment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ticket_comments \
             WHERE ticket_id = $1 AND (is_internal = false OR $2) \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, TicketComment>(&query)
            .bind(ticket_id)
            .bind(include_internal)
            .fetch_all(pool)
            .await
    }
}
