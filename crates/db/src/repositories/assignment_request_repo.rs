//! Repository for the `assignment_requests` table.
//!
//! Holds the two operations with real concurrency requirements: the
//! idempotent broadcast fan-out and the first-accept-wins transaction.
//! The accept path never blocks on a lock held across external calls;
//! the loser of the race observes a zero-row conditional update and
//! returns without writing anything.

use helpdesk_core::status::{RequestStatus, TicketStatus};
use helpdesk_core::ticket::NOTE_ACCEPTED_ELSEWHERE;
use helpdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::agent::Agent;
use crate::models::assignment_request::{
    AcceptOutcome, AcceptedAssignment, AssignmentRequest, BroadcastedRequest,
};
use crate::models::ticket::Ticket;

/// Column list for `assignment_requests` queries.
const COLUMNS: &str = "\
    id, ticket_id, agent_id, status_id, requested_at, responded_at, response_note";

/// Column list for `tickets` rows returned from the accept transaction.
const TICKET_COLUMNS: &str = "\
    id, ticket_number, title, description, priority_id, status_id, \
    category_id, subcategory_id, assignee_id, client_id, created_by, \
    satisfaction_rating, due_at, assigned_at, closed_at, \
    response_breach_at, resolution_breach_at, created_at, updated_at";

/// Provides broadcast and resolution operations for assignment requests.
pub struct AssignmentRequestRepo;

impl AssignmentRequestRepo {
    /// Fan out one `Pending` request per agent linked to `category_id`.
    ///
    /// `ON CONFLICT DO NOTHING` on the `(ticket_id, agent_id)` pair makes
    /// re-broadcast a no-op, not an error: only rows actually inserted
    /// are returned, so callers notify each agent exactly once. An empty
    /// result with no prior requests means the ticket is unassignable.
    pub async fn broadcast(
        pool: &PgPool,
        ticket_id: DbId,
        category_id: DbId,
    ) -> Result<Vec<BroadcastedRequest>, sqlx::Error> {
        let inserted: Vec<(DbId, DbId)> = sqlx::query_as(
            "INSERT INTO assignment_requests (ticket_id, agent_id, status_id) \
             SELECT $1, ac.agent_id, $3 \
             FROM agent_categories ac \
             JOIN agents a ON a.id = ac.agent_id \
             JOIN users u ON u.id = a.user_id \
             WHERE ac.category_id = $2 AND u.is_active = true \
             ON CONFLICT (ticket_id, agent_id) DO NOTHING \
             RETURNING id, agent_id",
        )
        .bind(ticket_id)
        .bind(category_id)
        .bind(RequestStatus::Pending.id())
        .fetch_all(pool)
        .await?;

        if inserted.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DbId> = inserted.iter().map(|(id, _)| *id).collect();
        sqlx::query_as::<_, BroadcastedRequest>(
            "SELECT ar.id, ar.ticket_id, ar.agent_id, a.user_id AS agent_user_id \
             FROM assignment_requests ar \
             JOIN agents a ON a.id = ar.agent_id \
             WHERE ar.id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(pool)
        .await
    }

    /// Find a request by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<AssignmentRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assignment_requests WHERE id = $1");
        sqlx::query_as::<_, AssignmentRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all requests for a ticket, oldest first.
    pub async fn list_for_ticket(
        pool: &PgPool,
        ticket_id: DbId,
    ) -> Result<Vec<AssignmentRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM assignment_requests \
             WHERE ticket_id = $1 ORDER BY requested_at ASC, id ASC"
        );
        sqlx::query_as::<_, AssignmentRequest>(&query)
            .bind(ticket_id)
            .fetch_all(pool)
            .await
    }

    /// List an agent's pending requests, oldest first.
    pub async fn list_pending_for_agent(
        pool: &PgPool,
        agent_id: DbId,
    ) -> Result<Vec<AssignmentRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM assignment_requests \
             WHERE agent_id = $1 AND status_id = $2 \
             ORDER BY requested_at ASC, id ASC"
        );
        sqlx::query_as::<_, AssignmentRequest>(&query)
            .bind(agent_id)
            .bind(RequestStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Reject a pending request.
    ///
    /// Single guarded update: returns the updated row, or `None` when
    /// the request had already left `Pending`.
    pub async fn reject(
        pool: &PgPool,
        request_id: DbId,
        note: Option<&str>,
    ) -> Result<Option<AssignmentRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE assignment_requests \
             SET status_id = $2, responded_at = NOW(), response_note = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AssignmentRequest>(&query)
            .bind(request_id)
            .bind(RequestStatus::Rejected.id())
            .bind(note)
            .bind(RequestStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Accept a pending request: the first-accept-wins transaction.
    ///
    /// All checks and writes commit together or not at all:
    ///
    /// 1. Re-count the agent's active tickets against `max_tickets`.
    /// 2. Conditionally move the ticket `Open -> InProgress` and set the
    ///    assignee. Zero rows affected means another agent won; the
    ///    transaction rolls back leaving this request `Pending`.
    /// 3. Mark this request `Accepted`.
    /// 4. Cascade-reject every other `Pending` request for the ticket.
    ///
    /// Notifications are the caller's concern and happen strictly after
    /// commit.
    pub async fn accept(
        pool: &PgPool,
        request: &AssignmentRequest,
        agent: &Agent,
        note: Option<&str>,
    ) -> Result<AcceptOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Capacity re-check inside the transaction: the count may have
        // changed since the request was offered.
        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets \
             WHERE assignee_id = $1 AND status_id IN ($2, $3, $4, $5)",
        )
        .bind(agent.user_id)
        .bind(TicketStatus::InProgress.id())
        .bind(TicketStatus::WaitingForClient.id())
        .bind(TicketStatus::WaitingForThirdParty.id())
        .bind(TicketStatus::Resolved.id())
        .fetch_one(&mut *tx)
        .await?;

        if active >= i64::from(agent.max_tickets) {
            tx.rollback().await?;
            return Ok(AcceptOutcome::AtCapacity {
                max_tickets: agent.max_tickets,
            });
        }

        // The compare-and-set guarded by the ticket's status column.
        let ticket_query = format!(
            "UPDATE tickets \
             SET status_id = $3, assignee_id = $2, assigned_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {TICKET_COLUMNS}"
        );
        let ticket = sqlx::query_as::<_, Ticket>(&ticket_query)
            .bind(request.ticket_id)
            .bind(agent.user_id)
            .bind(TicketStatus::InProgress.id())
            .bind(TicketStatus::Open.id())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(ticket) = ticket else {
            tx.rollback().await?;
            return Ok(AcceptOutcome::LostRace);
        };

        let request_query = format!(
            "UPDATE assignment_requests \
             SET status_id = $2, responded_at = NOW(), response_note = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, AssignmentRequest>(&request_query)
            .bind(request.id)
            .bind(RequestStatus::Accepted.id())
            .bind(note)
            .bind(RequestStatus::Pending.id())
            .fetch_optional(&mut *tx)
            .await?;

        // The request was re-checked Pending before entering here and the
        // ticket CAS succeeded, so a missing row means a concurrent writer
        // touched the request outside the protocol. Roll back and report
        // the race rather than committing a half-applied accept.
        let Some(updated) = updated else {
            tracing::warn!(
                request_id = request.id,
                ticket_id = request.ticket_id,
                "Accept raced with an out-of-band request update; rolling back"
            );
            tx.rollback().await?;
            return Ok(AcceptOutcome::LostRace);
        };

        sqlx::query(
            "UPDATE assignment_requests \
             SET status_id = $3, responded_at = NOW(), response_note = $4 \
             WHERE ticket_id = $1 AND id <> $2 AND status_id = $5",
        )
        .bind(request.ticket_id)
        .bind(request.id)
        .bind(RequestStatus::Rejected.id())
        .bind(NOTE_ACCEPTED_ELSEWHERE)
        .bind(RequestStatus::Pending.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AcceptOutcome::Accepted(Box::new(AcceptedAssignment {
            request: updated,
            ticket,
        })))
    }
}
