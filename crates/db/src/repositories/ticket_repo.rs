//! Repository for the `tickets` table.
//!
//! Every lifecycle mutation is a status-guarded conditional update: the
//! `WHERE` clause re-checks the expected current status, and
//! `rows_affected() == 0` means the move was illegal or lost a race.
//! Callers translate that into the typed domain errors. Status literals
//! are always bound from the `helpdesk_core` enums.

use helpdesk_core::status::TicketStatus;
use helpdesk_core::ticket::NOTE_MANUALLY_ASSIGNED;
use helpdesk_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::ticket::{CreateTicket, SlaScanRow, Ticket, TicketListQuery};

/// Column list for `tickets` queries.
const COLUMNS: &str = "\
    id, ticket_number, title, description, priority_id, status_id, \
    category_id, subcategory_id, assignee_id, client_id, created_by, \
    satisfaction_rating, due_at, assigned_at, closed_at, \
    response_breach_at, resolution_breach_at, created_at, updated_at";

/// Maximum page size for ticket listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for ticket listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD and guarded lifecycle operations for tickets.
pub struct TicketRepo;

impl TicketRepo {
    /// Create a new `Open` ticket.
    ///
    /// `due_at` is derived from the resolution threshold of the
    /// priority's SLA policy at creation time; a missing policy leaves
    /// it unset rather than failing the create.
    pub async fn create(
        pool: &PgPool,
        created_by: DbId,
        input: &CreateTicket,
    ) -> Result<Ticket, sqlx::Error> {
        let query = format!(
            "INSERT INTO tickets \
                 (title, description, priority_id, status_id, category_id, \
                  subcategory_id, client_id, created_by, due_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                     NOW() + (SELECT make_interval(mins => resolution_minutes) \
                              FROM sla_policies WHERE priority_id = $3)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.priority_id)
            .bind(TicketStatus::Open.id())
            .bind(input.category_id)
            .bind(input.subcategory_id)
            .bind(input.client_id.unwrap_or(created_by))
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a ticket by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
        sqlx::query_as::<_, Ticket>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List tickets with optional status/assignee/client filters and
    /// pagination, newest first.
    pub async fn list(
        pool: &PgPool,
        params: &TicketListQuery,
    ) -> Result<Vec<Ticket>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.assignee_id.is_some() {
            conditions.push(format!("assignee_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.client_id.is_some() {
            conditions.push(format!("client_id = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM tickets \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, Ticket>(&query);

        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        if let Some(aid) = params.assignee_id {
            q = q.bind(aid);
        }
        if let Some(cid) = params.client_id {
            q = q.bind(cid);
        }

        q = q.bind(limit).bind(offset);

        q.fetch_all(pool).await
    }

    /// List `Open` tickets with zero pending assignment requests.
    ///
    /// These are the "unassignable" tickets the broadcaster found no
    /// eligible agents for; admins assign them manually.
    pub async fn list_unassignable(pool: &PgPool) -> Result<Vec<Ticket>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tickets t \
             WHERE t.status_id = $1 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM assignment_requests ar \
                   WHERE ar.ticket_id = t.id AND ar.status_id = $2 \
               ) \
             ORDER BY t.created_at ASC"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(TicketStatus::Open.id())
            .bind(helpdesk_core::status::RequestStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Conditionally move a ticket from `from` to `to`.
    ///
    /// Returns `false` when the move is not in the transition table or
    /// the ticket was not in `from` (a concurrent writer got there
    /// first). Never coerces.
    pub async fn set_status_if(
        pool: &PgPool,
        ticket_id: DbId,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, sqlx::Error> {
        if !from.can_transition(to) {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE tickets SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(ticket_id)
        .bind(from.id())
        .bind(to.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a ticket `Resolved`.
    ///
    /// Legal only from `InProgress` / `Waiting*` and only while an
    /// assignee is set. Returns `false` when the guard did not match.
    pub async fn resolve(pool: &PgPool, ticket_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4, $5) AND assignee_id IS NOT NULL",
        )
        .bind(ticket_id)
        .bind(TicketStatus::Resolved.id())
        .bind(TicketStatus::InProgress.id())
        .bind(TicketStatus::WaitingForClient.id())
        .bind(TicketStatus::WaitingForThirdParty.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Close a ticket, setting `closed_at`.
    ///
    /// Legal from `Resolved` (client confirmation) and `InProgress`
    /// (force-close). Returns `false` when the guard did not match.
    pub async fn close(pool: &PgPool, ticket_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET status_id = $2, closed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(ticket_id)
        .bind(TicketStatus::Closed.id())
        .bind(TicketStatus::Resolved.id())
        .bind(TicketStatus::InProgress.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the client's satisfaction rating, exactly once.
    ///
    /// The `satisfaction_rating IS NULL` guard makes the write
    /// single-shot: a second attempt affects zero rows and the caller
    /// reports a conflict.
    pub async fn rate(
        pool: &PgPool,
        ticket_id: DbId,
        rating: i16,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET satisfaction_rating = $2, updated_at = NOW() \
             WHERE id = $1 AND satisfaction_rating IS NULL \
               AND status_id IN ($3, $4)",
        )
        .bind(ticket_id)
        .bind(rating)
        .bind(TicketStatus::Resolved.id())
        .bind(TicketStatus::Closed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a ticket if it is not already in a terminal state.
    pub async fn cancel(pool: &PgPool, ticket_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET status_id = $2, closed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4)",
        )
        .bind(ticket_id)
        .bind(TicketStatus::Cancelled.id())
        .bind(TicketStatus::Closed.id())
        .bind(TicketStatus::Cancelled.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Manually assign an `Open` ticket to an agent's user (admin path).
    ///
    /// Equivalent to a broadcast accept for invariant purposes: the same
    /// conditional update moves the ticket out of `Open`, and all
    /// outstanding `Pending` requests are cascade-rejected in the same
    /// transaction so none of them can later accept. Returns the updated
    /// ticket, or `None` when the ticket was not `Open`.
    pub async fn assign_manual(
        pool: &PgPool,
        ticket_id: DbId,
        assignee_user_id: DbId,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE tickets \
             SET status_id = $3, assignee_id = $2, assigned_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        let ticket = sqlx::query_as::<_, Ticket>(&query)
            .bind(ticket_id)
            .bind(assignee_user_id)
            .bind(TicketStatus::InProgress.id())
            .bind(TicketStatus::Open.id())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(ticket) = ticket else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE assignment_requests \
             SET status_id = $2, responded_at = NOW(), response_note = $3 \
             WHERE ticket_id = $1 AND status_id = $4",
        )
        .bind(ticket_id)
        .bind(helpdesk_core::status::RequestStatus::Rejected.id())
        .bind(NOTE_MANUALLY_ASSIGNED)
        .bind(helpdesk_core::status::RequestStatus::Pending.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ticket))
    }

    /// Reassign an in-flight ticket to a different agent's user.
    ///
    /// Only legal while the ticket is assigned and non-terminal; no
    /// requests can be `Pending` once the ticket has left `Open`, so no
    /// cascade is needed.
    pub async fn reassign(
        pool: &PgPool,
        ticket_id: DbId,
        assignee_user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET assignee_id = $2, assigned_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND assignee_id IS NOT NULL AND status_id IN ($3, $4, $5)",
        )
        .bind(ticket_id)
        .bind(assignee_user_id)
        .bind(TicketStatus::InProgress.id())
        .bind(TicketStatus::WaitingForClient.id())
        .bind(TicketStatus::WaitingForThirdParty.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch all active tickets joined with their priority's SLA policy
    /// for one monitor tick.
    pub async fn list_active_for_sla(pool: &PgPool) -> Result<Vec<SlaScanRow>, sqlx::Error> {
        sqlx::query_as::<_, SlaScanRow>(
            "SELECT t.id, t.ticket_number, t.status_id, t.priority_id, \
                    t.assignee_id, t.client_id, t.created_at, t.assigned_at, \
                    t.response_breach_at, t.resolution_breach_at, \
                    p.response_minutes, p.resolution_minutes \
             FROM tickets t \
             LEFT JOIN sla_policies p ON p.priority_id = t.priority_id \
             WHERE t.status_id IN ($1, $2, $3, $4) \
             ORDER BY t.created_at ASC",
        )
        .bind(TicketStatus::Open.id())
        .bind(TicketStatus::InProgress.id())
        .bind(TicketStatus::WaitingForClient.id())
        .bind(TicketStatus::WaitingForThirdParty.id())
        .fetch_all(pool)
        .await
    }

    /// Idempotently stamp the response-breach marker.
    ///
    /// Returns `true` only for the tick that actually set the marker, so
    /// the breach event fires exactly once per ticket.
    pub async fn mark_response_breach(
        pool: &PgPool,
        ticket_id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET response_breach_at = $2 \
             WHERE id = $1 AND response_breach_at IS NULL",
        )
        .bind(ticket_id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Idempotently stamp the resolution-breach marker.
    pub async fn mark_resolution_breach(
        pool: &PgPool,
        ticket_id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET resolution_breach_at = $2 \
             WHERE id = $1 AND resolution_breach_at IS NULL",
        )
        .bind(ticket_id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a user's assigned tickets in non-terminal statuses.
    ///
    /// This is the number checked against the agent's `max_tickets`.
    pub async fn count_active_for_assignee(
        pool: &PgPool,
        assignee_user_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets \
             WHERE assignee_id = $1 AND status_id IN ($2, $3, $4, $5)",
        )
        .bind(assignee_user_id)
        .bind(TicketStatus::InProgress.id())
        .bind(TicketStatus::WaitingForClient.id())
        .bind(TicketStatus::WaitingForThirdParty.id())
        .bind(TicketStatus::Resolved.id())
        .fetch_one(pool)
        .await
    }

}
