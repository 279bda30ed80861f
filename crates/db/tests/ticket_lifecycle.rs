//! Integration tests for the ticket lifecycle state machine at the
//! repository layer: guarded status moves, the comment-driven waiting
//! toggle, close/rating single-write, and cancellation.

use helpdesk_core::status::TicketStatus;
use helpdesk_core::ticket::format_ticket_number;
use helpdesk_core::types::DbId;
use helpdesk_db::models::agent::{Agent, CreateAgent};
use helpdesk_db::models::category::CreateCategory;
use helpdesk_db::models::ticket::{CreateTicket, Ticket, TicketListQuery};
use helpdesk_db::models::user::CreateUser;
use helpdesk_db::repositories::{AgentRepo, CategoryRepo, TicketRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ROLE_AGENT_ID: i16 = 2;
const ROLE_CLIENT_ID: i16 = 3;

async fn create_user(pool: &PgPool, username: &str, role_id: i16) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            role_id,
        },
    )
    .await
    .expect("user creation should succeed")
    .id
}

async fn create_agent(pool: &PgPool, username: &str) -> Agent {
    let user_id = create_user(pool, username, ROLE_AGENT_ID).await;
    AgentRepo::create(
        pool,
        &CreateAgent {
            user_id,
            department: Some("support".to_string()),
            skill_tags: None,
            max_tickets: None,
        },
    )
    .await
    .expect("agent creation should succeed")
}

async fn open_ticket(pool: &PgPool, priority_id: i16) -> Ticket {
    let category_id = CategoryRepo::create(
        pool,
        &CreateCategory {
            name: format!("cat_{priority_id}_{}", unique_suffix()),
            parent_id: None,
        },
    )
    .await
    .expect("category creation should succeed")
    .id;
    let client_id = create_user(pool, &format!("client_{}", unique_suffix()), ROLE_CLIENT_ID).await;
    TicketRepo::create(
        pool,
        client_id,
        &CreateTicket {
            title: "VPN drops every hour".to_string(),
            description: None,
            priority_id,
            category_id,
            subcategory_id: None,
            client_id: None,
        },
    )
    .await
    .expect("ticket creation should succeed")
}

/// An assigned, in-progress ticket.
async fn in_progress_ticket(pool: &PgPool) -> (Ticket, Agent) {
    let ticket = open_ticket(pool, 2).await;
    let agent = create_agent(pool, &format!("agent_{}", unique_suffix())).await;
    let assigned = TicketRepo::assign_manual(pool, ticket.id, agent.user_id)
        .await
        .expect("assign should succeed")
        .expect("ticket should have been open");
    (assigned, agent)
}

fn unique_suffix() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn new_ticket_is_open_with_number_and_due_date(pool: PgPool) {
    let ticket = open_ticket(&pool, 4).await;

    assert_eq!(ticket.status_id, TicketStatus::Open.id());
    assert_eq!(ticket.assignee_id, None);
    assert_eq!(ticket.ticket_number, format_ticket_number(ticket.id));

    // Critical resolution SLA is 240 minutes; due_at lands ~4h out.
    let due = ticket.due_at.expect("due_at should be derived from the SLA policy");
    let minutes = (due - ticket.created_at).num_minutes();
    assert!((239..=241).contains(&minutes), "unexpected due_at offset: {minutes}");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_filters_by_status(pool: PgPool) {
    let open = open_ticket(&pool, 1).await;
    let (assigned, _) = in_progress_ticket(&pool).await;

    let open_only = TicketRepo::list(
        &pool,
        &TicketListQuery {
            status_id: Some(TicketStatus::Open.id()),
            ..Default::default()
        },
    )
    .await
    .expect("listing should succeed");
    assert!(open_only.iter().any(|t| t.id == open.id));
    assert!(!open_only.iter().any(|t| t.id == assigned.id));
}

// ---------------------------------------------------------------------------
// Waiting toggle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn waiting_toggle_follows_comment_direction(pool: PgPool) {
    let (ticket, _) = in_progress_ticket(&pool).await;

    // Internal comment parks the ticket on the client.
    let moved = TicketRepo::set_status_if(
        &pool,
        ticket.id,
        TicketStatus::InProgress,
        TicketStatus::WaitingForClient,
    )
    .await
    .expect("update should succeed");
    assert!(moved);

    // Client reply hands it back.
    let moved = TicketRepo::set_status_if(
        &pool,
        ticket.id,
        TicketStatus::WaitingForClient,
        TicketStatus::InProgress,
    )
    .await
    .expect("update should succeed");
    assert!(moved);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn guarded_move_fails_when_status_differs(pool: PgPool) {
    let ticket = open_ticket(&pool, 2).await;

    // The ticket is Open, not InProgress: the guard must not match.
    let moved = TicketRepo::set_status_if(
        &pool,
        ticket.id,
        TicketStatus::InProgress,
        TicketStatus::WaitingForClient,
    )
    .await
    .expect("update should succeed");
    assert!(!moved);

    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.status_id, TicketStatus::Open.id());
}

// ---------------------------------------------------------------------------
// Resolve / close / rate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn resolve_requires_assignee(pool: PgPool) {
    let ticket = open_ticket(&pool, 2).await;

    // Open, unassigned: the guard rejects the move.
    let resolved = TicketRepo::resolve(&pool, ticket.id)
        .await
        .expect("update should succeed");
    assert!(!resolved);

    let (assigned, _) = in_progress_ticket(&pool).await;
    let resolved = TicketRepo::resolve(&pool, assigned.id)
        .await
        .expect("update should succeed");
    assert!(resolved);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn close_from_resolved_sets_closed_at(pool: PgPool) {
    let (ticket, _) = in_progress_ticket(&pool).await;
    assert!(TicketRepo::resolve(&pool, ticket.id).await.expect("resolve"));

    assert!(TicketRepo::close(&pool, ticket.id).await.expect("close"));

    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.status_id, TicketStatus::Closed.id());
    assert!(current.closed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn closed_ticket_cannot_reopen(pool: PgPool) {
    let (ticket, _) = in_progress_ticket(&pool).await;
    assert!(TicketRepo::close(&pool, ticket.id).await.expect("force close"));

    // Closed -> InProgress is refused by the transition table before
    // any SQL runs.
    let moved = TicketRepo::set_status_if(
        &pool,
        ticket.id,
        TicketStatus::Closed,
        TicketStatus::InProgress,
    )
    .await
    .expect("call should succeed");
    assert!(!moved);

    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.status_id, TicketStatus::Closed.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn satisfaction_rating_is_single_write(pool: PgPool) {
    let (ticket, _) = in_progress_ticket(&pool).await;
    assert!(TicketRepo::resolve(&pool, ticket.id).await.expect("resolve"));
    assert!(TicketRepo::close(&pool, ticket.id).await.expect("close"));

    let rated = TicketRepo::rate(&pool, ticket.id, 5).await.expect("rate");
    assert!(rated);

    // Second write is rejected by the IS NULL guard.
    let rated_again = TicketRepo::rate(&pool, ticket.id, 1).await.expect("rate");
    assert!(!rated_again);

    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.satisfaction_rating, Some(5));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rating_an_open_ticket_is_rejected(pool: PgPool) {
    let ticket = open_ticket(&pool, 2).await;
    let rated = TicketRepo::rate(&pool, ticket.id, 4).await.expect("rate");
    assert!(!rated);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancel_is_legal_from_any_non_terminal_status(pool: PgPool) {
    let open = open_ticket(&pool, 2).await;
    assert!(TicketRepo::cancel(&pool, open.id).await.expect("cancel"));

    let (in_progress, _) = in_progress_ticket(&pool).await;
    assert!(TicketRepo::cancel(&pool, in_progress.id).await.expect("cancel"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancel_of_terminal_ticket_is_rejected(pool: PgPool) {
    let (ticket, _) = in_progress_ticket(&pool).await;
    assert!(TicketRepo::close(&pool, ticket.id).await.expect("close"));

    let cancelled = TicketRepo::cancel(&pool, ticket.id).await.expect("cancel");
    assert!(!cancelled);
}

// ---------------------------------------------------------------------------
// Capacity counting
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn active_count_tracks_non_terminal_tickets(pool: PgPool) {
    let (ticket, agent) = in_progress_ticket(&pool).await;

    let count = TicketRepo::count_active_for_assignee(&pool, agent.user_id)
        .await
        .expect("count should succeed");
    assert_eq!(count, 1);

    // Resolved still counts (the agent may get reopen traffic)...
    assert!(TicketRepo::resolve(&pool, ticket.id).await.expect("resolve"));
    let count = TicketRepo::count_active_for_assignee(&pool, agent.user_id)
        .await
        .expect("count should succeed");
    assert_eq!(count, 1);

    // ...but a closed ticket frees the slot.
    assert!(TicketRepo::close(&pool, ticket.id).await.expect("close"));
    let count = TicketRepo::count_active_for_assignee(&pool, agent.user_id)
        .await
        .expect("count should succeed");
    assert_eq!(count, 0);
}
