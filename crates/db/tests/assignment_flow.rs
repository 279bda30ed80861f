//! Integration tests for the assignment protocol against a real database:
//! broadcast fan-out and idempotency, the first-accept-wins transaction,
//! capacity enforcement, and the manual-assignment cascade.

use assert_matches::assert_matches;
use helpdesk_core::status::{RequestStatus, TicketStatus};
use helpdesk_core::ticket::{NOTE_ACCEPTED_ELSEWHERE, NOTE_MANUALLY_ASSIGNED};
use helpdesk_core::types::DbId;
use helpdesk_db::models::agent::{Agent, CreateAgent};
use helpdesk_db::models::assignment_request::AcceptOutcome;
use helpdesk_db::models::category::CreateCategory;
use helpdesk_db::models::ticket::{CreateTicket, Ticket};
use helpdesk_db::models::user::CreateUser;
use helpdesk_db::repositories::{
    AgentRepo, AssignmentRequestRepo, CategoryRepo, TicketRepo, UserRepo,
};
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

async fn create_agent(pool: &PgPool, username: &str, max_tickets: i32) -> Agent {
    let user_id = create_user(pool, username, ROLE_AGENT_ID).await;
    AgentRepo::create(
        pool,
        &CreateAgent {
            user_id,
            department: None,
            skill_tags: None,
            max_tickets: Some(max_tickets),
        },
    )
    .await
    .expect("agent creation should succeed")
}

async fn create_category(pool: &PgPool, name: &str) -> DbId {
    CategoryRepo::create(
        pool,
        &CreateCategory {
            name: name.to_string(),
            parent_id: None,
        },
    )
    .await
    .expect("category creation should succeed")
    .id
}

async fn create_ticket(pool: &PgPool, client_id: DbId, category_id: DbId) -> Ticket {
    TicketRepo::create(
        pool,
        client_id,
        &CreateTicket {
            title: "Cannot log in".to_string(),
            description: Some("Password reset loop".to_string()),
            priority_id: 3,
            category_id,
            subcategory_id: None,
            client_id: None,
        },
    )
    .await
    .expect("ticket creation should succeed")
}

/// Category with `n` linked agents, plus a client and one open ticket.
async fn setup_broadcast(
    pool: &PgPool,
    n: usize,
    max_tickets: i32,
) -> (Ticket, Vec<Agent>, DbId) {
    let category_id = create_category(pool, "networking").await;
    let mut agents = Vec::new();
    for i in 0..n {
        let agent = create_agent(pool, &format!("agent_{i}"), max_tickets).await;
        AgentRepo::link_category(pool, agent.id, category_id)
            .await
            .expect("link should succeed");
        agents.push(agent);
    }
    let client_id = create_user(pool, "client_1", ROLE_CLIENT_ID).await;
    let ticket = create_ticket(pool, client_id, category_id).await;
    (ticket, agents, client_id)
}

// ---------------------------------------------------------------------------
// Broadcast
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn broadcast_creates_one_request_per_eligible_agent(pool: PgPool) {
    let (ticket, agents, _) = setup_broadcast(&pool, 3, 5).await;

    let created = AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("broadcast should succeed");

    assert_eq!(created.len(), 3);
    let mut agent_ids: Vec<DbId> = created.iter().map(|r| r.agent_id).collect();
    agent_ids.sort_unstable();
    let mut expected: Vec<DbId> = agents.iter().map(|a| a.id).collect();
    expected.sort_unstable();
    assert_eq!(agent_ids, expected);

    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    assert!(requests
        .iter()
        .all(|r| r.status_id == RequestStatus::Pending.id()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn broadcast_twice_creates_no_duplicates(pool: PgPool) {
    let (ticket, _, _) = setup_broadcast(&pool, 2, 5).await;

    let first = AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("first broadcast should succeed");
    assert_eq!(first.len(), 2);

    // Re-broadcast is a no-op, not an error.
    let second = AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("second broadcast should succeed");
    assert!(second.is_empty());

    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    assert_eq!(requests.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn broadcast_with_no_eligible_agents_leaves_ticket_unassignable(pool: PgPool) {
    let category_id = create_category(&pool, "printers").await;
    let client_id = create_user(&pool, "client_1", ROLE_CLIENT_ID).await;
    let ticket = create_ticket(&pool, client_id, category_id).await;

    let created = AssignmentRequestRepo::broadcast(&pool, ticket.id, category_id)
        .await
        .expect("broadcast should succeed");
    assert!(created.is_empty());

    // The ticket stays Open and shows up in the unassignable listing.
    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.status_id, TicketStatus::Open.id());

    let unassignable = TicketRepo::list_unassignable(&pool)
        .await
        .expect("listing should succeed");
    assert!(unassignable.iter().any(|t| t.id == ticket.id));
}

// ---------------------------------------------------------------------------
// Accept / reject
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn accept_assigns_ticket_and_rejects_siblings(pool: PgPool) {
    let (ticket, agents, _) = setup_broadcast(&pool, 3, 5).await;
    AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("broadcast should succeed");

    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    let winner_req = requests
        .iter()
        .find(|r| r.agent_id == agents[0].id)
        .expect("agent 0 should hold a request");

    let outcome = AssignmentRequestRepo::accept(&pool, winner_req, &agents[0], Some("on it"))
        .await
        .expect("accept should succeed");

    let accepted = match outcome {
        AcceptOutcome::Accepted(accepted) => accepted,
        other => panic!("expected Accepted, got {other:?}"),
    };
    assert_eq!(accepted.ticket.status_id, TicketStatus::InProgress.id());
    assert_eq!(accepted.ticket.assignee_id, Some(agents[0].user_id));
    assert!(accepted.ticket.assigned_at.is_some());
    assert_eq!(accepted.request.status_id, RequestStatus::Accepted.id());
    assert_eq!(accepted.request.response_note.as_deref(), Some("on it"));

    // Every sibling is rejected with the system note, in the same commit.
    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    for r in requests.iter().filter(|r| r.id != winner_req.id) {
        assert_eq!(r.status_id, RequestStatus::Rejected.id());
        assert_eq!(r.response_note.as_deref(), Some(NOTE_ACCEPTED_ELSEWHERE));
        assert!(r.responded_at.is_some());
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_accept_loses_race_and_stays_pending(pool: PgPool) {
    let (ticket, agents, _) = setup_broadcast(&pool, 2, 5).await;
    AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("broadcast should succeed");

    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    let req_a = requests.iter().find(|r| r.agent_id == agents[0].id).unwrap();
    let req_b = requests.iter().find(|r| r.agent_id == agents[1].id).unwrap();

    let first = AssignmentRequestRepo::accept(&pool, req_a, &agents[0], None)
        .await
        .expect("first accept should succeed");
    assert_matches!(first, AcceptOutcome::Accepted(_));

    // req_b was cascade-rejected by the winning accept; simulate the
    // stale-read race by replaying the still-Pending snapshot.
    let second = AssignmentRequestRepo::accept(&pool, req_b, &agents[1], None)
        .await
        .expect("second accept should not be a database error");
    assert_matches!(second, AcceptOutcome::LostRace);

    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.assignee_id, Some(agents[0].user_id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_accepts_have_exactly_one_winner(pool: PgPool) {
    let (ticket, agents, _) = setup_broadcast(&pool, 2, 5).await;
    AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("broadcast should succeed");

    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    let req_a = requests.iter().find(|r| r.agent_id == agents[0].id).unwrap().clone();
    let req_b = requests.iter().find(|r| r.agent_id == agents[1].id).unwrap().clone();

    let (res_a, res_b) = tokio::join!(
        AssignmentRequestRepo::accept(&pool, &req_a, &agents[0], None),
        AssignmentRequestRepo::accept(&pool, &req_b, &agents[1], None),
    );
    let res_a = res_a.expect("accept A should not be a database error");
    let res_b = res_b.expect("accept B should not be a database error");

    let winners = [&res_a, &res_b]
        .iter()
        .filter(|o| matches!(o, AcceptOutcome::Accepted(_)))
        .count();
    assert_eq!(winners, 1, "exactly one accept must win");

    // The ticket ends with exactly one assignee, one Accepted request,
    // and no Pending leftovers for the loser to hold.
    let current = TicketRepo::find_by_id(&pool, ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.status_id, TicketStatus::InProgress.id());
    let assignee = current.assignee_id.expect("ticket must have an assignee");
    assert!(assignee == agents[0].user_id || assignee == agents[1].user_id);

    let final_requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    let accepted = final_requests
        .iter()
        .filter(|r| r.status_id == RequestStatus::Accepted.id())
        .count();
    assert_eq!(accepted, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn agent_at_capacity_cannot_accept(pool: PgPool) {
    // max_tickets = 1: the first accept fills the agent up.
    let (first_ticket, agents, client_id) = setup_broadcast(&pool, 1, 1).await;
    AssignmentRequestRepo::broadcast(&pool, first_ticket.id, first_ticket.category_id)
        .await
        .expect("broadcast should succeed");
    let requests = AssignmentRequestRepo::list_for_ticket(&pool, first_ticket.id)
        .await
        .expect("list should succeed");
    let outcome = AssignmentRequestRepo::accept(&pool, &requests[0], &agents[0], None)
        .await
        .expect("accept should succeed");
    assert_matches!(outcome, AcceptOutcome::Accepted(_));

    // Second ticket in the same category; the agent is now full.
    let second_ticket = create_ticket(&pool, client_id, first_ticket.category_id).await;
    AssignmentRequestRepo::broadcast(&pool, second_ticket.id, second_ticket.category_id)
        .await
        .expect("broadcast should succeed");
    let requests = AssignmentRequestRepo::list_for_ticket(&pool, second_ticket.id)
        .await
        .expect("list should succeed");

    let outcome = AssignmentRequestRepo::accept(&pool, &requests[0], &agents[0], None)
        .await
        .expect("accept should not be a database error");
    assert_matches!(outcome, AcceptOutcome::AtCapacity { max_tickets: 1 });

    // The ticket stays Open and the request stays Pending.
    let current = TicketRepo::find_by_id(&pool, second_ticket.id)
        .await
        .expect("find should succeed")
        .expect("ticket should exist");
    assert_eq!(current.status_id, TicketStatus::Open.id());
    assert_eq!(current.assignee_id, None);

    let request = AssignmentRequestRepo::find_by_id(&pool, requests[0].id)
        .await
        .expect("find should succeed")
        .expect("request should exist");
    assert_eq!(request.status_id, RequestStatus::Pending.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reject_is_single_shot(pool: PgPool) {
    let (ticket, _, _) = setup_broadcast(&pool, 1, 5).await;
    AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("broadcast should succeed");
    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");

    let rejected = AssignmentRequestRepo::reject(&pool, requests[0].id, Some("too busy"))
        .await
        .expect("reject should succeed")
        .expect("request should have been pending");
    assert_eq!(rejected.status_id, RequestStatus::Rejected.id());
    assert_eq!(rejected.response_note.as_deref(), Some("too busy"));

    // A request never changes again after leaving Pending.
    let again = AssignmentRequestRepo::reject(&pool, requests[0].id, None)
        .await
        .expect("second reject should not be a database error");
    assert!(again.is_none());
}

// ---------------------------------------------------------------------------
// Manual assignment
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn manual_assign_cascades_pending_requests(pool: PgPool) {
    let (ticket, agents, _) = setup_broadcast(&pool, 2, 5).await;
    AssignmentRequestRepo::broadcast(&pool, ticket.id, ticket.category_id)
        .await
        .expect("broadcast should succeed");

    let assigned = TicketRepo::assign_manual(&pool, ticket.id, agents[1].user_id)
        .await
        .expect("manual assign should succeed")
        .expect("ticket should have been open");
    assert_eq!(assigned.status_id, TicketStatus::InProgress.id());
    assert_eq!(assigned.assignee_id, Some(agents[1].user_id));

    // No stale Pending requests are left to accept later.
    let requests = AssignmentRequestRepo::list_for_ticket(&pool, ticket.id)
        .await
        .expect("list should succeed");
    assert!(requests
        .iter()
        .all(|r| r.status_id == RequestStatus::Rejected.id()));
    assert!(requests
        .iter()
        .all(|r| r.response_note.as_deref() == Some(NOTE_MANUALLY_ASSIGNED)));

    // A replayed accept on the rejected snapshot loses cleanly.
    let outcome = AssignmentRequestRepo::accept(
        &pool,
        &requests.iter().find(|r| r.agent_id == agents[0].id).unwrap().clone(),
        &agents[0],
        None,
    )
    .await
    .expect("accept should not be a database error");
    assert_matches!(outcome, AcceptOutcome::LostRace);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn manual_assign_fails_when_not_open(pool: PgPool) {
    let (ticket, agents, _) = setup_broadcast(&pool, 1, 5).await;

    let assigned = TicketRepo::assign_manual(&pool, ticket.id, agents[0].user_id)
        .await
        .expect("manual assign should succeed");
    assert!(assigned.is_some());

    // Second manual assign: the ticket is no longer Open.
    let again = TicketRepo::assign_manual(&pool, ticket.id, agents[0].user_id)
        .await
        .expect("call should not be a database error");
    assert!(again.is_none());
}
