//! Handlers for the assignment protocol: broadcast, accept/reject, and
//! the admin manual-assignment override.
//!
//! The accept path delegates its atomicity to
//! `AssignmentRequestRepo::accept`; this layer does the ownership and
//! precondition checks, maps the transaction outcome onto the typed
//! error kinds, and sends notifications only after the commit.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use helpdesk_core::error::CoreError;
use helpdesk_core::status::{RequestStatus, TicketStatus};
use helpdesk_core::ticket::MAX_RESPONSE_NOTE_LENGTH;
use helpdesk_core::types::DbId;
use helpdesk_db::models::agent::Agent;
use helpdesk_db::models::assignment_request::{
    AcceptOutcome, AssignmentRequest, RespondRequest,
};
use helpdesk_db::repositories::{AgentRepo, AssignmentRequestRepo, TicketRepo};
use helpdesk_events::{event_types, Severity, TicketEvent};

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::handlers::tickets::{broadcast_ticket, fetch_ticket};
use crate::response::DataResponse;
use crate::state::AppState;

/// Validate an optional response note.
fn validate_note(note: Option<&str>) -> AppResult<()> {
    if note.is_some_and(|n| n.len() > MAX_RESPONSE_NOTE_LENGTH) {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Response note exceeds maximum length of {MAX_RESPONSE_NOTE_LENGTH} characters"
        ))));
    }
    Ok(())
}

/// Fetch a request or fail with `NotFound`.
async fn fetch_request(state: &AppState, request_id: DbId) -> AppResult<AssignmentRequest> {
    AssignmentRequestRepo::find_by_id(&state.pool, request_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "AssignmentRequest",
                id: request_id,
            })
        })
}

/// Resolve the calling agent's profile and check the request is theirs
/// and still pending.
async fn check_ownership(
    state: &AppState,
    actor: &Actor,
    request: &AssignmentRequest,
) -> AppResult<Agent> {
    let agent = AgentRepo::find_by_user_id(&state.pool, actor.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Forbidden(
                "Caller has no agent profile".into(),
            ))
        })?;

    if request.agent_id != agent.id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Assignment request belongs to another agent".into(),
        )));
    }

    if request.status_id != RequestStatus::Pending.id() {
        return Err(AppError::Core(CoreError::AlreadyResolved {
            request_id: request.id,
        }));
    }

    Ok(agent)
}

/// POST /api/v1/tickets/{id}/assignment-requests
///
/// Re-broadcast an `Open` ticket to its category's agents. Idempotent:
/// agents already holding a request are skipped.
pub async fn broadcast(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;

    let ticket = fetch_ticket(&state, ticket_id).await?;
    if ticket.status_id != TicketStatus::Open.id() {
        return Err(AppError::Core(CoreError::Conflict(
            "Only open tickets can be broadcast".into(),
        )));
    }

    let created = broadcast_ticket(&state, &ticket).await?;
    let requests = AssignmentRequestRepo::list_for_ticket(&state.pool, ticket_id).await?;

    tracing::info!(ticket_id, created, "Ticket broadcast");

    Ok((StatusCode::CREATED, Json(DataResponse { data: requests })))
}

/// GET /api/v1/tickets/{id}/assignment-requests
pub async fn list_for_ticket(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    fetch_ticket(&state, ticket_id).await?;
    let requests = AssignmentRequestRepo::list_for_ticket(&state.pool, ticket_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/assignment-requests/mine
///
/// The calling agent's pending requests, oldest first.
pub async fn list_mine(
    actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let agent = AgentRepo::find_by_user_id(&state.pool, actor.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Forbidden(
                "Caller has no agent profile".into(),
            ))
        })?;
    let requests = AssignmentRequestRepo::list_pending_for_agent(&state.pool, agent.id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// POST /api/v1/assignment-requests/{id}/accept
///
/// First accept wins. The losing caller gets `TICKET_ALREADY_ASSIGNED`
/// and should refresh instead of retrying; the winner gets the updated
/// request and ticket from the committed transaction.
pub async fn accept(
    actor: Actor,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(input): Json<RespondRequest>,
) -> AppResult<impl IntoResponse> {
    validate_note(input.note.as_deref())?;
    let request = fetch_request(&state, request_id).await?;
    let agent = check_ownership(&state, &actor, &request).await?;

    let outcome =
        AssignmentRequestRepo::accept(&state.pool, &request, &agent, input.note.as_deref())
            .await?;

    let accepted = match outcome {
        AcceptOutcome::Accepted(accepted) => accepted,
        AcceptOutcome::LostRace => {
            return Err(AppError::Core(CoreError::TicketAlreadyAssigned {
                ticket_id: request.ticket_id,
            }));
        }
        AcceptOutcome::AtCapacity { max_tickets } => {
            return Err(AppError::Core(CoreError::AgentAtCapacity {
                agent_id: agent.id,
                max_tickets,
            }));
        }
    };

    tracing::info!(
        request_id,
        ticket_id = accepted.ticket.id,
        agent_id = agent.id,
        "Assignment accepted"
    );

    // State is committed; everything below is best-effort.
    state.event_bus.publish(
        TicketEvent::new(event_types::ASSIGNMENT_ACCEPTED)
            .with_ticket(accepted.ticket.id)
            .with_actor(actor.user_id)
            .with_payload(serde_json::json!({ "request_id": request_id })),
    );

    state
        .notifier
        .notify(
            actor.user_id,
            event_types::ASSIGNMENT_ACCEPTED,
            "Assignment confirmed",
            &format!("You are now assigned to ticket {}", accepted.ticket.ticket_number),
            Severity::Info,
            serde_json::json!({ "ticket_id": accepted.ticket.id }),
        )
        .await;
    state
        .notifier
        .notify(
            accepted.ticket.client_id,
            event_types::TICKET_ASSIGNED,
            "Ticket assigned",
            &format!("An agent has accepted your ticket {}", accepted.ticket.ticket_number),
            Severity::Info,
            serde_json::json!({ "ticket_id": accepted.ticket.id }),
        )
        .await;

    Ok(Json(DataResponse { data: *accepted }))
}

/// POST /api/v1/assignment-requests/{id}/reject
pub async fn reject(
    actor: Actor,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(input): Json<RespondRequest>,
) -> AppResult<impl IntoResponse> {
    validate_note(input.note.as_deref())?;
    let request = fetch_request(&state, request_id).await?;
    check_ownership(&state, &actor, &request).await?;

    let updated = AssignmentRequestRepo::reject(&state.pool, request_id, input.note.as_deref())
        .await?
        .ok_or(AppError::Core(CoreError::AlreadyResolved { request_id }))?;

    tracing::info!(request_id, agent_user_id = actor.user_id, "Assignment rejected");

    state.event_bus.publish(
        TicketEvent::new(event_types::ASSIGNMENT_REJECTED)
            .with_ticket(request.ticket_id)
            .with_actor(actor.user_id)
            .with_payload(serde_json::json!({ "request_id": request_id })),
    );

    Ok(Json(DataResponse { data: updated }))
}

/// Body for `POST /api/v1/tickets/{id}/assign`.
#[derive(Debug, serde::Deserialize)]
pub struct AssignRequest {
    pub agent_id: DbId,
}

/// POST /api/v1/tickets/{id}/assign
///
/// Admin manual assignment, bypassing the broadcast. Equivalent to an
/// accept for invariant purposes: an `Open` ticket moves to
/// `InProgress` and every outstanding pending request is
/// cascade-rejected in the same transaction. An already-assigned,
/// non-terminal ticket is reassigned instead.
pub async fn assign_manual(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
    Json(input): Json<AssignRequest>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;

    let ticket = fetch_ticket(&state, ticket_id).await?;
    let agent = AgentRepo::find_by_id(&state.pool, input.agent_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Agent",
                id: input.agent_id,
            })
        })?;

    let active = TicketRepo::count_active_for_assignee(&state.pool, agent.user_id).await?;
    if active >= i64::from(agent.max_tickets) {
        return Err(AppError::Core(CoreError::AgentAtCapacity {
            agent_id: agent.id,
            max_tickets: agent.max_tickets,
        }));
    }

    let updated = if ticket.status_id == TicketStatus::Open.id() {
        TicketRepo::assign_manual(&state.pool, ticket_id, agent.user_id)
            .await?
            .ok_or(AppError::Core(CoreError::TicketAlreadyAssigned { ticket_id }))?
    } else {
        if !TicketRepo::reassign(&state.pool, ticket_id, agent.user_id).await? {
            let current = fetch_ticket(&state, ticket_id).await?;
            let from = TicketStatus::from_id(current.status_id)
                .unwrap_or(TicketStatus::Open);
            return Err(AppError::Core(CoreError::InvalidStateTransition {
                from,
                to: TicketStatus::InProgress,
            }));
        }
        fetch_ticket(&state, ticket_id).await?
    };

    tracing::info!(
        ticket_id,
        agent_id = agent.id,
        admin_user_id = actor.user_id,
        "Ticket manually assigned"
    );

    state.event_bus.publish(
        TicketEvent::new(event_types::TICKET_ASSIGNED)
            .with_ticket(ticket_id)
            .with_actor(actor.user_id)
            .with_payload(serde_json::json!({ "agent_id": agent.id, "manual": true })),
    );

    state
        .notifier
        .notify(
            agent.user_id,
            event_types::TICKET_ASSIGNED,
            "Ticket assigned to you",
            &format!("An administrator assigned ticket {} to you", updated.ticket_number),
            Severity::Info,
            serde_json::json!({ "ticket_id": ticket_id }),
        )
        .await;
    state
        .notifier
        .notify(
            updated.client_id,
            event_types::TICKET_ASSIGNED,
            "Ticket assigned",
            &format!("An agent has been assigned to your ticket {}", updated.ticket_number),
            Severity::Info,
            serde_json::json!({ "ticket_id": ticket_id }),
        )
        .await;

    Ok(Json(DataResponse { data: updated }))
}
