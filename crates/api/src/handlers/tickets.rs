//! Handlers for ticket lifecycle operations.
//!
//! Lifecycle moves are enforced twice: a pure pre-check against the
//! transition table in `helpdesk_core` for a precise error, and the
//! status-guarded update in the repository as the authoritative word
//! under concurrency. Notifications and events go out strictly after
//! the state change is committed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use helpdesk_core::chat_access::{self, TicketChatView};
use helpdesk_core::error::CoreError;
use helpdesk_core::status::TicketStatus;
use helpdesk_core::ticket::{validate_rating, validate_title};
use helpdesk_core::types::DbId;
use helpdesk_db::models::comment::CreateComment;
use helpdesk_db::models::ticket::{CreateTicket, Ticket, TicketListQuery};
use helpdesk_db::repositories::{
    AgentRepo, AssignmentRequestRepo, CategoryRepo, CommentRepo, TicketRepo,
};
use helpdesk_events::{event_types, Severity, TicketEvent};

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Fetch a ticket or fail with `NotFound`.
pub(crate) async fn fetch_ticket(state: &AppState, ticket_id: DbId) -> AppResult<Ticket> {
    TicketRepo::find_by_id(&state.pool, ticket_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Ticket",
                id: ticket_id,
            })
        })
}

/// Resolve the ticket's current status enum.
fn status_of(ticket: &Ticket) -> AppResult<TicketStatus> {
    TicketStatus::from_id(ticket.status_id).ok_or_else(|| {
        AppError::InternalError(format!(
            "ticket {} has unknown status id {}",
            ticket.id, ticket.status_id
        ))
    })
}

/// Broadcast a ticket to all eligible agents and notify each of them.
///
/// Shared by ticket creation and the explicit re-broadcast endpoint.
/// Returns the number of requests created; an empty eligible-agent set
/// leaves the ticket `Open` for manual assignment, which is a normal,
/// observable state rather than an error.
pub(crate) async fn broadcast_ticket(state: &AppState, ticket: &Ticket) -> AppResult<usize> {
    let eligible = AgentRepo::eligible_for_category(&state.pool, ticket.category_id).await?;
    if eligible.is_empty() {
        tracing::warn!(
            ticket_id = ticket.id,
            category_id = ticket.category_id,
            "No eligible agents for category; ticket is unassignable"
        );
        return Ok(0);
    }

    let category_name = CategoryRepo::find_by_id(&state.pool, ticket.category_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_default();

    let created =
        AssignmentRequestRepo::broadcast(&state.pool, ticket.id, ticket.category_id).await?;

    for request in &created {
        state
            .notifier
            .notify(
                request.agent_user_id,
                event_types::ASSIGNMENT_REQUESTED,
                "New ticket available",
                &format!(
                    "Ticket {} ({category_name}) is waiting for an agent",
                    ticket.ticket_number
                ),
                Severity::Info,
                serde_json::json!({
                    "ticket_id": ticket.id,
                    "request_id": request.id,
                    "category": category_name,
                }),
            )
            .await;
    }

    Ok(created.len())
}

/// POST /api/v1/tickets
///
/// Create an `Open` ticket and broadcast it to all agents linked to its
/// category.
pub async fn create_ticket(
    actor: Actor,
    State(state): State<AppState>,
    Json(input): Json<CreateTicket>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_title(&input.title).map_err(AppError::Core)?;

    CategoryRepo::find_by_id(&state.pool, input.category_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Category",
                id: input.category_id,
            })
        })?;

    let ticket = TicketRepo::create(&state.pool, actor.user_id, &input).await?;

    tracing::info!(
        ticket_id = ticket.id,
        ticket_number = %ticket.ticket_number,
        priority_id = ticket.priority_id,
        "Ticket created"
    );

    state.event_bus.publish(
        TicketEvent::new(event_types::TICKET_CREATED)
            .with_ticket(ticket.id)
            .with_actor(actor.user_id)
            .with_payload(serde_json::json!({
                "ticket_number": ticket.ticket_number,
                "priority_id": ticket.priority_id,
            })),
    );

    broadcast_ticket(&state, &ticket).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: ticket })))
}

/// GET /api/v1/tickets
pub async fn list_tickets(
    _actor: Actor,
    State(state): State<AppState>,
    Query(params): Query<TicketListQuery>,
) -> AppResult<impl IntoResponse> {
    let tickets = TicketRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: tickets }))
}

/// GET /api/v1/tickets/unassignable
///
/// Admin view of `Open` tickets the broadcaster found no eligible
/// agents for.
pub async fn list_unassignable(
    actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    let tickets = TicketRepo::list_unassignable(&state.pool).await?;
    Ok(Json(DataResponse { data: tickets }))
}

/// GET /api/v1/tickets/{id}
pub async fn get_ticket(
    _actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let ticket = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// GET /api/v1/tickets/{id}/chat-access
///
/// Evaluate the chat access gate for the calling user. Read-only: the
/// gate itself never mutates ticket state.
pub async fn get_chat_access(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let ticket = fetch_ticket(&state, ticket_id).await?;
    let status = status_of(&ticket)?;

    let access = chat_access::evaluate(
        actor.user_id,
        &actor.role,
        &TicketChatView {
            status,
            assignee_id: ticket.assignee_id,
            client_id: ticket.client_id,
            created_by: ticket.created_by,
        },
    );

    Ok(Json(DataResponse { data: access }))
}

/// GET /api/v1/tickets/{id}/comments
pub async fn list_comments(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    fetch_ticket(&state, ticket_id).await?;
    let comments =
        CommentRepo::list_for_ticket(&state.pool, ticket_id, actor.is_staff()).await?;
    Ok(Json(DataResponse { data: comments }))
}

/// POST /api/v1/tickets/{id}/comments
///
/// Add a comment. An internal (staff-only) comment on an `InProgress`
/// ticket parks it on the client; a client comment on a
/// `WaitingForClient` ticket hands it back to the agent. Any other
/// combination leaves the status untouched.
pub async fn add_comment(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
    Json(input): Json<CreateComment>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let ticket = fetch_ticket(&state, ticket_id).await?;
    let status = status_of(&ticket)?;

    if status.is_terminal() {
        return Err(AppError::Core(CoreError::Conflict(
            "Cannot comment on a closed or cancelled ticket".into(),
        )));
    }

    if input.is_internal && !actor.is_staff() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only agents may add internal comments".into(),
        )));
    }

    let is_client_author = actor.user_id == ticket.client_id;
    if !is_client_author && !actor.is_staff() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Not a participant of this ticket".into(),
        )));
    }

    let comment = CommentRepo::create(&state.pool, ticket_id, actor.user_id, &input).await?;

    // Status toggle driven by who commented. Guarded updates: if the
    // status changed concurrently, the toggle is simply skipped.
    if input.is_internal && status == TicketStatus::InProgress {
        TicketRepo::set_status_if(
            &state.pool,
            ticket_id,
            TicketStatus::InProgress,
            TicketStatus::WaitingForClient,
        )
        .await?;
    } else if is_client_author && status == TicketStatus::WaitingForClient {
        TicketRepo::set_status_if(
            &state.pool,
            ticket_id,
            TicketStatus::WaitingForClient,
            TicketStatus::InProgress,
        )
        .await?;
    }

    // Tell the other side of the conversation, except for internal notes.
    if !input.is_internal {
        let target = if is_client_author {
            ticket.assignee_id
        } else {
            Some(ticket.client_id)
        };
        if let Some(user_id) = target.filter(|id| *id != actor.user_id) {
            state
                .notifier
                .notify(
                    user_id,
                    event_types::TICKET_COMMENTED,
                    "New comment",
                    &format!("New comment on ticket {}", ticket.ticket_number),
                    Severity::Info,
                    serde_json::json!({ "ticket_id": ticket.id, "comment_id": comment.id }),
                )
                .await;
        }
    }

    Ok((StatusCode::CREATED, Json(DataResponse { data: comment })))
}

/// POST /api/v1/tickets/{id}/resolve
///
/// Mark the ticket `Resolved`. Staff only; requires an assignee.
pub async fn resolve_ticket(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let ticket = fetch_ticket(&state, ticket_id).await?;
    let status = status_of(&ticket)?;

    if !actor.is_staff() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only agents may resolve tickets".into(),
        )));
    }

    status.ensure_transition(TicketStatus::Resolved).map_err(AppError::Core)?;
    if ticket.assignee_id.is_none() {
        return Err(AppError::Core(CoreError::Conflict(
            "Cannot resolve a ticket with no assignee".into(),
        )));
    }

    if !TicketRepo::resolve(&state.pool, ticket_id).await? {
        // Guard did not match: the status moved under us.
        let current = fetch_ticket(&state, ticket_id).await?;
        return Err(AppError::Core(CoreError::InvalidStateTransition {
            from: status_of(&current)?,
            to: TicketStatus::Resolved,
        }));
    }

    tracing::info!(ticket_id, user_id = actor.user_id, "Ticket resolved");

    state.event_bus.publish(
        TicketEvent::new(event_types::TICKET_RESOLVED)
            .with_ticket(ticket_id)
            .with_actor(actor.user_id),
    );
    state
        .notifier
        .notify(
            ticket.client_id,
            event_types::TICKET_RESOLVED,
            "Ticket resolved",
            &format!(
                "Ticket {} has been resolved; please confirm and close it",
                ticket.ticket_number
            ),
            Severity::Info,
            serde_json::json!({ "ticket_id": ticket.id }),
        )
        .await;

    let updated = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(DataResponse { data: updated }))
}

/// Body for `POST /api/v1/tickets/{id}/close`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct CloseRequest {
    pub satisfaction_rating: Option<i16>,
}

/// POST /api/v1/tickets/{id}/close
///
/// Close the ticket: client confirmation of a `Resolved` ticket, or a
/// staff force-close from `InProgress`. An optional satisfaction rating
/// may ride along (client only, single write).
pub async fn close_ticket(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
    Json(input): Json<CloseRequest>,
) -> AppResult<impl IntoResponse> {
    let ticket = fetch_ticket(&state, ticket_id).await?;
    let status = status_of(&ticket)?;

    let is_client = actor.user_id == ticket.client_id;
    if !is_client && !actor.is_staff() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Not a participant of this ticket".into(),
        )));
    }

    status.ensure_transition(TicketStatus::Closed).map_err(AppError::Core)?;

    if !TicketRepo::close(&state.pool, ticket_id).await? {
        let current = fetch_ticket(&state, ticket_id).await?;
        return Err(AppError::Core(CoreError::InvalidStateTransition {
            from: status_of(&current)?,
            to: TicketStatus::Closed,
        }));
    }

    if let Some(rating) = input.satisfaction_rating {
        apply_rating(&state, &actor, &ticket, rating).await?;
    }

    tracing::info!(ticket_id, user_id = actor.user_id, "Ticket closed");

    state.event_bus.publish(
        TicketEvent::new(event_types::TICKET_CLOSED)
            .with_ticket(ticket_id)
            .with_actor(actor.user_id),
    );
    if let Some(assignee) = ticket.assignee_id.filter(|id| *id != actor.user_id) {
        state
            .notifier
            .notify(
                assignee,
                event_types::TICKET_CLOSED,
                "Ticket closed",
                &format!("Ticket {} has been closed", ticket.ticket_number),
                Severity::Info,
                serde_json::json!({ "ticket_id": ticket.id }),
            )
            .await;
    }

    let updated = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(DataResponse { data: updated }))
}

/// Body for `POST /api/v1/tickets/{id}/rate`.
#[derive(Debug, serde::Deserialize)]
pub struct RateRequest {
    pub satisfaction_rating: i16,
}

/// POST /api/v1/tickets/{id}/rate
///
/// Record the client's satisfaction rating on a resolved/closed ticket.
/// Single write: a second attempt is rejected.
pub async fn rate_ticket(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
    Json(input): Json<RateRequest>,
) -> AppResult<impl IntoResponse> {
    let ticket = fetch_ticket(&state, ticket_id).await?;
    apply_rating(&state, &actor, &ticket, input.satisfaction_rating).await?;
    let updated = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(DataResponse { data: updated }))
}

/// Shared single-write rating logic for the close and rate endpoints.
async fn apply_rating(
    state: &AppState,
    actor: &Actor,
    ticket: &Ticket,
    rating: i16,
) -> AppResult<()> {
    if actor.user_id != ticket.client_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only the ticket's client may rate it".into(),
        )));
    }
    validate_rating(rating).map_err(AppError::Core)?;

    if !TicketRepo::rate(&state.pool, ticket.id, rating).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "Satisfaction rating has already been recorded".into(),
        )));
    }
    Ok(())
}

/// POST /api/v1/tickets/{id}/cancel
///
/// Admin only; legal from any non-terminal status.
pub async fn cancel_ticket(
    actor: Actor,
    State(state): State<AppState>,
    Path(ticket_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;

    let ticket = fetch_ticket(&state, ticket_id).await?;
    let status = status_of(&ticket)?;
    status.ensure_transition(TicketStatus::Cancelled).map_err(AppError::Core)?;

    if !TicketRepo::cancel(&state.pool, ticket_id).await? {
        let current = fetch_ticket(&state, ticket_id).await?;
        return Err(AppError::Core(CoreError::InvalidStateTransition {
            from: status_of(&current)?,
            to: TicketStatus::Cancelled,
        }));
    }

    tracing::info!(ticket_id, user_id = actor.user_id, "Ticket cancelled");

    state.event_bus.publish(
        TicketEvent::new(event_types::TICKET_CANCELLED)
            .with_ticket(ticket_id)
            .with_actor(actor.user_id),
    );
    for target in [Some(ticket.client_id), ticket.assignee_id]
        .into_iter()
        .flatten()
        .filter(|id| *id != actor.user_id)
    {
        state
            .notifier
            .notify(
                target,
                event_types::TICKET_CANCELLED,
                "Ticket cancelled",
                &format!("Ticket {} has been cancelled", ticket.ticket_number),
                Severity::Info,
                serde_json::json!({ "ticket_id": ticket.id }),
            )
            .await;
    }

    let updated = fetch_ticket(&state, ticket_id).await?;
    Ok(Json(DataResponse { data: updated }))
}
