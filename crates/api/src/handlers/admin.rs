//! Admin handlers for the reference data the assignment protocol runs
//! on: users, categories, agent profiles, and eligibility links.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use helpdesk_core::error::CoreError;
use helpdesk_core::types::DbId;
use helpdesk_db::models::agent::CreateAgent;
use helpdesk_db::models::category::CreateCategory;
use helpdesk_db::models::user::CreateUser;
use helpdesk_db::repositories::{AgentRepo, CategoryRepo, UserRepo};

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/users
pub async fn create_user(
    actor: Actor,
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    if input.username.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Username must not be empty".into(),
        )));
    }
    let user = UserRepo::create(&state.pool, &input).await?;
    tracing::info!(user_id = user.id, role_id = user.role_id, "User created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: user })))
}

/// GET /api/v1/categories
pub async fn list_categories(
    _actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let categories = CategoryRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: categories }))
}

/// POST /api/v1/categories
pub async fn create_category(
    actor: Actor,
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    input.validate()?;
    let category = CategoryRepo::create(&state.pool, &input).await?;
    tracing::info!(category_id = category.id, name = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: category })))
}

/// POST /api/v1/agents
pub async fn create_agent(
    actor: Actor,
    State(state): State<AppState>,
    Json(input): Json<CreateAgent>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    if input.max_tickets.is_some_and(|m| m <= 0) {
        return Err(AppError::Core(CoreError::Validation(
            "max_tickets must be positive".into(),
        )));
    }
    let agent = AgentRepo::create(&state.pool, &input).await?;
    tracing::info!(agent_id = agent.id, user_id = agent.user_id, "Agent created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: agent })))
}

/// PUT /api/v1/agents/{id}/categories/{category_id}
///
/// Make the agent eligible for a category's tickets. Idempotent.
pub async fn link_category(
    actor: Actor,
    State(state): State<AppState>,
    Path((agent_id, category_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;

    AgentRepo::find_by_id(&state.pool, agent_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agent",
            id: agent_id,
        }))?;
    CategoryRepo::find_by_id(&state.pool, category_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Category",
            id: category_id,
        }))?;

    AgentRepo::link_category(&state.pool, agent_id, category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/agents/{id}/categories/{category_id}
pub async fn unlink_category(
    actor: Actor,
    State(state): State<AppState>,
    Path((agent_id, category_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    if !AgentRepo::unlink_category(&state.pool, agent_id, category_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Agent",
            id: agent_id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}
