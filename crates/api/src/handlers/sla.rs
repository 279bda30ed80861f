//! Handlers for SLA policies and the monitor's operational controls.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use helpdesk_core::error::CoreError;
use helpdesk_core::status::{Priority, StatusId};
use helpdesk_db::models::sla_policy::UpsertSlaPolicy;
use helpdesk_db::repositories::SlaPolicyRepo;

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/sla/policies
pub async fn list_policies(
    _actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let policies = SlaPolicyRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: policies }))
}

/// PUT /api/v1/sla/policies/{priority_id}
pub async fn upsert_policy(
    actor: Actor,
    State(state): State<AppState>,
    Path(priority_id): Path<StatusId>,
    Json(input): Json<UpsertSlaPolicy>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;

    if Priority::from_id(priority_id).is_none() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Unknown priority id {priority_id}"
        ))));
    }
    if input.response_minutes <= 0 || input.resolution_minutes <= 0 {
        return Err(AppError::Core(CoreError::Validation(
            "SLA thresholds must be positive".into(),
        )));
    }

    let policy = SlaPolicyRepo::upsert(&state.pool, priority_id, &input).await?;

    tracing::info!(
        priority_id,
        response_minutes = input.response_minutes,
        resolution_minutes = input.resolution_minutes,
        "SLA policy updated"
    );

    Ok(Json(DataResponse { data: policy }))
}

/// GET /api/v1/sla/monitor
pub async fn monitor_statistics(
    actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    let stats = state.sla_monitor.statistics().await;
    Ok(Json(DataResponse { data: stats }))
}

/// POST /api/v1/sla/monitor/start
pub async fn monitor_start(
    actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    if !state.sla_monitor.start().await {
        return Err(AppError::Core(CoreError::Conflict(
            "SLA monitor is already running".into(),
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sla/monitor/stop
pub async fn monitor_stop(
    actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    if !state.sla_monitor.stop().await {
        return Err(AppError::Core(CoreError::Conflict(
            "SLA monitor is not running".into(),
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sla/monitor/check
///
/// Run one scan immediately and return its summary.
pub async fn monitor_force_check(
    actor: Actor,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    actor.require_admin()?;
    let summary = state.sla_monitor.force_check().await;
    Ok(Json(DataResponse { data: summary }))
}
