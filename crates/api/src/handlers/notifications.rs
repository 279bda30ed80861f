//! Handlers for the per-user notification inbox.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use helpdesk_core::error::CoreError;
use helpdesk_core::types::DbId;
use helpdesk_db::repositories::NotificationRepo;

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /api/v1/notifications`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

/// GET /api/v1/notifications
pub async fn list(
    actor: Actor,
    State(state): State<AppState>,
    Query(params): Query<InboxQuery>,
) -> AppResult<impl IntoResponse> {
    let notifications = NotificationRepo::list_for_user(
        &state.pool,
        actor.user_id,
        params.unread_only,
        params.limit,
    )
    .await?;
    Ok(Json(DataResponse { data: notifications }))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_read(
    actor: Actor,
    State(state): State<AppState>,
    Path(notification_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if !NotificationRepo::mark_read(&state.pool, notification_id, actor.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Notification",
            id: notification_id,
        }));
    }
    Ok(Json(DataResponse { data: serde_json::json!({ "read": true }) }))
}
