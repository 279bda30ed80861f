//! Actor identity extractor for Axum handlers.
//!
//! Authentication and session management are out of scope for this
//! service: it trusts the `x-user-id` header placed by the fronting
//! gateway and resolves it to an active user row. Handlers take
//! [`Actor`] as an extractor parameter and use its role for permission
//! checks.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use helpdesk_core::error::CoreError;
use helpdesk_core::roles::{ROLE_ADMIN, ROLE_AGENT};
use helpdesk_core::types::DbId;
use helpdesk_db::repositories::UserRepo;

use crate::error::AppError;
use crate::state::AppState;

/// The acting user, resolved from the `x-user-id` request header.
#[derive(Debug, Clone)]
pub struct Actor {
    /// The user's internal database id.
    pub user_id: DbId,
    /// The user's role name (`"admin"`, `"agent"`, `"client"`).
    pub role: String,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn is_agent(&self) -> bool {
        self.role == ROLE_AGENT
    }

    /// Agents and admins see internal comments; clients do not.
    pub fn is_staff(&self) -> bool {
        self.is_admin() || self.is_agent()
    }

    /// Fail with `Forbidden` unless the actor is an admin.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Core(CoreError::Forbidden(
                "Administrator role required".into(),
            )))
        }
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id: DbId = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing or malformed x-user-id header".into(),
                ))
            })?;

        let user = UserRepo::find_active_with_role(&state.pool, user_id)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Unknown or inactive user".into()))
            })?;

        Ok(Actor {
            user_id: user.id,
            role: user.role,
        })
    }
}
