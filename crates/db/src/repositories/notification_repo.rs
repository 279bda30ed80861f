//! Repository for the `notifications` table (the per-user inbox).

use helpdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::Notification;

/// Column list for `notifications` queries.
const COLUMNS: &str = "\
    id, user_id, event_type, title, message, severity, metadata, \
    is_read, read_at, created_at";

/// Maximum page size for the inbox listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for the inbox listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides inbox persistence for the notifier.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Write one notification row.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        event_type: &str,
        title: &str,
        message: &str,
        severity: &str,
        metadata: &serde_json::Value,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications \
                 (user_id, event_type, title, message, severity, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(event_type)
            .bind(title)
            .bind(message)
            .bind(severity)
            .bind(metadata)
            .fetch_one(pool)
            .await
    }

    /// List a user's notifications, newest first. When `unread_only` is
    /// set, read rows are filtered out.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        unread_only: bool,
        limit: Option<i64>,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND (is_read = false OR NOT $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark one of the user's notifications read. Returns `false` when
    /// the row does not exist, belongs to someone else, or was already
    /// read.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND is_read = false",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
