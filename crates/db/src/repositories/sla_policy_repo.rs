//! Repository for the `sla_policies` table. One row per priority,
//! seeded by migration; read-only for the monitor, upsertable by admins.

use helpdesk_core::status::StatusId;
use sqlx::PgPool;

use crate::models::sla_policy::{SlaPolicy, UpsertSlaPolicy};

/// Column list for `sla_policies` queries.
const COLUMNS: &str =
    "id, priority_id, response_minutes, resolution_minutes, created_at, updated_at";

/// Provides lookups and admin upserts for SLA policies.
pub struct SlaPolicyRepo;

impl SlaPolicyRepo {
    /// List all policies, lowest priority first.
    pub async fn list(pool: &PgPool) -> Result<Vec<SlaPolicy>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sla_policies ORDER BY priority_id ASC");
        sqlx::query_as::<_, SlaPolicy>(&query).fetch_all(pool).await
    }

    /// The policy for one priority, if configured.
    pub async fn get_for_priority(
        pool: &PgPool,
        priority_id: StatusId,
    ) -> Result<Option<SlaPolicy>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sla_policies WHERE priority_id = $1");
        sqlx::query_as::<_, SlaPolicy>(&query)
            .bind(priority_id)
            .fetch_optional(pool)
            .await
    }

    /// Create or replace the policy for one priority.
    pub async fn upsert(
        pool: &PgPool,
        priority_id: StatusId,
        input: &UpsertSlaPolicy,
    ) -> Result<SlaPolicy, sqlx::Error> {
        let query = format!(
            "INSERT INTO sla_policies (priority_id, response_minutes, resolution_minutes) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (priority_id) DO UPDATE \
                 SET response_minutes = EXCLUDED.response_minutes, \
                     resolution_minutes = EXCLUDED.resolution_minutes, \
                     updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SlaPolicy>(&query)
            .bind(priority_id)
            .bind(input.response_minutes)
            .bind(input.resolution_minutes)
            .fetch_one(pool)
            .await
    }
}
