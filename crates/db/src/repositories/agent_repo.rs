//! Repository for the `agents` and `agent_categories` tables.

use helpdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::agent::{Agent, CreateAgent, EligibleAgent};

/// Column list for `agents` queries.
const COLUMNS: &str = "id, user_id, department, skill_tags, max_tickets, created_at";

/// Provides CRUD and eligibility lookups for agents.
pub struct AgentRepo;

impl AgentRepo {
    /// Create an agent profile for a user.
    pub async fn create(pool: &PgPool, input: &CreateAgent) -> Result<Agent, sqlx::Error> {
        let query = format!(
            "INSERT INTO agents (user_id, department, skill_tags, max_tickets) \
             VALUES ($1, $2, COALESCE($3, '[]'::jsonb), COALESCE($4, 5)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Agent>(&query)
            .bind(input.user_id)
            .bind(&input.department)
            .bind(&input.skill_tags)
            .bind(input.max_tickets)
            .fetch_one(pool)
            .await
    }

    /// Find an agent by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Agent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agents WHERE id = $1");
        sqlx::query_as::<_, Agent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the agent profile belonging to a user.
    pub async fn find_by_user_id(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Agent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM agents WHERE user_id = $1");
        sqlx::query_as::<_, Agent>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Link an agent to a category, making them eligible for its tickets.
    /// Idempotent: linking twice is a no-op.
    pub async fn link_category(
        pool: &PgPool,
        agent_id: DbId,
        category_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO agent_categories (agent_id, category_id) VALUES ($1, $2) \
             ON CONFLICT (agent_id, category_id) DO NOTHING",
        )
        .bind(agent_id)
        .bind(category_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove an agent's eligibility for a category.
    pub async fn unlink_category(
        pool: &PgPool,
        agent_id: DbId,
        category_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM agent_categories WHERE agent_id = $1 AND category_id = $2",
        )
        .bind(agent_id)
        .bind(category_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All active agents eligible for a category.
    pub async fn eligible_for_category(
        pool: &PgPool,
        category_id: DbId,
    ) -> Result<Vec<EligibleAgent>, sqlx::Error> {
        sqlx::query_as::<_, EligibleAgent>(
            "SELECT a.id AS agent_id, a.user_id \
             FROM agent_categories ac \
             JOIN agents a ON a.id = ac.agent_id \
             JOIN users u ON u.id = a.user_id \
             WHERE ac.category_id = $1 AND u.is_active = true \
             ORDER BY a.id ASC",
        )
        .bind(category_id)
        .fetch_all(pool)
        .await
    }
}
