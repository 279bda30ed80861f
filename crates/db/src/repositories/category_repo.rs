//! Repository for the `categories` table.

use helpdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::category::{Category, CreateCategory};

/// Column list for `categories` queries.
const COLUMNS: &str = "id, name, parent_id, is_active, created_at";

/// Provides CRUD operations for ticket categories.
pub struct CategoryRepo;

impl CategoryRepo {
    /// Create a category.
    pub async fn create(pool: &PgPool, input: &CreateCategory) -> Result<Category, sqlx::Error> {
        let query = format!(
            "INSERT INTO categories (name, parent_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(&input.name)
            .bind(input.parent_id)
            .fetch_one(pool)
            .await
    }

    /// Find a category by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List active categories by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM categories WHERE is_active = true ORDER BY name ASC"
        );
        sqlx::query_as::<_, Category>(&query).fetch_all(pool).await
    }
}
