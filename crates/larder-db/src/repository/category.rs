//! # Category Repository
//!
//! Category records. Categories live independently of products: a product
//! references category ids in its `categories` sequence, and nothing here
//! ever rewrites a product record.

use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use larder_core::types::{Category, Product};
use larder_core::validation::validate_entity_name;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
}

impl CategoryRow {
    fn into_category(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
        }
    }
}

/// Repository for category records.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    db: Database,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(db: Database) -> Self {
        CategoryRepository { db }
    }

    /// Creates a category with a fresh UUID.
    ///
    /// ## Errors
    /// [`DbError::DuplicateCategory`] on a case-insensitive name match.
    pub async fn create_category(&self, name: &str) -> DbResult<Category> {
        validate_entity_name("category", name)?;
        let name = name.trim();

        let mut txn = self.db.begin_write().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM categories WHERE LOWER(name) = LOWER(?1)")
                .bind(name)
                .fetch_optional(&mut *txn.conn())
                .await?;
        if existing.is_some() {
            return Err(DbError::DuplicateCategory {
                name: name.to_string(),
            });
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };

        sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&mut *txn.conn())
            .await?;

        txn.commit().await?;
        info!(id = %category.id, name = %category.name, "Created category");
        Ok(category)
    }

    /// Gets a category by id. Absence is `Ok(None)`.
    pub async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        let row: Option<CategoryRow> =
            sqlx::query_as("SELECT id, name FROM categories WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(CategoryRow::into_category))
    }

    /// All categories, sorted by name.
    pub async fn get_all_categories(&self) -> DbResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(CategoryRow::into_category).collect())
    }

    /// Products referencing a category.
    pub async fn get_all_products_by_category(&self, category_id: &str) -> DbResult<Vec<Product>> {
        let all = self.db.products().list_all().await?;

        Ok(all
            .into_iter()
            .filter(|p| p.categories.iter().any(|c| c == category_id))
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
