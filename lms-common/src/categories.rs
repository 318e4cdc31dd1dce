//! Category repository
//!
//! `course_count` is owned by the course repository and the reconciler;
//! nothing here writes it except the initial zero.

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::counts::live_course_count;
use crate::db::rows::{category_from_row, CATEGORY_COLUMNS};
use crate::db::Category;
use crate::time::now_millis;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_category(&self, new: NewCategory) -> Result<Category> {
        let name = validate_name(&new.name)?;
        let mut tx = self.pool.begin().await?;
        ensure_name_free(&mut tx, &name, None).await?;

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, course_count, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(new.description.trim())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let category = fetch_category(&mut tx, &id).await?;
        tx.commit().await?;

        info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    pub async fn get_category(&self, id: &str) -> Result<Category> {
        let mut conn = self.pool.acquire().await?;
        fetch_category(&mut conn, id).await
    }

    /// All categories ordered by name
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM categories ORDER BY name COLLATE NOCASE, id",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(category_from_row).collect()
    }

    pub async fn update_category(&self, id: &str, update: CategoryUpdate) -> Result<Category> {
        let mut tx = self.pool.begin().await?;
        let mut category = fetch_category(&mut tx, id).await?;

        if let Some(name) = update.name {
            let name = validate_name(&name)?;
            ensure_name_free(&mut tx, &name, Some(id)).await?;
            category.name = name;
        }
        if let Some(description) = update.description {
            category.description = description.trim().to_string();
        }

        sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&category.name)
            .bind(&category.description)
            .bind(now_millis())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let category = fetch_category(&mut tx, id).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Delete a category no course references
    ///
    /// References are counted live; the stored `course_count` may have drifted.
    pub async fn delete_category(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        fetch_category(&mut tx, id).await?;

        let referencing = live_course_count(&mut tx, id).await?;
        if referencing > 0 {
            return Err(Error::Conflict(format!(
                "category {} is still referenced by {} course(s)",
                id, referencing
            )));
        }

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Deleted category {}", id);
        Ok(())
    }
}

pub(crate) async fn fetch_category(conn: &mut SqliteConnection, id: &str) -> Result<Category> {
    let row = sqlx::query(&format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("category", id))?;
    category_from_row(&row)
}

/// Whether a category row exists
pub(crate) async fn category_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("category name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

async fn ensure_name_free(
    conn: &mut SqliteConnection,
    name: &str,
    except_id: Option<&str>,
) -> Result<()> {
    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM categories WHERE name = ? COLLATE NOCASE AND id <> ?",
    )
    .bind(name)
    .bind(except_id.unwrap_or(""))
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(_) => Err(Error::Conflict(format!("category '{}' already exists", name))),
        None => Ok(()),
    }
}
