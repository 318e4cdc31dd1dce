//! Denormalized counter maintenance
//!
//! Each `sync_*` function recomputes one stored aggregate from its source
//! rows, writes it back if it drifted, and reports the correction. They take a
//! plain connection so callers run them inside their own transaction: the
//! repositories call them after every write, the reconciler calls them over
//! whole tables.

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{Row, SqliteConnection};

use crate::time::now_millis;
use crate::Result;

/// One corrected denormalized value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairChange {
    pub entity: &'static str,
    pub entity_id: String,
    pub field: &'static str,
    pub stored: Value,
    pub actual: Value,
}

/// SQL predicate matching courses whose `category_ids` array holds `?`
pub(crate) const COURSE_IN_CATEGORY: &str =
    "EXISTS (SELECT 1 FROM json_each(courses.category_ids) WHERE json_each.value = ?)";

/// Live number of courses referencing a category
pub(crate) async fn live_course_count(conn: &mut SqliteConnection, category_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM courses WHERE {}",
        COURSE_IN_CATEGORY
    ))
    .bind(category_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Bring `categories.course_count` in line with the courses referencing it
///
/// Returns `None` when the category does not exist or was already correct.
pub(crate) async fn sync_category_count(
    conn: &mut SqliteConnection,
    category_id: &str,
) -> Result<Option<RepairChange>> {
    let stored: Option<i64> =
        sqlx::query_scalar("SELECT course_count FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(stored) = stored else {
        return Ok(None);
    };

    let actual = live_course_count(conn, category_id).await?;
    if stored == actual {
        return Ok(None);
    }

    sqlx::query("UPDATE categories SET course_count = ?, updated_at = ? WHERE id = ?")
        .bind(actual)
        .bind(now_millis())
        .bind(category_id)
        .execute(&mut *conn)
        .await?;

    Ok(Some(RepairChange {
        entity: "category",
        entity_id: category_id.to_string(),
        field: "course_count",
        stored: json!(stored),
        actual: json!(actual),
    }))
}

/// Renumber module positions densely and rebuild `courses.modules_list`
///
/// Module order is position, ties broken by id. Returns the corrections made.
pub(crate) async fn sync_modules_list(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<Vec<RepairChange>> {
    let mut changes = Vec::new();

    let stored_raw: Option<String> =
        sqlx::query_scalar("SELECT modules_list FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(stored_raw) = stored_raw else {
        return Ok(changes);
    };
    // A corrupt array is drift like any other: rebuild it
    let stored: Value = serde_json::from_str(&stored_raw).unwrap_or(Value::Null);

    let rows = sqlx::query("SELECT id, position FROM modules WHERE course_id = ? ORDER BY position, id")
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;

    let now = now_millis();
    let mut actual_ids = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let id: String = row.try_get("id")?;
        let position: i64 = row.try_get("position")?;
        let index = index as i64;
        if position != index {
            sqlx::query("UPDATE modules SET position = ?, updated_at = ? WHERE id = ?")
                .bind(index)
                .bind(now)
                .bind(&id)
                .execute(&mut *conn)
                .await?;
            changes.push(RepairChange {
                entity: "module",
                entity_id: id.clone(),
                field: "position",
                stored: json!(position),
                actual: json!(index),
            });
        }
        actual_ids.push(id);
    }

    let actual = json!(actual_ids);
    if stored != actual {
        sqlx::query("UPDATE courses SET modules_list = ?, updated_at = ? WHERE id = ?")
            .bind(actual.to_string())
            .bind(now)
            .bind(course_id)
            .execute(&mut *conn)
            .await?;
        changes.push(RepairChange {
            entity: "course",
            entity_id: course_id.to_string(),
            field: "modules_list",
            stored,
            actual,
        });
    }

    Ok(changes)
}

/// Renumber lesson positions densely and bring `modules.lesson_count` in line
pub(crate) async fn sync_lesson_count(
    conn: &mut SqliteConnection,
    module_id: &str,
) -> Result<Vec<RepairChange>> {
    let mut changes = Vec::new();

    let stored: Option<i64> = sqlx::query_scalar("SELECT lesson_count FROM modules WHERE id = ?")
        .bind(module_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(stored) = stored else {
        return Ok(changes);
    };

    let rows = sqlx::query("SELECT id, position FROM lessons WHERE module_id = ? ORDER BY position, id")
        .bind(module_id)
        .fetch_all(&mut *conn)
        .await?;

    let now = now_millis();
    for (index, row) in rows.iter().enumerate() {
        let id: String = row.try_get("id")?;
        let position: i64 = row.try_get("position")?;
        let index = index as i64;
        if position != index {
            sqlx::query("UPDATE lessons SET position = ?, updated_at = ? WHERE id = ?")
                .bind(index)
                .bind(now)
                .bind(&id)
                .execute(&mut *conn)
                .await?;
            changes.push(RepairChange {
                entity: "lesson",
                entity_id: id,
                field: "position",
                stored: json!(position),
                actual: json!(index),
            });
        }
    }

    let actual = rows.len() as i64;
    if stored != actual {
        sqlx::query("UPDATE modules SET lesson_count = ?, updated_at = ? WHERE id = ?")
            .bind(actual)
            .bind(now)
            .bind(module_id)
            .execute(&mut *conn)
            .await?;
        changes.push(RepairChange {
            entity: "module",
            entity_id: module_id.to_string(),
            field: "lesson_count",
            stored: json!(stored),
            actual: json!(actual),
        });
    }

    Ok(changes)
}

/// Rewrite the duplicated course title on records that reference the course
///
/// Returns the number of rows rewritten per table.
pub(crate) async fn sync_course_title(
    conn: &mut SqliteConnection,
    course_id: &str,
    title: &str,
) -> Result<Vec<(&'static str, u64)>> {
    let mut rewritten = Vec::new();
    for table in ["enrollments", "certificates", "quiz_results"] {
        let result = sqlx::query(&format!(
            "UPDATE {} SET course_title = ? WHERE course_id = ? AND course_title <> ?",
            table
        ))
        .bind(title)
        .bind(course_id)
        .bind(title)
        .execute(&mut *conn)
        .await?;
        rewritten.push((table, result.rows_affected()));
    }
    Ok(rewritten)
}
