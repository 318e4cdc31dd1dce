//! Read-only catalog of published courses
//!
//! Lists page with a keyset cursor ("load more"): the cursor names the last
//! course returned as `<created_at millis>:<id>`, and the next page starts
//! strictly after it in (created_at DESC, id DESC) order.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::courses::{push_course_filter, CourseFilter, CourseOutline, CourseRepository};
use crate::db::rows::{course_from_row, COURSE_COLUMNS};
use crate::db::{Course, CourseLevel, CourseStatus};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct CatalogQuery {
    pub category_id: Option<String>,
    pub level: Option<CourseLevel>,
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// A published course with figures over its published modules
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub course: Course,
    pub module_count: i64,
    pub lesson_count: i64,
    pub total_duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
    /// Present iff more courses follow
    pub next_cursor: Option<String>,
}

/// Position after which a catalog page starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCursor {
    pub created_at: i64,
    pub id: String,
}

impl CatalogCursor {
    pub fn encode(&self) -> String {
        format!("{}:{}", self.created_at, self.id)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("invalid catalog cursor '{}'", raw));
        let (created_at, id) = raw.split_once(':').ok_or_else(invalid)?;
        let created_at = created_at.parse::<i64>().map_err(|_| invalid())?;
        if id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            created_at,
            id: id.to_string(),
        })
    }
}

pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One page of published courses, newest first
    ///
    /// `limit` defaults to `max_page_size` and is clamped to 1..=max_page_size.
    pub async fn list_catalog(&self, query: &CatalogQuery, max_page_size: i64) -> Result<CatalogPage> {
        let max_page_size = max_page_size.max(1);
        let limit = query.limit.unwrap_or(max_page_size).clamp(1, max_page_size);
        let cursor = query.cursor.as_deref().map(CatalogCursor::decode).transpose()?;

        let filter = CourseFilter {
            status: Some(CourseStatus::Published),
            level: query.level,
            category_id: query.category_id.clone(),
            search: query.search.clone(),
        };

        let mut sql = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM courses WHERE 1 = 1",
            COURSE_COLUMNS
        ));
        push_course_filter(&mut sql, &filter);
        if let Some(cursor) = &cursor {
            sql.push(" AND (created_at < ")
                .push_bind(cursor.created_at)
                .push(" OR (created_at = ")
                .push_bind(cursor.created_at)
                .push(" AND id < ")
                .push_bind(cursor.id.clone())
                .push("))");
        }
        // One extra row tells whether another page exists
        sql.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit + 1);

        let rows = sql.build().fetch_all(&self.pool).await?;
        let mut courses = rows.iter().map(course_from_row).collect::<Result<Vec<_>>>()?;

        let has_more = courses.len() as i64 > limit;
        courses.truncate(limit as usize);
        let next_cursor = if has_more {
            courses.last().map(|course| {
                CatalogCursor {
                    created_at: course.created_at.timestamp_millis(),
                    id: course.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        let mut entries = Vec::with_capacity(courses.len());
        for course in courses {
            entries.push(self.entry_for(course).await?);
        }

        Ok(CatalogPage { entries, next_cursor })
    }

    /// Published outline of one course; drafts are not found
    pub async fn catalog_detail(&self, course_id: &str) -> Result<CourseOutline> {
        CourseRepository::new(self.pool.clone())
            .get_outline(course_id, true)
            .await
    }

    async fn entry_for(&self, course: Course) -> Result<CatalogEntry> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT m.id) AS module_count,
                COUNT(l.id) AS lesson_count,
                COALESCE(SUM(l.duration_minutes), 0) AS total_duration
            FROM modules m
            LEFT JOIN lessons l ON l.module_id = m.id
            WHERE m.course_id = ? AND m.status = 'published'
            "#,
        )
        .bind(&course.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogEntry {
            module_count: row.try_get("module_count")?,
            lesson_count: row.try_get("lesson_count")?,
            total_duration_minutes: row.try_get("total_duration")?,
            course,
        })
    }
}
