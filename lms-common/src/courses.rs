//! Course aggregate repository
//!
//! A course owns an ordered list of modules and each module owns an ordered
//! list of lessons. Every write here runs in one transaction together with the
//! updates to the denormalized values it affects:
//! - `courses.modules_list` after any module insert, delete or reorder
//! - `modules.lesson_count` after any lesson insert or delete
//! - `categories.course_count` for every category a course enters or leaves
//! - `course_title` copies when a course is renamed

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::categories::category_exists;
use crate::counts::{
    sync_category_count, sync_course_title, sync_lesson_count, sync_modules_list, RepairChange,
};
use crate::db::rows::{
    course_from_row, lesson_from_row, module_from_row, COURSE_COLUMNS, LESSON_COLUMNS,
    MODULE_COLUMNS,
};
use crate::db::{Course, CourseLevel, CourseStatus, Lesson, LessonType, Module, ModuleStatus};
use crate::pagination::{calculate_pagination, PageRequest, Paged};
use crate::time::now_millis;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_course_status")]
    pub status: CourseStatus,
    #[serde(default = "default_course_level")]
    pub level: CourseLevel,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

fn default_course_status() -> CourseStatus {
    CourseStatus::Draft
}

fn default_course_level() -> CourseLevel {
    CourseLevel::Beginner
}

/// Partial course update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<CourseStatus>,
    pub level: Option<CourseLevel>,
    pub price_cents: Option<i64>,
    pub category_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    pub status: Option<CourseStatus>,
    pub level: Option<CourseLevel>,
    pub category_id: Option<String>,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewModule {
    pub title: String,
    #[serde(default = "default_module_status")]
    pub status: ModuleStatus,
}

fn default_module_status() -> ModuleStatus {
    ModuleStatus::Draft
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub status: Option<ModuleStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLesson {
    pub title: String,
    pub lesson_type: LessonType,
    #[serde(default)]
    pub duration_minutes: i64,
    pub video_url: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub lesson_type: Option<LessonType>,
    pub duration_minutes: Option<i64>,
    pub video_url: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleOutline {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
}

/// A course with its modules and lessons in display order
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    pub course: Course,
    pub modules: Vec<ModuleOutline>,
    pub total_lessons: i64,
    pub total_duration_minutes: i64,
}

pub struct CourseRepository {
    pool: SqlitePool,
}

impl CourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Courses
    // ------------------------------------------------------------------

    pub async fn create_course(&self, new: NewCourse) -> Result<Course> {
        let title = validate_title("course", &new.title)?;
        validate_price(new.price_cents)?;
        let category_ids = dedup_ids(new.category_ids);

        let mut tx = self.pool.begin().await?;
        ensure_categories_exist(&mut tx, &category_ids).await?;

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO courses (
                id, title, description, status, level, price_cents,
                modules_list, category_ids, legacy_category_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, '[]', ?, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&title)
        .bind(new.description.trim())
        .bind(new.status.as_str())
        .bind(new.level.as_str())
        .bind(new.price_cents)
        .bind(serde_json::to_string(&category_ids)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for category_id in &category_ids {
            sync_category_count(&mut tx, category_id).await?;
        }

        let course = fetch_course(&mut tx, &id).await?;
        tx.commit().await?;

        info!(
            "Created course {} ({}) in {} categories",
            course.title,
            course.id,
            course.category_ids.len()
        );
        Ok(course)
    }

    pub async fn get_course(&self, id: &str) -> Result<Course> {
        let mut conn = self.pool.acquire().await?;
        fetch_course(&mut conn, id).await
    }

    /// Courses matching `filter`, newest first
    pub async fn list_courses(&self, filter: &CourseFilter, page: PageRequest) -> Result<Paged<Course>> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM courses WHERE 1 = 1");
        push_course_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let pagination = calculate_pagination(total, page.page, page.page_size);

        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM courses WHERE 1 = 1", COURSE_COLUMNS));
        push_course_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(pagination.page_size)
            .push(" OFFSET ")
            .push_bind(pagination.offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let courses = rows.iter().map(course_from_row).collect::<Result<Vec<_>>>()?;

        Ok(Paged::new(courses, total, pagination))
    }

    pub async fn update_course(&self, id: &str, update: CourseUpdate) -> Result<Course> {
        let mut tx = self.pool.begin().await?;
        let mut course = fetch_course(&mut tx, id).await?;
        let previous_title = course.title.clone();
        let previous_categories = course.category_ids.clone();

        if let Some(title) = update.title {
            course.title = validate_title("course", &title)?;
        }
        if let Some(description) = update.description {
            course.description = description.trim().to_string();
        }
        if let Some(status) = update.status {
            course.status = status;
        }
        if let Some(level) = update.level {
            course.level = level;
        }
        if let Some(price_cents) = update.price_cents {
            validate_price(price_cents)?;
            course.price_cents = price_cents;
        }
        if let Some(category_ids) = update.category_ids {
            let category_ids = dedup_ids(category_ids);
            ensure_categories_exist(&mut tx, &category_ids).await?;
            course.category_ids = category_ids;
        }

        sqlx::query(
            r#"
            UPDATE courses
            SET title = ?, description = ?, status = ?, level = ?, price_cents = ?,
                category_ids = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.status.as_str())
        .bind(course.level.as_str())
        .bind(course.price_cents)
        .bind(serde_json::to_string(&course.category_ids)?)
        .bind(now_millis())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        // Categories entered or left
        let before: HashSet<&String> = previous_categories.iter().collect();
        let after: HashSet<&String> = course.category_ids.iter().collect();
        for category_id in before.symmetric_difference(&after) {
            sync_category_count(&mut tx, category_id).await?;
        }

        if course.title != previous_title {
            let rewritten = sync_course_title(&mut tx, id, &course.title).await?;
            debug!("Course {} renamed, display fields rewritten: {:?}", id, rewritten);
        }

        let course = fetch_course(&mut tx, id).await?;
        tx.commit().await?;
        Ok(course)
    }

    /// Delete a course with its modules, lessons and quizzes
    ///
    /// Enrollments, certificates and quiz results are kept as history.
    pub async fn delete_course(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let course = fetch_course(&mut tx, id).await?;

        for table in ["quizzes", "lessons", "modules"] {
            sqlx::query(&format!("DELETE FROM {} WHERE course_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for category_id in &course.category_ids {
            sync_category_count(&mut tx, category_id).await?;
        }

        tx.commit().await?;
        info!("Deleted course {} ({})", course.title, id);
        Ok(())
    }

    /// Recompute `modules_list` and every module's `lesson_count` for one course
    pub async fn recount_course(&self, course_id: &str) -> Result<Vec<RepairChange>> {
        let mut tx = self.pool.begin().await?;
        fetch_course(&mut tx, course_id).await?;

        let mut changes = sync_modules_list(&mut tx, course_id).await?;
        let module_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM modules WHERE course_id = ? ORDER BY position")
                .bind(course_id)
                .fetch_all(&mut *tx)
                .await?;
        for module_id in &module_ids {
            changes.extend(sync_lesson_count(&mut tx, module_id).await?);
        }

        tx.commit().await?;
        if !changes.is_empty() {
            info!("Recount of course {} corrected {} value(s)", course_id, changes.len());
        }
        Ok(changes)
    }

    /// Course with modules and lessons in display order
    ///
    /// With `published_only`, a draft course is reported as not found and
    /// draft modules are left out.
    pub async fn get_outline(&self, course_id: &str, published_only: bool) -> Result<CourseOutline> {
        let mut conn = self.pool.acquire().await?;
        let course = fetch_course(&mut conn, course_id).await?;
        if published_only && course.status != CourseStatus::Published {
            return Err(Error::not_found("course", course_id));
        }

        let modules = fetch_modules(&mut conn, course_id).await?;
        let lesson_rows = sqlx::query(&format!(
            "SELECT {} FROM lessons WHERE course_id = ? ORDER BY position, id",
            LESSON_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut lessons_by_module: HashMap<String, Vec<Lesson>> = HashMap::new();
        for row in &lesson_rows {
            let lesson = lesson_from_row(row)?;
            lessons_by_module
                .entry(lesson.module_id.clone())
                .or_default()
                .push(lesson);
        }

        let mut total_lessons = 0;
        let mut total_duration_minutes = 0;
        let mut outline_modules = Vec::with_capacity(modules.len());
        for module in modules {
            if published_only && module.status != ModuleStatus::Published {
                continue;
            }
            let lessons = lessons_by_module.remove(&module.id).unwrap_or_default();
            total_lessons += lessons.len() as i64;
            total_duration_minutes += lessons.iter().map(|l| l.duration_minutes).sum::<i64>();
            outline_modules.push(ModuleOutline { module, lessons });
        }

        Ok(CourseOutline {
            course,
            modules: outline_modules,
            total_lessons,
            total_duration_minutes,
        })
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    /// Append a module to the end of the course
    pub async fn add_module(&self, course_id: &str, new: NewModule) -> Result<Module> {
        let title = validate_title("module", &new.title)?;

        let mut tx = self.pool.begin().await?;
        fetch_course(&mut tx, course_id).await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM modules WHERE course_id = ?",
        )
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO modules (id, course_id, title, position, status, lesson_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(course_id)
        .bind(&title)
        .bind(position)
        .bind(new.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sync_modules_list(&mut tx, course_id).await?;
        let module = fetch_module(&mut tx, &id).await?;
        tx.commit().await?;

        debug!("Added module {} to course {} at position {}", id, course_id, module.position);
        Ok(module)
    }

    pub async fn list_modules(&self, course_id: &str) -> Result<Vec<Module>> {
        let mut conn = self.pool.acquire().await?;
        fetch_course(&mut conn, course_id).await?;
        fetch_modules(&mut conn, course_id).await
    }

    pub async fn update_module(&self, module_id: &str, update: ModuleUpdate) -> Result<Module> {
        let mut tx = self.pool.begin().await?;
        let mut module = fetch_module(&mut tx, module_id).await?;

        if let Some(title) = update.title {
            module.title = validate_title("module", &title)?;
        }
        if let Some(status) = update.status {
            module.status = status;
        }

        sqlx::query("UPDATE modules SET title = ?, status = ?, updated_at = ? WHERE id = ?")
            .bind(&module.title)
            .bind(module.status.as_str())
            .bind(now_millis())
            .bind(module_id)
            .execute(&mut *tx)
            .await?;

        let module = fetch_module(&mut tx, module_id).await?;
        tx.commit().await?;
        Ok(module)
    }

    /// Delete a module and its lessons, closing the gap in module positions
    pub async fn delete_module(&self, module_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let module = fetch_module(&mut tx, module_id).await?;

        sqlx::query("DELETE FROM lessons WHERE module_id = ?")
            .bind(module_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM modules WHERE id = ?")
            .bind(module_id)
            .execute(&mut *tx)
            .await?;

        sync_modules_list(&mut tx, &module.course_id).await?;
        tx.commit().await?;

        info!("Deleted module {} from course {}", module_id, module.course_id);
        Ok(())
    }

    /// Reorder modules; `ordered_ids` must be a permutation of the current ids
    pub async fn reorder_modules(&self, course_id: &str, ordered_ids: &[String]) -> Result<Vec<Module>> {
        let mut tx = self.pool.begin().await?;
        fetch_course(&mut tx, course_id).await?;

        let current: Vec<String> =
            sqlx::query_scalar("SELECT id FROM modules WHERE course_id = ?")
                .bind(course_id)
                .fetch_all(&mut *tx)
                .await?;
        validate_permutation("module", &current, ordered_ids)?;

        let now = now_millis();
        for (position, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE modules SET position = ?, updated_at = ? WHERE id = ?")
                .bind(position as i64)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sync_modules_list(&mut tx, course_id).await?;
        let modules = fetch_modules(&mut tx, course_id).await?;
        tx.commit().await?;
        Ok(modules)
    }

    // ------------------------------------------------------------------
    // Lessons
    // ------------------------------------------------------------------

    /// Append a lesson to the end of the module
    pub async fn add_lesson(&self, module_id: &str, new: NewLesson) -> Result<Lesson> {
        let title = validate_title("lesson", &new.title)?;
        validate_duration(new.duration_minutes)?;

        let mut tx = self.pool.begin().await?;
        let module = fetch_module(&mut tx, module_id).await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM lessons WHERE module_id = ?",
        )
        .bind(module_id)
        .fetch_one(&mut *tx)
        .await?;

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO lessons (
                id, module_id, course_id, title, lesson_type, duration_minutes,
                position, video_url, content, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(module_id)
        .bind(&module.course_id)
        .bind(&title)
        .bind(new.lesson_type.as_str())
        .bind(new.duration_minutes)
        .bind(position)
        .bind(&new.video_url)
        .bind(&new.content)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sync_lesson_count(&mut tx, module_id).await?;
        let lesson = fetch_lesson(&mut tx, &id).await?;
        tx.commit().await?;
        Ok(lesson)
    }

    pub async fn list_lessons(&self, module_id: &str) -> Result<Vec<Lesson>> {
        let mut conn = self.pool.acquire().await?;
        fetch_module(&mut conn, module_id).await?;
        fetch_lessons(&mut conn, module_id).await
    }

    pub async fn update_lesson(&self, lesson_id: &str, update: LessonUpdate) -> Result<Lesson> {
        let mut tx = self.pool.begin().await?;
        let mut lesson = fetch_lesson(&mut tx, lesson_id).await?;

        if let Some(title) = update.title {
            lesson.title = validate_title("lesson", &title)?;
        }
        if let Some(lesson_type) = update.lesson_type {
            lesson.lesson_type = lesson_type;
        }
        if let Some(duration) = update.duration_minutes {
            validate_duration(duration)?;
            lesson.duration_minutes = duration;
        }
        if update.video_url.is_some() {
            lesson.video_url = update.video_url;
        }
        if update.content.is_some() {
            lesson.content = update.content;
        }

        sqlx::query(
            r#"
            UPDATE lessons
            SET title = ?, lesson_type = ?, duration_minutes = ?, video_url = ?, content = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&lesson.title)
        .bind(lesson.lesson_type.as_str())
        .bind(lesson.duration_minutes)
        .bind(&lesson.video_url)
        .bind(&lesson.content)
        .bind(now_millis())
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

        let lesson = fetch_lesson(&mut tx, lesson_id).await?;
        tx.commit().await?;
        Ok(lesson)
    }

    pub async fn delete_lesson(&self, lesson_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let lesson = fetch_lesson(&mut tx, lesson_id).await?;

        sqlx::query("DELETE FROM lessons WHERE id = ?")
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;

        sync_lesson_count(&mut tx, &lesson.module_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Reorder lessons; `ordered_ids` must be a permutation of the current ids
    pub async fn reorder_lessons(&self, module_id: &str, ordered_ids: &[String]) -> Result<Vec<Lesson>> {
        let mut tx = self.pool.begin().await?;
        fetch_module(&mut tx, module_id).await?;

        let current: Vec<String> = sqlx::query_scalar("SELECT id FROM lessons WHERE module_id = ?")
            .bind(module_id)
            .fetch_all(&mut *tx)
            .await?;
        validate_permutation("lesson", &current, ordered_ids)?;

        let now = now_millis();
        for (position, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE lessons SET position = ?, updated_at = ? WHERE id = ?")
                .bind(position as i64)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sync_lesson_count(&mut tx, module_id).await?;
        let lessons = fetch_lessons(&mut tx, module_id).await?;
        tx.commit().await?;
        Ok(lessons)
    }
}

// ----------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------

pub(crate) async fn fetch_course(conn: &mut SqliteConnection, id: &str) -> Result<Course> {
    let row = sqlx::query(&format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("course", id))?;
    course_from_row(&row)
}

pub(crate) async fn fetch_module(conn: &mut SqliteConnection, id: &str) -> Result<Module> {
    let row = sqlx::query(&format!("SELECT {} FROM modules WHERE id = ?", MODULE_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("module", id))?;
    module_from_row(&row)
}

async fn fetch_modules(conn: &mut SqliteConnection, course_id: &str) -> Result<Vec<Module>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM modules WHERE course_id = ? ORDER BY position, id",
        MODULE_COLUMNS
    ))
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(module_from_row).collect()
}

async fn fetch_lesson(conn: &mut SqliteConnection, id: &str) -> Result<Lesson> {
    let row = sqlx::query(&format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("lesson", id))?;
    lesson_from_row(&row)
}

async fn fetch_lessons(conn: &mut SqliteConnection, module_id: &str) -> Result<Vec<Lesson>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM lessons WHERE module_id = ? ORDER BY position, id",
        LESSON_COLUMNS
    ))
    .bind(module_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(lesson_from_row).collect()
}

/// Append the WHERE conditions for `filter` to a query ending in a WHERE clause
pub(crate) fn push_course_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &CourseFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(level) = filter.level {
        query.push(" AND level = ").push_bind(level.as_str());
    }
    if let Some(category_id) = &filter.category_id {
        query
            .push(" AND EXISTS (SELECT 1 FROM json_each(courses.category_ids) WHERE json_each.value = ")
            .push_bind(category_id.clone())
            .push(")");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND title LIKE ")
            .push_bind(like_pattern(search))
            .push(" ESCAPE '\\'");
    }
}

/// `%term%` with LIKE wildcards in `term` escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Drop blanks and duplicates, keeping first-seen order
pub(crate) fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

async fn ensure_categories_exist(conn: &mut SqliteConnection, ids: &[String]) -> Result<()> {
    for id in ids {
        if !category_exists(conn, id).await? {
            return Err(Error::InvalidInput(format!("unknown category {}", id)));
        }
    }
    Ok(())
}

fn validate_title(kind: &str, title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput(format!("{} title must not be empty", kind)));
    }
    Ok(title.to_string())
}

fn validate_price(price_cents: i64) -> Result<()> {
    if price_cents < 0 {
        return Err(Error::InvalidInput("price must not be negative".to_string()));
    }
    Ok(())
}

fn validate_duration(minutes: i64) -> Result<()> {
    if minutes < 0 {
        return Err(Error::InvalidInput(
            "lesson duration must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// `ordered` must hold exactly the ids of `current`, each once
fn validate_permutation(kind: &str, current: &[String], ordered: &[String]) -> Result<()> {
    let current_set: HashSet<&String> = current.iter().collect();
    let ordered_set: HashSet<&String> = ordered.iter().collect();

    if ordered_set.len() != ordered.len() {
        return Err(Error::InvalidInput(format!("duplicate {} id in new order", kind)));
    }
    if current_set != ordered_set {
        return Err(Error::InvalidInput(format!(
            "new {} order must list exactly the {} current {}s",
            kind,
            current.len(),
            kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dedup_ids_keeps_first_seen_order() {
        let result = dedup_ids(ids(&["b", "a", " b ", "", "c", "a"]));
        assert_eq!(result, ids(&["b", "a", "c"]));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn test_validate_permutation() {
        let current = ids(&["a", "b", "c"]);
        assert!(validate_permutation("module", &current, &ids(&["c", "a", "b"])).is_ok());
        assert!(validate_permutation("module", &current, &ids(&["a", "b"])).is_err());
        assert!(validate_permutation("module", &current, &ids(&["a", "b", "b"])).is_err());
        assert!(validate_permutation("module", &current, &ids(&["a", "b", "d"])).is_err());
    }

    #[test]
    fn test_validate_title_trims() {
        assert_eq!(validate_title("course", "  Rust 101 ").unwrap(), "Rust 101");
        assert!(matches!(
            validate_title("course", "   "),
            Err(Error::InvalidInput(_))
        ));
    }
}
