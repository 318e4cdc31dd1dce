//! Row mapping from SQLite rows to models
//!
//! JSON array columns and text enums are decoded here so the repositories can
//! stay focused on queries.

use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::models::*;
use crate::time::from_millis;
use crate::Result;

pub(crate) const CATEGORY_COLUMNS: &str =
    "id, name, description, course_count, created_at, updated_at";

pub(crate) const COURSE_COLUMNS: &str = "id, title, description, status, level, price_cents, \
     modules_list, category_ids, legacy_category_id, created_at, updated_at";

pub(crate) const MODULE_COLUMNS: &str =
    "id, course_id, title, position, status, lesson_count, created_at, updated_at";

pub(crate) const LESSON_COLUMNS: &str = "id, module_id, course_id, title, lesson_type, \
     duration_minutes, position, video_url, content, created_at, updated_at";

pub(crate) const QUIZ_COLUMNS: &str =
    "id, course_id, lesson_id, title, passing_score, questions, created_at, updated_at";

pub(crate) const QUIZ_RESULT_COLUMNS: &str = "id, quiz_id, quiz_title, user_id, user_name, \
     course_id, course_title, score_percent, status, submitted_at";

pub(crate) const ENROLLMENT_COLUMNS: &str = "id, user_id, user_name, course_id, course_title, \
     status, progress_percent, enrolled_at, completed_at";

pub(crate) const TEMPLATE_COLUMNS: &str =
    "id, name, page_width, page_height, fields, created_at, updated_at";

pub(crate) const CERTIFICATE_COLUMNS: &str = "id, enrollment_id, user_id, user_name, course_id, \
     course_title, template_id, status, verification_code, issued_at, revoked_at";

/// Decode a JSON text column
pub(crate) fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    Ok(serde_json::from_str(&raw)?)
}

fn enum_column<T: std::str::FromStr<Err = crate::Error>>(
    row: &SqliteRow,
    column: &str,
) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse()
}

pub(crate) fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        course_count: row.try_get("course_count")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub(crate) fn course_from_row(row: &SqliteRow) -> Result<Course> {
    Ok(Course {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: enum_column(row, "status")?,
        level: enum_column(row, "level")?,
        price_cents: row.try_get("price_cents")?,
        modules_list: json_column(row, "modules_list")?,
        category_ids: json_column(row, "category_ids")?,
        legacy_category_id: row.try_get("legacy_category_id")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub(crate) fn module_from_row(row: &SqliteRow) -> Result<Module> {
    Ok(Module {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        title: row.try_get("title")?,
        position: row.try_get("position")?,
        status: enum_column(row, "status")?,
        lesson_count: row.try_get("lesson_count")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub(crate) fn lesson_from_row(row: &SqliteRow) -> Result<Lesson> {
    Ok(Lesson {
        id: row.try_get("id")?,
        module_id: row.try_get("module_id")?,
        course_id: row.try_get("course_id")?,
        title: row.try_get("title")?,
        lesson_type: enum_column(row, "lesson_type")?,
        duration_minutes: row.try_get("duration_minutes")?,
        position: row.try_get("position")?,
        video_url: row.try_get("video_url")?,
        content: row.try_get("content")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub(crate) fn quiz_from_row(row: &SqliteRow) -> Result<Quiz> {
    Ok(Quiz {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        lesson_id: row.try_get("lesson_id")?,
        title: row.try_get("title")?,
        passing_score: row.try_get("passing_score")?,
        questions: json_column(row, "questions")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub(crate) fn quiz_result_from_row(row: &SqliteRow) -> Result<QuizResult> {
    Ok(QuizResult {
        id: row.try_get("id")?,
        quiz_id: row.try_get("quiz_id")?,
        quiz_title: row.try_get("quiz_title")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        course_id: row.try_get("course_id")?,
        course_title: row.try_get("course_title")?,
        score_percent: row.try_get("score_percent")?,
        status: enum_column(row, "status")?,
        submitted_at: from_millis(row.try_get("submitted_at")?),
    })
}

pub(crate) fn enrollment_from_row(row: &SqliteRow) -> Result<Enrollment> {
    let completed_at: Option<i64> = row.try_get("completed_at")?;
    Ok(Enrollment {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        course_id: row.try_get("course_id")?,
        course_title: row.try_get("course_title")?,
        status: enum_column(row, "status")?,
        progress_percent: row.try_get("progress_percent")?,
        enrolled_at: from_millis(row.try_get("enrolled_at")?),
        completed_at: completed_at.map(from_millis),
    })
}

pub(crate) fn template_from_row(row: &SqliteRow) -> Result<CertificateTemplate> {
    Ok(CertificateTemplate {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        page_width: row.try_get("page_width")?,
        page_height: row.try_get("page_height")?,
        fields: json_column(row, "fields")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub(crate) fn certificate_from_row(row: &SqliteRow) -> Result<Certificate> {
    let revoked_at: Option<i64> = row.try_get("revoked_at")?;
    Ok(Certificate {
        id: row.try_get("id")?,
        enrollment_id: row.try_get("enrollment_id")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        course_id: row.try_get("course_id")?,
        course_title: row.try_get("course_title")?,
        template_id: row.try_get("template_id")?,
        status: enum_column(row, "status")?,
        verification_code: row.try_get("verification_code")?,
        issued_at: from_millis(row.try_get("issued_at")?),
        revoked_at: revoked_at.map(from_millis),
    })
}
