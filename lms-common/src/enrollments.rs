//! Enrollment records
//!
//! Enrollments carry copies of the user name and course title for list views.

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::courses::fetch_course;
use crate::db::rows::{enrollment_from_row, ENROLLMENT_COLUMNS};
use crate::db::{CourseStatus, Enrollment, EnrollmentStatus};
use crate::pagination::{calculate_pagination, PageRequest, Paged};
use crate::time::now_millis;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct NewEnrollment {
    pub user_id: String,
    pub user_name: String,
    pub course_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentFilter {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub status: Option<EnrollmentStatus>,
}

pub struct EnrollmentRepository {
    pool: SqlitePool,
}

impl EnrollmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enroll a user in a published course
    ///
    /// A user holds at most one non-cancelled enrollment per course.
    pub async fn enroll(&self, new: NewEnrollment) -> Result<Enrollment> {
        let user_id = required("user_id", &new.user_id)?;
        let user_name = required("user_name", &new.user_name)?;

        let mut tx = self.pool.begin().await?;
        let course = fetch_course(&mut tx, &new.course_id).await?;
        if course.status != CourseStatus::Published {
            return Err(Error::InvalidInput(format!(
                "course {} is not published",
                course.id
            )));
        }

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM enrollments WHERE user_id = ? AND course_id = ? AND status <> 'cancelled'",
        )
        .bind(&user_id)
        .bind(&course.id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(existing) = existing {
            return Err(Error::Conflict(format!(
                "user {} is already enrolled in course {} ({})",
                user_id, course.id, existing
            )));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, user_id, user_name, course_id, course_title, status,
                progress_percent, enrolled_at, completed_at
            )
            VALUES (?, ?, ?, ?, ?, 'active', 0, ?, NULL)
            "#,
        )
        .bind(&id)
        .bind(&user_id)
        .bind(&user_name)
        .bind(&course.id)
        .bind(&course.title)
        .bind(now_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::unique_conflict(e, || {
                format!("user {} is already enrolled in course {}", user_id, course.id)
            })
        })?;

        let enrollment = fetch_enrollment(&mut tx, &id).await?;
        tx.commit().await?;

        info!("Enrolled user {} in course {}", user_id, course.id);
        Ok(enrollment)
    }

    pub async fn get_enrollment(&self, id: &str) -> Result<Enrollment> {
        let mut conn = self.pool.acquire().await?;
        fetch_enrollment(&mut conn, id).await
    }

    /// Record progress; reaching 100 completes the enrollment
    pub async fn update_progress(&self, id: &str, percent: i64) -> Result<Enrollment> {
        if !(0..=100).contains(&percent) {
            return Err(Error::InvalidInput(format!(
                "progress must be between 0 and 100, got {}",
                percent
            )));
        }

        let mut tx = self.pool.begin().await?;
        let enrollment = fetch_enrollment(&mut tx, id).await?;
        if enrollment.status == EnrollmentStatus::Cancelled {
            return Err(Error::InvalidInput(format!("enrollment {} is cancelled", id)));
        }

        if percent == 100 {
            sqlx::query(
                r#"
                UPDATE enrollments
                SET progress_percent = 100, status = 'completed',
                    completed_at = COALESCE(completed_at, ?)
                WHERE id = ?
                "#,
            )
            .bind(now_millis())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE enrollments SET progress_percent = ? WHERE id = ?")
                .bind(percent)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let enrollment = fetch_enrollment(&mut tx, id).await?;
        tx.commit().await?;
        Ok(enrollment)
    }

    /// Set the status directly (admin override)
    pub async fn set_status(&self, id: &str, status: EnrollmentStatus) -> Result<Enrollment> {
        let mut tx = self.pool.begin().await?;
        fetch_enrollment(&mut tx, id).await?;

        match status {
            EnrollmentStatus::Completed => {
                sqlx::query(
                    r#"
                    UPDATE enrollments
                    SET status = 'completed', progress_percent = 100,
                        completed_at = COALESCE(completed_at, ?)
                    WHERE id = ?
                    "#,
                )
                .bind(now_millis())
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            EnrollmentStatus::Active | EnrollmentStatus::Cancelled => {
                sqlx::query("UPDATE enrollments SET status = ?, completed_at = NULL WHERE id = ?")
                    .bind(status.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        Error::unique_conflict(e, || {
                            format!("user already holds another enrollment in this course ({})", id)
                        })
                    })?;
            }
        }

        let enrollment = fetch_enrollment(&mut tx, id).await?;
        tx.commit().await?;
        Ok(enrollment)
    }

    /// Enrollments matching `filter`, most recent first
    pub async fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
        page: PageRequest,
    ) -> Result<Paged<Enrollment>> {
        let mut count_query =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM enrollments WHERE 1 = 1");
        push_enrollment_filter(&mut count_query, filter);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let pagination = calculate_pagination(total, page.page, page.page_size);
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM enrollments WHERE 1 = 1",
            ENROLLMENT_COLUMNS
        ));
        push_enrollment_filter(&mut query, filter);
        query
            .push(" ORDER BY enrolled_at DESC, id DESC LIMIT ")
            .push_bind(pagination.page_size)
            .push(" OFFSET ")
            .push_bind(pagination.offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(enrollment_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Paged::new(items, total, pagination))
    }
}

pub(crate) async fn fetch_enrollment(conn: &mut SqliteConnection, id: &str) -> Result<Enrollment> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM enrollments WHERE id = ?",
        ENROLLMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::not_found("enrollment", id))?;
    enrollment_from_row(&row)
}

fn push_enrollment_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &EnrollmentFilter) {
    if let Some(user_id) = &filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(course_id) = &filter.course_id {
        query.push(" AND course_id = ").push_bind(course_id.clone());
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
}

/// Trimmed non-empty value of a required text field
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}
