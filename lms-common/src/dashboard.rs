//! Admin dashboard figures

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::reconcile::Reconciler;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub courses_total: i64,
    pub courses_published: i64,
    pub courses_draft: i64,
    pub categories: i64,
    pub enrollments_active: i64,
    pub enrollments_completed: i64,
    pub enrollments_cancelled: i64,
    pub certificates_issued: i64,
    pub certificates_revoked: i64,
    pub quiz_submissions: i64,
    /// Share of passed submissions, 0.0 when there are none
    pub quiz_pass_rate: f64,
    /// A dry-run repair found at least one drifted denormalized value
    pub drift_detected: bool,
}

pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats> {
    let courses = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(status = 'published'), 0) AS published,
            COALESCE(SUM(status = 'draft'), 0) AS draft
        FROM courses
        "#,
    )
    .fetch_one(pool)
    .await?;

    let categories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;

    let enrollments = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(status = 'active'), 0) AS active,
            COALESCE(SUM(status = 'completed'), 0) AS completed,
            COALESCE(SUM(status = 'cancelled'), 0) AS cancelled
        FROM enrollments
        "#,
    )
    .fetch_one(pool)
    .await?;

    let certificates = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(status = 'issued'), 0) AS issued,
            COALESCE(SUM(status = 'revoked'), 0) AS revoked
        FROM certificates
        "#,
    )
    .fetch_one(pool)
    .await?;

    let quizzes = sqlx::query(
        r#"
        SELECT COUNT(*) AS submissions, COALESCE(SUM(status = 'passed'), 0) AS passed
        FROM quiz_results
        "#,
    )
    .fetch_one(pool)
    .await?;
    let quiz_submissions: i64 = quizzes.try_get("submissions")?;
    let quiz_passed: i64 = quizzes.try_get("passed")?;
    let quiz_pass_rate = if quiz_submissions > 0 {
        quiz_passed as f64 / quiz_submissions as f64
    } else {
        0.0
    };

    let drift_detected = Reconciler::new(pool.clone())
        .repair_all(true)
        .await?
        .iter()
        .any(|report| !report.is_clean());

    Ok(DashboardStats {
        courses_total: courses.try_get("total")?,
        courses_published: courses.try_get("published")?,
        courses_draft: courses.try_get("draft")?,
        categories,
        enrollments_active: enrollments.try_get("active")?,
        enrollments_completed: enrollments.try_get("completed")?,
        enrollments_cancelled: enrollments.try_get("cancelled")?,
        certificates_issued: certificates.try_get("issued")?,
        certificates_revoked: certificates.try_get("revoked")?,
        quiz_submissions,
        quiz_pass_rate,
        drift_detected,
    })
}
