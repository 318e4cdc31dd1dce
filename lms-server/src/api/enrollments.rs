//! Enrollment endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lms_common::db::{Enrollment, EnrollmentStatus};
use lms_common::enrollments::{EnrollmentFilter, EnrollmentRepository, NewEnrollment};
use lms_common::pagination::{PageRequest, Paged, DEFAULT_PAGE_SIZE};
use serde::Deserialize;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrollmentListQuery {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub status: Option<EnrollmentStatus>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress_percent: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EnrollmentStatus,
}

/// GET /api/enrollments
pub async fn list_enrollments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EnrollmentListQuery>,
) -> ApiResult<Json<Paged<Enrollment>>> {
    let filter = EnrollmentFilter {
        user_id: query.user_id,
        course_id: query.course_id,
        status: query.status,
    };
    let page = PageRequest {
        page: query.page,
        page_size: query.page_size,
    }
    .capped(state.config.max_page_size);

    let enrollments = EnrollmentRepository::new(state.db.clone())
        .list_enrollments(&filter, page)
        .await?;
    Ok(Json(enrollments))
}

/// POST /api/enrollments
pub async fn enroll(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewEnrollment>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let enrollment = EnrollmentRepository::new(state.db.clone()).enroll(new).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// GET /api/enrollments/:id
pub async fn get_enrollment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Enrollment>> {
    let enrollment = EnrollmentRepository::new(state.db.clone())
        .get_enrollment(&id)
        .await?;
    Ok(Json(enrollment))
}

/// PUT /api/enrollments/:id/progress
pub async fn update_progress(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<ProgressRequest>,
) -> ApiResult<Json<Enrollment>> {
    let enrollment = EnrollmentRepository::new(state.db.clone())
        .update_progress(&id, request.progress_percent)
        .await?;
    Ok(Json(enrollment))
}

/// PUT /api/enrollments/:id/status
pub async fn set_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<Json<Enrollment>> {
    let enrollment = EnrollmentRepository::new(state.db.clone())
        .set_status(&id, request.status)
        .await?;
    Ok(Json(enrollment))
}
