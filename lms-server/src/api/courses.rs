//! Course endpoints
//!
//! Writes here change what the public catalog shows, so each one clears the
//! catalog cache after it commits.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lms_common::counts::RepairChange;
use lms_common::courses::{CourseFilter, CourseOutline, CourseRepository, CourseUpdate, NewCourse};
use lms_common::db::{Course, CourseLevel, CourseStatus};
use lms_common::pagination::{PageRequest, Paged, DEFAULT_PAGE_SIZE};
use serde::Deserialize;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::ApiResult;
use crate::AppState;

/// Query parameters for the admin course list
#[derive(Debug, Deserialize)]
pub struct CourseListQuery {
    pub status: Option<CourseStatus>,
    pub level: Option<CourseLevel>,
    pub category_id: Option<String>,
    pub search: Option<String>,
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

/// GET /api/courses
pub async fn list_courses(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CourseListQuery>,
) -> ApiResult<Json<Paged<Course>>> {
    let filter = CourseFilter {
        status: query.status,
        level: query.level,
        category_id: query.category_id,
        search: query.search,
    };
    let page = PageRequest {
        page: query.page,
        page_size: query.page_size,
    }
    .capped(state.config.max_page_size);

    let courses = CourseRepository::new(state.db.clone())
        .list_courses(&filter, page)
        .await?;
    Ok(Json(courses))
}

/// POST /api/courses
pub async fn create_course(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewCourse>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let course = CourseRepository::new(state.db.clone()).create_course(new).await?;
    state.catalog_cache.invalidate();
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/courses/:id
pub async fn get_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Course>> {
    let course = CourseRepository::new(state.db.clone()).get_course(&id).await?;
    Ok(Json(course))
}

/// PUT /api/courses/:id
pub async fn update_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(update): ApiJson<CourseUpdate>,
) -> ApiResult<Json<Course>> {
    let course = CourseRepository::new(state.db.clone())
        .update_course(&id, update)
        .await?;
    state.catalog_cache.invalidate();
    Ok(Json(course))
}

/// DELETE /api/courses/:id
pub async fn delete_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    CourseRepository::new(state.db.clone()).delete_course(&id).await?;
    state.catalog_cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/courses/:id/outline
///
/// Admin view: includes draft modules.
pub async fn get_outline(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<CourseOutline>> {
    let outline = CourseRepository::new(state.db.clone())
        .get_outline(&id, false)
        .await?;
    Ok(Json(outline))
}

/// POST /api/courses/:id/recount
pub async fn recount_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Vec<RepairChange>>> {
    let changes = CourseRepository::new(state.db.clone())
        .recount_course(&id)
        .await?;
    if !changes.is_empty() {
        state.catalog_cache.invalidate();
    }
    Ok(Json(changes))
}
