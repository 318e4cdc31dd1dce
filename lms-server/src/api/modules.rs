//! Module and lesson endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lms_common::courses::{CourseRepository, LessonUpdate, ModuleUpdate, NewLesson, NewModule};
use lms_common::db::{Lesson, Module};
use serde::Deserialize;

use super::{ApiJson, ApiPath};
use crate::error::ApiResult;
use crate::AppState;

/// Body of the reorder endpoints: every current id, in the new order
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

/// GET /api/courses/:id/modules
pub async fn list_modules(
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<String>,
) -> ApiResult<Json<Vec<Module>>> {
    let modules = CourseRepository::new(state.db.clone())
        .list_modules(&course_id)
        .await?;
    Ok(Json(modules))
}

/// POST /api/courses/:id/modules
pub async fn add_module(
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<String>,
    ApiJson(new): ApiJson<NewModule>,
) -> ApiResult<(StatusCode, Json<Module>)> {
    let module = CourseRepository::new(state.db.clone())
        .add_module(&course_id, new)
        .await?;
    state.catalog_cache.invalidate();
    Ok((StatusCode::CREATED, Json(module)))
}

/// PUT /api/courses/:id/modules/order
pub async fn reorder_modules(
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<String>,
    ApiJson(request): ApiJson<ReorderRequest>,
) -> ApiResult<Json<Vec<Module>>> {
    let modules = CourseRepository::new(state.db.clone())
        .reorder_modules(&course_id, &request.ids)
        .await?;
    state.catalog_cache.invalidate();
    Ok(Json(modules))
}

/// PUT /api/modules/:id
pub async fn update_module(
    State(state): State<AppState>,
    ApiPath(module_id): ApiPath<String>,
    ApiJson(update): ApiJson<ModuleUpdate>,
) -> ApiResult<Json<Module>> {
    let module = CourseRepository::new(state.db.clone())
        .update_module(&module_id, update)
        .await?;
    state.catalog_cache.invalidate();
    Ok(Json(module))
}

/// DELETE /api/modules/:id
pub async fn delete_module(
    State(state): State<AppState>,
    ApiPath(module_id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    CourseRepository::new(state.db.clone())
        .delete_module(&module_id)
        .await?;
    state.catalog_cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/modules/:id/lessons
pub async fn list_lessons(
    State(state): State<AppState>,
    ApiPath(module_id): ApiPath<String>,
) -> ApiResult<Json<Vec<Lesson>>> {
    let lessons = CourseRepository::new(state.db.clone())
        .list_lessons(&module_id)
        .await?;
    Ok(Json(lessons))
}

/// POST /api/modules/:id/lessons
pub async fn add_lesson(
    State(state): State<AppState>,
    ApiPath(module_id): ApiPath<String>,
    ApiJson(new): ApiJson<NewLesson>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    let lesson = CourseRepository::new(state.db.clone())
        .add_lesson(&module_id, new)
        .await?;
    state.catalog_cache.invalidate();
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// PUT /api/modules/:id/lessons/order
pub async fn reorder_lessons(
    State(state): State<AppState>,
    ApiPath(module_id): ApiPath<String>,
    ApiJson(request): ApiJson<ReorderRequest>,
) -> ApiResult<Json<Vec<Lesson>>> {
    let lessons = CourseRepository::new(state.db.clone())
        .reorder_lessons(&module_id, &request.ids)
        .await?;
    state.catalog_cache.invalidate();
    Ok(Json(lessons))
}

/// PUT /api/lessons/:id
pub async fn update_lesson(
    State(state): State<AppState>,
    ApiPath(lesson_id): ApiPath<String>,
    ApiJson(update): ApiJson<LessonUpdate>,
) -> ApiResult<Json<Lesson>> {
    let lesson = CourseRepository::new(state.db.clone())
        .update_lesson(&lesson_id, update)
        .await?;
    state.catalog_cache.invalidate();
    Ok(Json(lesson))
}

/// DELETE /api/lessons/:id
pub async fn delete_lesson(
    State(state): State<AppState>,
    ApiPath(lesson_id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    CourseRepository::new(state.db.clone())
        .delete_lesson(&lesson_id)
        .await?;
    state.catalog_cache.invalidate();
    Ok(StatusCode::NO_CONTENT)
}
