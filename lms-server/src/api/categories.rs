//! Category endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lms_common::categories::{CategoryRepository, CategoryUpdate, NewCategory};
use lms_common::db::Category;

use super::{ApiJson, ApiPath};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.db.clone()).list_categories().await?;
    Ok(Json(categories))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = CategoryRepository::new(state.db.clone()).create_category(new).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Category>> {
    let category = CategoryRepository::new(state.db.clone()).get_category(&id).await?;
    Ok(Json(category))
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(update): ApiJson<CategoryUpdate>,
) -> ApiResult<Json<Category>> {
    let category = CategoryRepository::new(state.db.clone())
        .update_category(&id, update)
        .await?;
    Ok(Json(category))
}

/// DELETE /api/categories/:id
///
/// 409 while any course still references the category.
pub async fn delete_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    CategoryRepository::new(state.db.clone()).delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
