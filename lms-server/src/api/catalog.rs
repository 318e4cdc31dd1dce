//! Public catalog endpoints (published courses only)

use axum::{
    extract::State,
    Json,
};
use lms_common::catalog::{Catalog, CatalogPage, CatalogQuery};
use lms_common::courses::CourseOutline;

use super::{ApiPath, ApiQuery};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/catalog?category_id=&level=&search=&cursor=&limit=
pub async fn list_catalog(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CatalogQuery>,
) -> ApiResult<Json<CatalogPage>> {
    let max_page_size = state.config.max_page_size;
    let catalog = Catalog::new(state.db.clone());
    let page = state
        .catalog_cache
        .page_or_load(query.clone(), || async move {
            catalog
                .list_catalog(&query, max_page_size)
                .await
                .map_err(ApiError::from)
        })
        .await?;
    Ok(Json(page.as_ref().clone()))
}

/// GET /api/catalog/:id
pub async fn catalog_detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<CourseOutline>> {
    let catalog = Catalog::new(state.db.clone());
    let outline = state
        .catalog_cache
        .detail_or_load(&id, || {
            let id = id.clone();
            async move { catalog.catalog_detail(&id).await.map_err(ApiError::from) }
        })
        .await?;
    Ok(Json(outline.as_ref().clone()))
}
