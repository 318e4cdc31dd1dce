//! lms-server library - course catalog and learning records service
//!
//! Admin CRUD over the course aggregate, learner records, repair routines and
//! the public catalog, all served as JSON over HTTP.

use axum::Router;
use lms_common::config::ServiceConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod error;

use cache::CatalogCache;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<ServiceConfig>,
    pub catalog_cache: CatalogCache,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig) -> Self {
        let catalog_cache = CatalogCache::with_ttl(
            config.catalog_cache_capacity,
            Duration::from_secs(config.catalog_cache_ttl_secs),
        );
        Self {
            db,
            config: Arc::new(config),
            catalog_cache,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let admin = Router::new()
        // Categories
        .route(
            "/api/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route(
            "/api/categories/:id",
            get(api::categories::get_category)
                .put(api::categories::update_category)
                .delete(api::categories::delete_category),
        )
        // Courses
        .route(
            "/api/courses",
            get(api::courses::list_courses).post(api::courses::create_course),
        )
        .route(
            "/api/courses/:id",
            get(api::courses::get_course)
                .put(api::courses::update_course)
                .delete(api::courses::delete_course),
        )
        .route("/api/courses/:id/outline", get(api::courses::get_outline))
        .route("/api/courses/:id/recount", post(api::courses::recount_course))
        // Modules
        .route(
            "/api/courses/:id/modules",
            get(api::modules::list_modules).post(api::modules::add_module),
        )
        .route("/api/courses/:id/modules/order", put(api::modules::reorder_modules))
        .route(
            "/api/modules/:id",
            put(api::modules::update_module).delete(api::modules::delete_module),
        )
        // Lessons
        .route(
            "/api/modules/:id/lessons",
            get(api::modules::list_lessons).post(api::modules::add_lesson),
        )
        .route("/api/modules/:id/lessons/order", put(api::modules::reorder_lessons))
        .route(
            "/api/lessons/:id",
            put(api::modules::update_lesson).delete(api::modules::delete_lesson),
        )
        // Quizzes
        .route(
            "/api/courses/:id/quizzes",
            get(api::quizzes::list_quizzes).post(api::quizzes::create_quiz),
        )
        .route(
            "/api/quizzes/:id",
            get(api::quizzes::get_quiz).delete(api::quizzes::delete_quiz),
        )
        .route("/api/quizzes/:id/submit", post(api::quizzes::submit_quiz))
        .route("/api/quiz-results", get(api::quizzes::list_quiz_results))
        // Enrollments
        .route(
            "/api/enrollments",
            get(api::enrollments::list_enrollments).post(api::enrollments::enroll),
        )
        .route("/api/enrollments/:id", get(api::enrollments::get_enrollment))
        .route("/api/enrollments/:id/progress", put(api::enrollments::update_progress))
        .route("/api/enrollments/:id/status", put(api::enrollments::set_status))
        // Certificates
        .route(
            "/api/certificates",
            get(api::certificates::list_certificates).post(api::certificates::issue_certificate),
        )
        .route("/api/certificates/:id", get(api::certificates::get_certificate))
        .route("/api/certificates/:id/revoke", post(api::certificates::revoke_certificate))
        .route("/api/certificates/:id/render", get(api::certificates::render_certificate))
        .route("/api/verify/:code", get(api::certificates::verify_certificate))
        .route(
            "/api/certificate-templates",
            get(api::certificates::list_templates).post(api::certificates::create_template),
        )
        .route(
            "/api/certificate-templates/:id",
            get(api::certificates::get_template).delete(api::certificates::delete_template),
        )
        .route(
            "/api/certificate-templates/:id/fields",
            put(api::certificates::update_template_fields),
        )
        // Maintenance
        .route("/api/repair/:routine", post(api::maintenance::run_repair))
        .route("/api/dashboard", get(api::maintenance::get_dashboard));

    let public = Router::new()
        .route("/api/catalog", get(api::catalog::list_catalog))
        .route("/api/catalog/:id", get(api::catalog::catalog_detail))
        .route("/api/buildinfo", get(api::health::get_build_info))
        .merge(api::health::health_routes());

    Router::new()
        .merge(admin)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
