//! Repair routines and dashboard endpoints

use axum::{
    extract::State,
    Json,
};
use lms_common::dashboard::{dashboard_stats, DashboardStats};
use lms_common::reconcile::{Reconciler, RepairReport, RepairRoutine};
use serde::Deserialize;
use tracing::info;

use super::{ApiPath, ApiQuery};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RepairQuery {
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/repair/:routine?dry_run=true
///
/// `routine` is one routine name or `all`; the response is always a list of
/// reports, one per routine run.
pub async fn run_repair(
    State(state): State<AppState>,
    ApiPath(routine): ApiPath<String>,
    ApiQuery(query): ApiQuery<RepairQuery>,
) -> ApiResult<Json<Vec<RepairReport>>> {
    let reconciler = Reconciler::new(state.db.clone());
    let reports = if routine == "all" {
        reconciler.repair_all(query.dry_run).await?
    } else {
        let routine: RepairRoutine = routine.parse()?;
        vec![reconciler.run(routine, query.dry_run).await?]
    };

    let corrected = !query.dry_run && reports.iter().any(|report| !report.is_clean());
    if corrected {
        state.catalog_cache.invalidate();
    }
    info!(
        "Repair '{}' via API (dry_run={}): {} report(s)",
        routine,
        query.dry_run,
        reports.len()
    );
    Ok(Json(reports))
}

/// GET /api/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let stats = dashboard_stats(&state.db).await?;
    Ok(Json(stats))
}
