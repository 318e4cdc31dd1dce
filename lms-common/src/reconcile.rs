//! Reconciler for denormalized values
//!
//! Repair routines scan whole tables, recompute each stored aggregate from its
//! source rows and overwrite drifted values. Every routine runs inside a
//! single transaction: it commits all of its corrections or none. A dry run
//! performs the same work and rolls back, which is how drift is verified
//! without writing.

use serde::Serialize;
use serde_json::json;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::categories::category_exists;
use crate::counts::{sync_category_count, sync_lesson_count, sync_modules_list, RepairChange};
use crate::courses::dedup_ids;
use crate::time::now_millis;
use crate::{Error, Result};

/// Repair routines, in the order `repair_all` runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairRoutine {
    CourseCategoryIds,
    CategoryCounts,
    ModulesLists,
    ModuleLessonCounts,
    DisplayFields,
}

impl RepairRoutine {
    pub const ALL: [RepairRoutine; 5] = [
        RepairRoutine::CourseCategoryIds,
        RepairRoutine::CategoryCounts,
        RepairRoutine::ModulesLists,
        RepairRoutine::ModuleLessonCounts,
        RepairRoutine::DisplayFields,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairRoutine::CourseCategoryIds => "course-category-ids",
            RepairRoutine::CategoryCounts => "category-counts",
            RepairRoutine::ModulesLists => "modules-lists",
            RepairRoutine::ModuleLessonCounts => "module-lesson-counts",
            RepairRoutine::DisplayFields => "display-fields",
        }
    }
}

impl fmt::Display for RepairRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairRoutine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RepairRoutine::ALL
            .into_iter()
            .find(|routine| routine.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown repair routine '{}'", s)))
    }
}

/// Outcome of one repair routine
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub routine: RepairRoutine,
    pub dry_run: bool,
    /// Entities examined
    pub scanned: usize,
    /// Entities with at least one corrected value
    pub repaired: usize,
    pub changes: Vec<RepairChange>,
}

impl RepairReport {
    fn new(routine: RepairRoutine, dry_run: bool) -> Self {
        Self {
            routine,
            dry_run,
            scanned: 0,
            repaired: 0,
            changes: Vec::new(),
        }
    }

    fn record(&mut self, changes: Vec<RepairChange>) {
        self.scanned += 1;
        if !changes.is_empty() {
            self.repaired += 1;
            self.changes.extend(changes);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }
}

pub struct Reconciler {
    pool: SqlitePool,
}

impl Reconciler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run(&self, routine: RepairRoutine, dry_run: bool) -> Result<RepairReport> {
        let mut tx = self.pool.begin().await?;
        let report = run_routine(&mut tx, routine, dry_run).await?;
        finish(tx, &report).await?;
        Ok(report)
    }

    /// Recompute `course_count` for every category
    pub async fn fix_all_category_counts(&self, dry_run: bool) -> Result<RepairReport> {
        self.run(RepairRoutine::CategoryCounts, dry_run).await
    }

    /// Fold legacy category references into `category_ids` and drop dangling ids
    pub async fn fix_course_category_ids(&self, dry_run: bool) -> Result<RepairReport> {
        self.run(RepairRoutine::CourseCategoryIds, dry_run).await
    }

    /// Rebuild every course's `modules_list` from its module rows
    pub async fn fix_course_modules_lists(&self, dry_run: bool) -> Result<RepairReport> {
        self.run(RepairRoutine::ModulesLists, dry_run).await
    }

    /// Compare every module's `lesson_count` with its lessons, fixing drift
    pub async fn verify_all_module_lesson_counts(&self, dry_run: bool) -> Result<RepairReport> {
        self.run(RepairRoutine::ModuleLessonCounts, dry_run).await
    }

    /// Rewrite drifted `course_title` copies on enrollments, certificates, quiz results
    pub async fn fix_display_fields(&self, dry_run: bool) -> Result<RepairReport> {
        self.run(RepairRoutine::DisplayFields, dry_run).await
    }

    /// Run every routine in dependency order inside one transaction
    ///
    /// Category ids are cleaned before category counts are taken from them.
    pub async fn repair_all(&self, dry_run: bool) -> Result<Vec<RepairReport>> {
        let mut tx = self.pool.begin().await?;
        let mut reports = Vec::with_capacity(RepairRoutine::ALL.len());
        for routine in RepairRoutine::ALL {
            let report = run_routine(&mut tx, routine, dry_run).await?;
            log_report(&report);
            reports.push(report);
        }

        let total: usize = reports.iter().map(|r| r.changes.len()).sum();
        if dry_run {
            tx.rollback().await?;
            info!("Dry-run repair found {} drifted value(s)", total);
        } else {
            tx.commit().await?;
            info!("Repair corrected {} drifted value(s)", total);
        }
        Ok(reports)
    }
}

async fn finish(tx: sqlx::Transaction<'_, sqlx::Sqlite>, report: &RepairReport) -> Result<()> {
    if report.dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }
    log_report(report);
    Ok(())
}

fn log_report(report: &RepairReport) {
    if report.is_clean() {
        info!("{}: scanned {}, no drift", report.routine, report.scanned);
    } else {
        warn!(
            "{}: scanned {}, {} {} drifted value(s) on {} entities",
            report.routine,
            report.scanned,
            if report.dry_run { "found" } else { "corrected" },
            report.changes.len(),
            report.repaired
        );
    }
}

async fn run_routine(
    conn: &mut SqliteConnection,
    routine: RepairRoutine,
    dry_run: bool,
) -> Result<RepairReport> {
    let mut report = RepairReport::new(routine, dry_run);
    match routine {
        RepairRoutine::CategoryCounts => {
            for id in all_ids(conn, "categories").await? {
                let change = sync_category_count(conn, &id).await?;
                report.record(change.into_iter().collect());
            }
        }
        RepairRoutine::CourseCategoryIds => {
            for id in all_ids(conn, "courses").await? {
                let changes = repair_course_category_ids(conn, &id).await?;
                report.record(changes);
            }
        }
        RepairRoutine::ModulesLists => {
            for id in all_ids(conn, "courses").await? {
                let changes = sync_modules_list(conn, &id).await?;
                report.record(changes);
            }
        }
        RepairRoutine::ModuleLessonCounts => {
            for id in all_ids(conn, "modules").await? {
                let changes = sync_lesson_count(conn, &id).await?;
                report.record(changes);
            }
        }
        RepairRoutine::DisplayFields => {
            for table in ["enrollments", "certificates", "quiz_results"] {
                repair_course_titles(conn, table, &mut report).await?;
            }
        }
    }
    Ok(report)
}

async fn all_ids(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(&format!("SELECT id FROM {} ORDER BY id", table))
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

/// Normalize one course's `category_ids`
///
/// Folds `legacy_category_id` in when that category exists, drops ids of
/// deleted categories and duplicates. The legacy field is cleared once
/// handled either way.
async fn repair_course_category_ids(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<Vec<RepairChange>> {
    let row = sqlx::query("SELECT category_ids, legacy_category_id FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_one(&mut *conn)
        .await?;
    let raw: String = row.try_get("category_ids")?;
    let legacy: Option<String> = row.try_get("legacy_category_id")?;

    // Unparseable arrays are rebuilt from whatever string ids can be salvaged
    let stored_value: serde_json::Value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
    let stored: Vec<String> = stored_value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut candidates = stored.clone();
    if let Some(legacy_id) = legacy.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        candidates.push(legacy_id.to_string());
    }

    let mut actual = Vec::with_capacity(candidates.len());
    for id in dedup_ids(candidates.clone()) {
        if category_exists(conn, &id).await? {
            actual.push(id);
        }
    }

    let mut changes = Vec::new();
    let actual_value = json!(actual);
    if stored_value != actual_value || legacy.is_some() {
        // Categories gaining or losing this course
        let mut touched: Vec<String> = candidates
            .iter()
            .filter(|id| !actual.contains(id))
            .chain(actual.iter().filter(|id| !stored.contains(id)))
            .cloned()
            .collect();
        touched = dedup_ids(touched);

        sqlx::query(
            "UPDATE courses SET category_ids = ?, legacy_category_id = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(actual_value.to_string())
        .bind(now_millis())
        .bind(course_id)
        .execute(&mut *conn)
        .await?;

        if stored_value != actual_value {
            changes.push(RepairChange {
                entity: "course",
                entity_id: course_id.to_string(),
                field: "category_ids",
                stored: stored_value,
                actual: actual_value,
            });
        }
        if let Some(legacy) = legacy {
            changes.push(RepairChange {
                entity: "course",
                entity_id: course_id.to_string(),
                field: "legacy_category_id",
                stored: json!(legacy),
                actual: serde_json::Value::Null,
            });
        }

        for category_id in touched {
            changes.extend(sync_category_count(conn, &category_id).await?);
        }
    }

    Ok(changes)
}

/// Rewrite `course_title` copies in `table` that differ from the live title
///
/// Rows whose course was deleted keep their last known title.
async fn repair_course_titles(
    conn: &mut SqliteConnection,
    table: &'static str,
    report: &mut RepairReport,
) -> Result<()> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT r.id AS id, r.course_title AS stored, c.title AS actual
        FROM {} r
        JOIN courses c ON c.id = r.course_id
        ORDER BY r.id
        "#,
        table
    ))
    .fetch_all(&mut *conn)
    .await?;

    let entity = match table {
        "enrollments" => "enrollment",
        "certificates" => "certificate",
        _ => "quiz_result",
    };

    for row in &rows {
        let id: String = row.try_get("id")?;
        let stored: String = row.try_get("stored")?;
        let actual: String = row.try_get("actual")?;

        if stored == actual {
            report.record(Vec::new());
            continue;
        }

        sqlx::query(&format!("UPDATE {} SET course_title = ? WHERE id = ?", table))
            .bind(&actual)
            .bind(&id)
            .execute(&mut *conn)
            .await?;
        report.record(vec![RepairChange {
            entity,
            entity_id: id,
            field: "course_title",
            stored: json!(stored),
            actual: json!(actual),
        }]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_names_round_trip() {
        for routine in RepairRoutine::ALL {
            assert_eq!(routine.as_str().parse::<RepairRoutine>().unwrap(), routine);
        }
        assert!("everything".parse::<RepairRoutine>().is_err());
    }

    #[test]
    fn test_routine_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&RepairRoutine::ModuleLessonCounts).unwrap(),
            "\"module-lesson-counts\""
        );
    }

    #[test]
    fn test_report_counts_repaired_entities() {
        let mut report = RepairReport::new(RepairRoutine::CategoryCounts, true);
        report.record(Vec::new());
        report.record(vec![RepairChange {
            entity: "category",
            entity_id: "c1".to_string(),
            field: "course_count",
            stored: json!(3),
            actual: json!(1),
        }]);
        assert_eq!(report.scanned, 2);
        assert_eq!(report.repaired, 1);
        assert!(!report.is_clean());
    }
}
