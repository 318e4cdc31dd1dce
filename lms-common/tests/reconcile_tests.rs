//! Repair routine tests
//!
//! Drift is injected with raw SQL, bypassing the repositories, then each
//! routine is run as a dry run (reports, writes nothing) and for real.

use lms_common::categories::{CategoryRepository, NewCategory};
use lms_common::courses::{CourseRepository, CourseUpdate, NewCourse, NewLesson, NewModule};
use lms_common::dashboard::dashboard_stats;
use lms_common::db::{init_database, CourseLevel, CourseStatus, LessonType, ModuleStatus};
use lms_common::enrollments::{EnrollmentRepository, NewEnrollment};
use lms_common::reconcile::{Reconciler, RepairRoutine};
use sqlx::SqlitePool;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    category_id: String,
    course_id: String,
    module_id: String,
}

/// One published course in one category, with a module holding two lessons
async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lms.db")).await.unwrap();

    let category_id = CategoryRepository::new(pool.clone())
        .create_category(NewCategory {
            name: "Rust".to_string(),
            description: String::new(),
        })
        .await
        .unwrap()
        .id;

    let courses = CourseRepository::new(pool.clone());
    let course_id = courses
        .create_course(NewCourse {
            title: "Ownership".to_string(),
            description: String::new(),
            status: CourseStatus::Published,
            level: CourseLevel::Beginner,
            price_cents: 0,
            category_ids: vec![category_id.clone()],
        })
        .await
        .unwrap()
        .id;
    let module_id = courses
        .add_module(
            &course_id,
            NewModule {
                title: "Borrowing".to_string(),
                status: ModuleStatus::Published,
            },
        )
        .await
        .unwrap()
        .id;
    for title in ["Shared", "Mutable"] {
        courses
            .add_lesson(
                &module_id,
                NewLesson {
                    title: title.to_string(),
                    lesson_type: LessonType::Text,
                    duration_minutes: 10,
                    video_url: None,
                    content: None,
                },
            )
            .await
            .unwrap();
    }

    Fixture {
        _dir: dir,
        pool,
        category_id,
        course_id,
        module_id,
    }
}

async fn exec(pool: &SqlitePool, sql: &str, id: &str) {
    sqlx::query(sql).bind(id).execute(pool).await.unwrap();
}

async fn scalar_i64(pool: &SqlitePool, sql: &str, id: &str) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
}

#[tokio::test]
async fn test_consistent_store_reports_clean() {
    let f = fixture().await;
    let reports = Reconciler::new(f.pool.clone()).repair_all(false).await.unwrap();

    assert_eq!(reports.len(), RepairRoutine::ALL.len());
    for report in &reports {
        assert!(report.is_clean(), "{} reported drift: {:?}", report.routine, report.changes);
    }
}

#[tokio::test]
async fn test_category_count_drift_dry_run_then_fix() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    exec(&f.pool, "UPDATE categories SET course_count = 7 WHERE id = ?", &f.category_id).await;

    let dry = reconciler.fix_all_category_counts(true).await.unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.repaired, 1);
    assert_eq!(dry.changes[0].stored, serde_json::json!(7));
    assert_eq!(dry.changes[0].actual, serde_json::json!(1));
    assert_eq!(
        scalar_i64(&f.pool, "SELECT course_count FROM categories WHERE id = ?", &f.category_id).await,
        7,
        "dry run must not write"
    );

    let fixed = reconciler.fix_all_category_counts(false).await.unwrap();
    assert_eq!(fixed.repaired, 1);
    assert_eq!(
        scalar_i64(&f.pool, "SELECT course_count FROM categories WHERE id = ?", &f.category_id).await,
        1
    );

    assert!(reconciler.fix_all_category_counts(false).await.unwrap().is_clean());
}

#[tokio::test]
async fn test_lesson_count_drift_fixed() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    exec(&f.pool, "UPDATE modules SET lesson_count = 0 WHERE id = ?", &f.module_id).await;

    let report = reconciler.verify_all_module_lesson_counts(false).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.repaired, 1);
    assert_eq!(
        scalar_i64(&f.pool, "SELECT lesson_count FROM modules WHERE id = ?", &f.module_id).await,
        2
    );
}

#[tokio::test]
async fn test_modules_list_rebuilt_from_rows() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    exec(
        &f.pool,
        "UPDATE courses SET modules_list = '[\"ghost\"]' WHERE id = ?",
        &f.course_id,
    )
    .await;

    let report = reconciler.fix_course_modules_lists(false).await.unwrap();
    assert_eq!(report.repaired, 1);

    let course = CourseRepository::new(f.pool.clone())
        .get_course(&f.course_id)
        .await
        .unwrap();
    assert_eq!(course.modules_list, vec![f.module_id.clone()]);
}

#[tokio::test]
async fn test_legacy_category_folded_and_dangling_dropped() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    let design = CategoryRepository::new(f.pool.clone())
        .create_category(NewCategory {
            name: "Design".to_string(),
            description: String::new(),
        })
        .await
        .unwrap()
        .id;

    // Pre-migration row: single legacy category, plus a reference to a deleted one
    sqlx::query(
        "UPDATE courses SET category_ids = ?, legacy_category_id = ? WHERE id = ?",
    )
    .bind(format!("[\"{}\", \"deleted-category\"]", f.category_id))
    .bind(&design)
    .bind(&f.course_id)
    .execute(&f.pool)
    .await
    .unwrap();

    let reports = reconciler.repair_all(false).await.unwrap();
    assert!(!reports[0].is_clean());

    let course = CourseRepository::new(f.pool.clone())
        .get_course(&f.course_id)
        .await
        .unwrap();
    assert_eq!(course.category_ids, vec![f.category_id.clone(), design.clone()]);
    assert_eq!(course.legacy_category_id, None);

    // Counts are taken after ids were normalized in the same pass
    assert_eq!(
        scalar_i64(&f.pool, "SELECT course_count FROM categories WHERE id = ?", &design).await,
        1
    );

    for report in reconciler.repair_all(true).await.unwrap() {
        assert!(report.is_clean(), "{} still drifted", report.routine);
    }
}

#[tokio::test]
async fn test_category_id_repair_alone_keeps_counts() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    let design = CategoryRepository::new(f.pool.clone())
        .create_category(NewCategory {
            name: "Design".to_string(),
            description: String::new(),
        })
        .await
        .unwrap()
        .id;

    // Legacy Design reference plus a dangling id; Rust stays
    sqlx::query("UPDATE courses SET category_ids = ?, legacy_category_id = ? WHERE id = ?")
        .bind(format!("[\"{}\", \"deleted-category\"]", f.category_id))
        .bind(&design)
        .bind(&f.course_id)
        .execute(&f.pool)
        .await
        .unwrap();

    let report = reconciler.fix_course_category_ids(false).await.unwrap();
    assert!(report
        .changes
        .iter()
        .any(|c| c.entity == "category" && c.entity_id == design && c.actual == 1));

    assert_eq!(
        scalar_i64(&f.pool, "SELECT course_count FROM categories WHERE id = ?", &design).await,
        1
    );
    assert_eq!(
        scalar_i64(&f.pool, "SELECT course_count FROM categories WHERE id = ?", &f.category_id).await,
        1
    );
    assert!(reconciler.fix_all_category_counts(true).await.unwrap().is_clean());
}

#[tokio::test]
async fn test_display_fields_follow_course_title() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    let enrollment = EnrollmentRepository::new(f.pool.clone())
        .enroll(NewEnrollment {
            user_id: "user-1".to_string(),
            user_name: "Ada".to_string(),
            course_id: f.course_id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(enrollment.course_title, "Ownership");

    // Renames through the repository propagate at once
    CourseRepository::new(f.pool.clone())
        .update_course(
            &f.course_id,
            CourseUpdate {
                title: Some("Ownership and Borrowing".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let enrollment = EnrollmentRepository::new(f.pool.clone())
        .get_enrollment(&enrollment.id)
        .await
        .unwrap();
    assert_eq!(enrollment.course_title, "Ownership and Borrowing");

    // A stale copy written behind the repository's back is repaired
    exec(
        &f.pool,
        "UPDATE enrollments SET course_title = 'Stale' WHERE id = ?",
        &enrollment.id,
    )
    .await;
    let report = reconciler.fix_display_fields(false).await.unwrap();
    assert_eq!(report.repaired, 1);
    assert_eq!(report.changes[0].entity, "enrollment");

    let enrollment = EnrollmentRepository::new(f.pool.clone())
        .get_enrollment(&enrollment.id)
        .await
        .unwrap();
    assert_eq!(enrollment.course_title, "Ownership and Borrowing");
}

#[tokio::test]
async fn test_repair_all_dry_run_leaves_store_untouched() {
    let f = fixture().await;
    let reconciler = Reconciler::new(f.pool.clone());
    exec(&f.pool, "UPDATE categories SET course_count = 3 WHERE id = ?", &f.category_id).await;
    exec(&f.pool, "UPDATE modules SET lesson_count = 9 WHERE id = ?", &f.module_id).await;

    let stats = dashboard_stats(&f.pool).await.unwrap();
    assert!(stats.drift_detected);

    let reports = reconciler.repair_all(true).await.unwrap();
    let drifted: usize = reports.iter().map(|r| r.changes.len()).sum();
    assert_eq!(drifted, 2);
    assert_eq!(
        scalar_i64(&f.pool, "SELECT lesson_count FROM modules WHERE id = ?", &f.module_id).await,
        9
    );

    reconciler.repair_all(false).await.unwrap();
    let stats = dashboard_stats(&f.pool).await.unwrap();
    assert!(!stats.drift_detected);
    assert_eq!(stats.courses_published, 1);
    assert_eq!(stats.categories, 1);
}

#[tokio::test]
async fn test_run_by_routine_name() {
    let f = fixture().await;
    let routine: RepairRoutine = "category-counts".parse().unwrap();
    let report = Reconciler::new(f.pool.clone()).run(routine, true).await.unwrap();
    assert_eq!(report.routine, RepairRoutine::CategoryCounts);
    assert_eq!(report.scanned, 1);
}
