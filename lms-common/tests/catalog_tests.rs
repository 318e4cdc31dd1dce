//! Public catalog listing tests

use lms_common::catalog::{Catalog, CatalogQuery};
use lms_common::categories::{CategoryRepository, NewCategory};
use lms_common::courses::{CourseRepository, NewCourse, NewLesson, NewModule};
use lms_common::db::{init_database, CourseLevel, CourseStatus, LessonType, ModuleStatus};
use lms_common::Error;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lms.db")).await.unwrap();
    (dir, pool)
}

async fn add_course(
    pool: &SqlitePool,
    title: &str,
    status: CourseStatus,
    level: CourseLevel,
    category_ids: Vec<String>,
) -> String {
    CourseRepository::new(pool.clone())
        .create_course(NewCourse {
            title: title.to_string(),
            description: String::new(),
            status,
            level,
            price_cents: 0,
            category_ids,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_cursor_walks_every_published_course_once() {
    let (_dir, pool) = setup().await;
    let mut published = HashSet::new();
    for i in 0..7 {
        published.insert(
            add_course(
                &pool,
                &format!("Course {}", i),
                CourseStatus::Published,
                CourseLevel::Beginner,
                vec![],
            )
            .await,
        );
    }
    add_course(&pool, "Hidden", CourseStatus::Draft, CourseLevel::Beginner, vec![]).await;

    let catalog = Catalog::new(pool.clone());
    let mut seen = HashSet::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = catalog
            .list_catalog(
                &CatalogQuery {
                    cursor: cursor.clone(),
                    limit: Some(3),
                    ..Default::default()
                },
                100,
            )
            .await
            .unwrap();
        pages += 1;
        assert!(page.entries.len() <= 3);
        for entry in &page.entries {
            assert!(seen.insert(entry.course.id.clone()), "course listed twice");
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen, published);
}

#[tokio::test]
async fn test_exact_final_page_has_no_cursor() {
    let (_dir, pool) = setup().await;
    for i in 0..2 {
        add_course(
            &pool,
            &format!("Course {}", i),
            CourseStatus::Published,
            CourseLevel::Beginner,
            vec![],
        )
        .await;
    }

    let page = Catalog::new(pool.clone())
        .list_catalog(
            &CatalogQuery {
                limit: Some(2),
                ..Default::default()
            },
            100,
        )
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 2);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_filters_by_category_level_and_search() {
    let (_dir, pool) = setup().await;
    let rust = CategoryRepository::new(pool.clone())
        .create_category(NewCategory {
            name: "Rust".to_string(),
            description: String::new(),
        })
        .await
        .unwrap()
        .id;

    add_course(&pool, "Async Rust", CourseStatus::Published, CourseLevel::Advanced, vec![rust.clone()]).await;
    add_course(&pool, "Rust Basics", CourseStatus::Published, CourseLevel::Beginner, vec![rust.clone()]).await;
    add_course(&pool, "Cooking", CourseStatus::Published, CourseLevel::Beginner, vec![]).await;

    let catalog = Catalog::new(pool.clone());
    let in_rust = catalog
        .list_catalog(
            &CatalogQuery {
                category_id: Some(rust.clone()),
                ..Default::default()
            },
            100,
        )
        .await
        .unwrap();
    assert_eq!(in_rust.entries.len(), 2);

    let advanced = catalog
        .list_catalog(
            &CatalogQuery {
                category_id: Some(rust),
                level: Some(CourseLevel::Advanced),
                ..Default::default()
            },
            100,
        )
        .await
        .unwrap();
    assert_eq!(advanced.entries.len(), 1);
    assert_eq!(advanced.entries[0].course.title, "Async Rust");

    let searched = catalog
        .list_catalog(
            &CatalogQuery {
                search: Some("cook".to_string()),
                ..Default::default()
            },
            100,
        )
        .await
        .unwrap();
    assert_eq!(searched.entries.len(), 1);
}

#[tokio::test]
async fn test_entry_figures_count_published_modules_only() {
    let (_dir, pool) = setup().await;
    let courses = CourseRepository::new(pool.clone());
    let id = add_course(&pool, "Rust", CourseStatus::Published, CourseLevel::Beginner, vec![]).await;

    for (title, status, minutes) in [
        ("Live", ModuleStatus::Published, 20),
        ("Draft", ModuleStatus::Draft, 500),
    ] {
        let module = courses
            .add_module(
                &id,
                NewModule {
                    title: title.to_string(),
                    status,
                },
            )
            .await
            .unwrap();
        courses
            .add_lesson(
                &module.id,
                NewLesson {
                    title: "Lesson".to_string(),
                    lesson_type: LessonType::Video,
                    duration_minutes: minutes,
                    video_url: Some("https://videos.example/1".to_string()),
                    content: None,
                },
            )
            .await
            .unwrap();
    }

    let page = Catalog::new(pool.clone())
        .list_catalog(&CatalogQuery::default(), 100)
        .await
        .unwrap();
    let entry = &page.entries[0];
    assert_eq!(entry.module_count, 1);
    assert_eq!(entry.lesson_count, 1);
    assert_eq!(entry.total_duration_minutes, 20);
}

#[tokio::test]
async fn test_limit_clamped_and_bad_cursor_rejected() {
    let (_dir, pool) = setup().await;
    for i in 0..4 {
        add_course(
            &pool,
            &format!("Course {}", i),
            CourseStatus::Published,
            CourseLevel::Beginner,
            vec![],
        )
        .await;
    }
    let catalog = Catalog::new(pool.clone());

    let capped = catalog
        .list_catalog(
            &CatalogQuery {
                limit: Some(1_000),
                ..Default::default()
            },
            2,
        )
        .await
        .unwrap();
    assert_eq!(capped.entries.len(), 2);
    assert!(capped.next_cursor.is_some());

    let err = catalog
        .list_catalog(
            &CatalogQuery {
                cursor: Some("garbage".to_string()),
                ..Default::default()
            },
            2,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_detail_hides_drafts() {
    let (_dir, pool) = setup().await;
    let draft = add_course(&pool, "Soon", CourseStatus::Draft, CourseLevel::Beginner, vec![]).await;
    let live = add_course(&pool, "Now", CourseStatus::Published, CourseLevel::Beginner, vec![]).await;
    let catalog = Catalog::new(pool.clone());

    assert!(matches!(
        catalog.catalog_detail(&draft).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert_eq!(catalog.catalog_detail(&live).await.unwrap().course.title, "Now");
}
