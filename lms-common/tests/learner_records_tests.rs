//! Enrollment, quiz and certificate lifecycle tests

use lms_common::certificates::{CertificateFilter, CertificateRepository, IssueCertificate, NewTemplate};
use lms_common::courses::{CourseRepository, NewCourse, NewLesson, NewModule};
use lms_common::db::{
    init_database, CertificateStatus, Course, CourseLevel, CourseStatus, EnrollmentStatus,
    LessonType, ModuleStatus, QuizQuestion, QuizResultStatus, TemplateField, TemplateFieldKey,
};
use lms_common::enrollments::{EnrollmentFilter, EnrollmentRepository, NewEnrollment};
use lms_common::pagination::PageRequest;
use lms_common::quizzes::{NewQuiz, QuizRepository, QuizResultFilter, QuizSubmission};
use lms_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lms.db")).await.unwrap();
    (dir, pool)
}

async fn create_course(pool: &SqlitePool, title: &str, status: CourseStatus) -> Course {
    CourseRepository::new(pool.clone())
        .create_course(NewCourse {
            title: title.to_string(),
            description: String::new(),
            status,
            level: CourseLevel::Intermediate,
            price_cents: 4900,
            category_ids: Vec::new(),
        })
        .await
        .unwrap()
}

fn enrollment(user: &str, course_id: &str) -> NewEnrollment {
    NewEnrollment {
        user_id: user.to_string(),
        user_name: format!("User {}", user),
        course_id: course_id.to_string(),
    }
}

fn question(prompt: &str, correct: usize) -> QuizQuestion {
    QuizQuestion {
        prompt: prompt.to_string(),
        options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        correct_option: correct,
    }
}

// ----------------------------------------------------------------------
// Enrollments
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_enroll_requires_published_course() {
    let (_dir, pool) = setup().await;
    let repo = EnrollmentRepository::new(pool.clone());
    let draft = create_course(&pool, "Draft", CourseStatus::Draft).await;

    assert!(matches!(
        repo.enroll(enrollment("u1", &draft.id)).await.unwrap_err(),
        Error::InvalidInput(_)
    ));
    assert!(matches!(
        repo.enroll(enrollment("u1", "missing")).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_duplicate_enrollment_conflicts_until_cancelled() {
    let (_dir, pool) = setup().await;
    let repo = EnrollmentRepository::new(pool.clone());
    let course = create_course(&pool, "Rust", CourseStatus::Published).await;

    let first = repo.enroll(enrollment("u1", &course.id)).await.unwrap();
    assert_eq!(first.status, EnrollmentStatus::Active);
    assert_eq!(first.course_title, "Rust");
    assert!(matches!(
        repo.enroll(enrollment("u1", &course.id)).await.unwrap_err(),
        Error::Conflict(_)
    ));

    repo.set_status(&first.id, EnrollmentStatus::Cancelled).await.unwrap();
    let second = repo.enroll(enrollment("u1", &course.id)).await.unwrap();
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn test_one_live_enrollment_enforced_by_index() {
    let (_dir, pool) = setup().await;
    let repo = EnrollmentRepository::new(pool.clone());
    let course = create_course(&pool, "Rust", CourseStatus::Published).await;

    let first = repo.enroll(enrollment("u1", &course.id)).await.unwrap();
    repo.set_status(&first.id, EnrollmentStatus::Cancelled).await.unwrap();
    let second = repo.enroll(enrollment("u1", &course.id)).await.unwrap();

    // Reviving the cancelled row would leave two live enrollments
    assert!(matches!(
        repo.set_status(&first.id, EnrollmentStatus::Active).await.unwrap_err(),
        Error::Conflict(_)
    ));

    // Writes bypassing the repository hit the same index
    let raw = sqlx::query(
        r#"
        INSERT INTO enrollments (
            id, user_id, user_name, course_id, course_title, status,
            progress_percent, enrolled_at, completed_at
        )
        VALUES ('dup', 'u1', 'User u1', ?, 'Rust', 'active', 0, 0, NULL)
        "#,
    )
    .bind(&course.id)
    .execute(&pool)
    .await;
    assert!(raw.is_err());

    let live = repo.get_enrollment(&second.id).await.unwrap();
    assert_eq!(live.status, EnrollmentStatus::Active);
}

#[tokio::test]
async fn test_progress_completes_at_hundred() {
    let (_dir, pool) = setup().await;
    let repo = EnrollmentRepository::new(pool.clone());
    let course = create_course(&pool, "Rust", CourseStatus::Published).await;
    let e = repo.enroll(enrollment("u1", &course.id)).await.unwrap();

    let half = repo.update_progress(&e.id, 50).await.unwrap();
    assert_eq!(half.progress_percent, 50);
    assert_eq!(half.status, EnrollmentStatus::Active);
    assert!(half.completed_at.is_none());

    let done = repo.update_progress(&e.id, 100).await.unwrap();
    assert_eq!(done.status, EnrollmentStatus::Completed);
    assert!(done.completed_at.is_some());

    assert!(matches!(
        repo.update_progress(&e.id, 101).await.unwrap_err(),
        Error::InvalidInput(_)
    ));

    repo.set_status(&e.id, EnrollmentStatus::Cancelled).await.unwrap();
    assert!(matches!(
        repo.update_progress(&e.id, 10).await.unwrap_err(),
        Error::InvalidInput(_)
    ));
}

#[tokio::test]
async fn test_list_enrollments_by_user() {
    let (_dir, pool) = setup().await;
    let repo = EnrollmentRepository::new(pool.clone());
    let a = create_course(&pool, "A", CourseStatus::Published).await;
    let b = create_course(&pool, "B", CourseStatus::Published).await;

    repo.enroll(enrollment("u1", &a.id)).await.unwrap();
    repo.enroll(enrollment("u1", &b.id)).await.unwrap();
    repo.enroll(enrollment("u2", &a.id)).await.unwrap();

    let page = repo
        .list_enrollments(
            &EnrollmentFilter {
                user_id: Some("u1".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|e| e.user_id == "u1"));
}

// ----------------------------------------------------------------------
// Quizzes
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_quiz_submission_graded_and_recorded() {
    let (_dir, pool) = setup().await;
    let repo = QuizRepository::new(pool.clone());
    let course = create_course(&pool, "Rust", CourseStatus::Published).await;

    let quiz = repo
        .create_quiz(
            &course.id,
            NewQuiz {
                title: "Checkpoint".to_string(),
                lesson_id: None,
                passing_score: 60,
                questions: vec![question("q1", 0), question("q2", 1), question("q3", 2)],
            },
        )
        .await
        .unwrap();

    let passed = repo
        .submit_quiz(
            &quiz.id,
            QuizSubmission {
                user_id: "u1".to_string(),
                user_name: "Ada".to_string(),
                answers: vec![0, 1, 0],
            },
        )
        .await
        .unwrap();
    assert_eq!(passed.score_percent, 67);
    assert_eq!(passed.status, QuizResultStatus::Passed);
    assert_eq!(passed.course_title, "Rust");
    assert_eq!(passed.quiz_title, "Checkpoint");

    let failed = repo
        .submit_quiz(
            &quiz.id,
            QuizSubmission {
                user_id: "u2".to_string(),
                user_name: "Grace".to_string(),
                answers: vec![2, 2, 1],
            },
        )
        .await
        .unwrap();
    assert_eq!(failed.score_percent, 0);
    assert_eq!(failed.status, QuizResultStatus::Failed);

    let wrong_length = repo
        .submit_quiz(
            &quiz.id,
            QuizSubmission {
                user_id: "u3".to_string(),
                user_name: "Linus".to_string(),
                answers: vec![0],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(wrong_length, Error::InvalidInput(_)));

    // Results survive deleting the quiz
    repo.delete_quiz(&quiz.id).await.unwrap();
    let results = repo
        .list_quiz_results(&QuizResultFilter {
            quiz_id: Some(quiz.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_quiz_lesson_must_belong_to_course() {
    let (_dir, pool) = setup().await;
    let courses = CourseRepository::new(pool.clone());
    let repo = QuizRepository::new(pool.clone());
    let rust = create_course(&pool, "Rust", CourseStatus::Published).await;
    let go = create_course(&pool, "Go", CourseStatus::Published).await;

    let module = courses
        .add_module(
            &go.id,
            NewModule {
                title: "Basics".to_string(),
                status: ModuleStatus::Published,
            },
        )
        .await
        .unwrap();
    let lesson = courses
        .add_lesson(
            &module.id,
            NewLesson {
                title: "Quiz".to_string(),
                lesson_type: LessonType::Quiz,
                duration_minutes: 5,
                video_url: None,
                content: None,
            },
        )
        .await
        .unwrap();

    let new_quiz = |lesson_id: Option<String>| NewQuiz {
        title: "Check".to_string(),
        lesson_id,
        passing_score: 50,
        questions: vec![question("q", 0)],
    };

    assert!(matches!(
        repo.create_quiz(&rust.id, new_quiz(Some(lesson.id.clone())))
            .await
            .unwrap_err(),
        Error::InvalidInput(_)
    ));
    let attached = repo
        .create_quiz(&go.id, new_quiz(Some(lesson.id.clone())))
        .await
        .unwrap();
    assert_eq!(attached.lesson_id.as_deref(), Some(lesson.id.as_str()));
    assert_eq!(repo.list_quizzes(&go.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_quiz_rejected() {
    let (_dir, pool) = setup().await;
    let repo = QuizRepository::new(pool.clone());
    let course = create_course(&pool, "Rust", CourseStatus::Published).await;

    let mut bad_answer = question("q", 0);
    bad_answer.correct_option = 3;
    for (passing_score, questions) in [
        (50, Vec::new()),
        (150, vec![question("q", 0)]),
        (50, vec![bad_answer]),
    ] {
        let err = repo
            .create_quiz(
                &course.id,
                NewQuiz {
                    title: "Bad".to_string(),
                    lesson_id: None,
                    passing_score,
                    questions,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

// ----------------------------------------------------------------------
// Certificates
// ----------------------------------------------------------------------

async fn completed_enrollment(pool: &SqlitePool, user: &str) -> String {
    let course = create_course(pool, "Rust", CourseStatus::Published).await;
    let repo = EnrollmentRepository::new(pool.clone());
    let e = repo.enroll(enrollment(user, &course.id)).await.unwrap();
    repo.update_progress(&e.id, 100).await.unwrap();
    e.id
}

fn template(fields: Vec<TemplateField>) -> NewTemplate {
    NewTemplate {
        name: "Classic".to_string(),
        page_width: 842.0,
        page_height: 595.0,
        fields,
    }
}

fn field(key: TemplateFieldKey, x: f64, y: f64) -> TemplateField {
    TemplateField {
        key,
        x,
        y,
        font_size: 18.0,
    }
}

#[tokio::test]
async fn test_issue_verify_revoke() {
    let (_dir, pool) = setup().await;
    let repo = CertificateRepository::new(pool.clone());
    let enrollment_id = completed_enrollment(&pool, "u1").await;

    let certificate = repo
        .issue_certificate(IssueCertificate {
            enrollment_id: enrollment_id.clone(),
            template_id: None,
        })
        .await
        .unwrap();
    assert_eq!(certificate.status, CertificateStatus::Issued);
    assert_eq!(certificate.verification_code.len(), 12);
    assert_eq!(certificate.course_title, "Rust");

    // Second issue for the same user and course conflicts
    assert!(matches!(
        repo.issue_certificate(IssueCertificate {
            enrollment_id: enrollment_id.clone(),
            template_id: None,
        })
        .await
        .unwrap_err(),
        Error::Conflict(_)
    ));

    let verification = repo
        .verify_certificate(&certificate.verification_code.to_ascii_lowercase())
        .await
        .unwrap();
    assert!(verification.valid);
    assert_eq!(verification.certificate.id, certificate.id);

    let revoked = repo.revoke_certificate(&certificate.id).await.unwrap();
    assert_eq!(revoked.status, CertificateStatus::Revoked);
    let again = repo.revoke_certificate(&certificate.id).await.unwrap();
    assert_eq!(again.revoked_at, revoked.revoked_at);

    assert!(!repo.verify_certificate(&certificate.verification_code).await.unwrap().valid);
    assert!(matches!(
        repo.verify_certificate("NOPE").await.unwrap_err(),
        Error::NotFound(_)
    ));

    // Revoked certificate no longer blocks a new one
    repo.issue_certificate(IssueCertificate {
        enrollment_id,
        template_id: None,
    })
    .await
    .unwrap();
    let issued = repo
        .list_certificates(&CertificateFilter {
            status: Some(CertificateStatus::Issued),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(issued.len(), 1);
}

#[tokio::test]
async fn test_one_issued_certificate_enforced_by_index() {
    let (_dir, pool) = setup().await;
    let repo = CertificateRepository::new(pool.clone());
    let enrollment_id = completed_enrollment(&pool, "u1").await;
    let certificate = repo
        .issue_certificate(IssueCertificate {
            enrollment_id,
            template_id: None,
        })
        .await
        .unwrap();

    let raw = sqlx::query(
        r#"
        INSERT INTO certificates (
            id, enrollment_id, user_id, user_name, course_id, course_title,
            template_id, status, verification_code, issued_at, revoked_at
        )
        SELECT 'dup', enrollment_id, user_id, user_name, course_id, course_title,
               NULL, 'issued', 'ZZZZZZZZZZZZ', 0, NULL
        FROM certificates WHERE id = ?
        "#,
    )
    .bind(&certificate.id)
    .execute(&pool)
    .await;
    assert!(raw.is_err());
}

#[tokio::test]
async fn test_certificate_requires_completed_enrollment() {
    let (_dir, pool) = setup().await;
    let course = create_course(&pool, "Rust", CourseStatus::Published).await;
    let e = EnrollmentRepository::new(pool.clone())
        .enroll(enrollment("u1", &course.id))
        .await
        .unwrap();

    let err = CertificateRepository::new(pool.clone())
        .issue_certificate(IssueCertificate {
            enrollment_id: e.id,
            template_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_render_with_template() {
    let (_dir, pool) = setup().await;
    let repo = CertificateRepository::new(pool.clone());
    let enrollment_id = completed_enrollment(&pool, "u1").await;

    let tpl = repo
        .create_template(template(vec![
            field(TemplateFieldKey::UserName, 421.0, 300.0),
            field(TemplateFieldKey::CourseTitle, 421.0, 250.0),
        ]))
        .await
        .unwrap();
    let certificate = repo
        .issue_certificate(IssueCertificate {
            enrollment_id,
            template_id: Some(tpl.id.clone()),
        })
        .await
        .unwrap();

    let rendered = repo.render_certificate(&certificate.id).await.unwrap();
    assert_eq!(rendered.fields.len(), 2);
    assert_eq!(rendered.fields[0].text, "User u1");
    assert_eq!(rendered.fields[1].text, "Rust");

    // Templates in use cannot be deleted
    assert!(matches!(
        repo.delete_template(&tpl.id).await.unwrap_err(),
        Error::Conflict(_)
    ));

    let updated = repo
        .update_template_fields(
            &tpl.id,
            vec![field(TemplateFieldKey::VerificationCode, 10.0, 10.0)],
        )
        .await
        .unwrap();
    assert_eq!(updated.fields.len(), 1);
    let rendered = repo.render_certificate(&certificate.id).await.unwrap();
    assert_eq!(rendered.fields[0].text, certificate.verification_code);
}

#[tokio::test]
async fn test_template_placement_validated() {
    let (_dir, pool) = setup().await;
    let repo = CertificateRepository::new(pool.clone());

    let off_page = repo
        .create_template(template(vec![field(TemplateFieldKey::UserName, 900.0, 10.0)]))
        .await
        .unwrap_err();
    assert!(matches!(off_page, Error::InvalidInput(_)));

    let twice = repo
        .create_template(template(vec![
            field(TemplateFieldKey::UserName, 10.0, 10.0),
            field(TemplateFieldKey::UserName, 20.0, 20.0),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(twice, Error::InvalidInput(_)));

    let unused = repo.create_template(template(Vec::new())).await.unwrap();
    repo.delete_template(&unused.id).await.unwrap();
    assert!(repo.list_templates().await.unwrap().is_empty());
}
