//! Database models
//!
//! Courses own an ordered list of modules; modules own lessons. Several
//! fields are denormalized copies of data held elsewhere:
//! - `Course::modules_list` mirrors the module rows of the course, by position
//! - `Module::lesson_count` mirrors the lesson rows of the module
//! - `Category::course_count` mirrors the courses whose `category_ids` contain it
//! - `course_title` / `user_name` on enrollments, certificates and quiz results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Declares a snake_case text-backed enum with `as_str`, `Display` and `FromStr`
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Publication state of a course
    CourseStatus { Draft => "draft", Published => "published" }
);

text_enum!(CourseLevel {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

text_enum!(ModuleStatus { Draft => "draft", Published => "published" });

text_enum!(LessonType {
    Video => "video",
    Text => "text",
    Quiz => "quiz",
    Document => "document",
});

text_enum!(EnrollmentStatus {
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(CertificateStatus { Issued => "issued", Revoked => "revoked" });

text_enum!(QuizResultStatus { Passed => "passed", Failed => "failed" });

text_enum!(
    /// Value a certificate template field is filled with
    TemplateFieldKey {
        UserName => "user_name",
        CourseTitle => "course_title",
        IssuedDate => "issued_date",
        VerificationCode => "verification_code",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub course_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: CourseStatus,
    pub level: CourseLevel,
    pub price_cents: i64,
    /// Module ids in display order
    pub modules_list: Vec<String>,
    pub category_ids: Vec<String>,
    /// Single-category reference from before `category_ids` existed
    pub legacy_category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub position: i64,
    pub status: ModuleStatus,
    pub lesson_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub module_id: String,
    pub course_id: String,
    pub title: String,
    pub lesson_type: LessonType,
    pub duration_minutes: i64,
    pub position: i64,
    pub video_url: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_option: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub course_id: String,
    pub lesson_id: Option<String>,
    pub title: String,
    /// Minimum score percentage (0-100) to pass
    pub passing_score: i64,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub user_id: String,
    pub user_name: String,
    pub course_id: String,
    pub course_title: String,
    pub score_percent: i64,
    pub status: QuizResultStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub course_id: String,
    pub course_title: String,
    pub status: EnrollmentStatus,
    pub progress_percent: i64,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Placement of one value on a certificate page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    pub key: TemplateFieldKey,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateTemplate {
    pub id: String,
    pub name: String,
    pub page_width: f64,
    pub page_height: f64,
    pub fields: Vec<TemplateField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub enrollment_id: String,
    pub user_id: String,
    pub user_name: String,
    pub course_id: String,
    pub course_title: String,
    pub template_id: Option<String>,
    pub status: CertificateStatus,
    pub verification_code: String,
    pub issued_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}
