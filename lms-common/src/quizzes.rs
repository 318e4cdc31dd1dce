//! Quizzes and quiz results

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::courses::fetch_course;
use crate::db::rows::{quiz_from_row, quiz_result_from_row, QUIZ_COLUMNS, QUIZ_RESULT_COLUMNS};
use crate::db::{Quiz, QuizQuestion, QuizResult, QuizResultStatus};
use crate::enrollments::required;
use crate::time::now_millis;
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuiz {
    pub title: String,
    pub lesson_id: Option<String>,
    pub passing_score: i64,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmission {
    pub user_id: String,
    pub user_name: String,
    /// Chosen option index per question, in question order
    pub answers: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizResultFilter {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub quiz_id: Option<String>,
}

pub struct QuizRepository {
    pool: SqlitePool,
}

impl QuizRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_quiz(&self, course_id: &str, new: NewQuiz) -> Result<Quiz> {
        let title = required("quiz title", &new.title)?;
        validate_quiz(new.passing_score, &new.questions)?;

        let mut tx = self.pool.begin().await?;
        fetch_course(&mut tx, course_id).await?;

        if let Some(lesson_id) = &new.lesson_id {
            let lesson_course: Option<String> =
                sqlx::query_scalar("SELECT course_id FROM lessons WHERE id = ?")
                    .bind(lesson_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match lesson_course {
                Some(owner) if owner == course_id => {}
                Some(_) => {
                    return Err(Error::InvalidInput(format!(
                        "lesson {} belongs to another course",
                        lesson_id
                    )))
                }
                None => return Err(Error::not_found("lesson", lesson_id)),
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, course_id, lesson_id, title, passing_score, questions, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(course_id)
        .bind(&new.lesson_id)
        .bind(&title)
        .bind(new.passing_score)
        .bind(serde_json::to_string(&new.questions)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let quiz = fetch_quiz(&mut tx, &id).await?;
        tx.commit().await?;

        info!("Created quiz {} with {} questions", quiz.id, quiz.questions.len());
        Ok(quiz)
    }

    pub async fn get_quiz(&self, id: &str) -> Result<Quiz> {
        let mut conn = self.pool.acquire().await?;
        fetch_quiz(&mut conn, id).await
    }

    pub async fn list_quizzes(&self, course_id: &str) -> Result<Vec<Quiz>> {
        let mut conn = self.pool.acquire().await?;
        fetch_course(&mut conn, course_id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM quizzes WHERE course_id = ? ORDER BY created_at, id",
            QUIZ_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(quiz_from_row).collect()
    }

    /// Delete a quiz; its submitted results are kept
    pub async fn delete_quiz(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("quiz", id));
        }
        Ok(())
    }

    /// Grade a submission and store the result
    pub async fn submit_quiz(&self, quiz_id: &str, submission: QuizSubmission) -> Result<QuizResult> {
        let user_id = required("user_id", &submission.user_id)?;
        let user_name = required("user_name", &submission.user_name)?;

        let mut tx = self.pool.begin().await?;
        let quiz = fetch_quiz(&mut tx, quiz_id).await?;
        let course = fetch_course(&mut tx, &quiz.course_id).await?;

        let score = grade(&quiz.questions, &submission.answers)?;
        let status = if score >= quiz.passing_score {
            QuizResultStatus::Passed
        } else {
            QuizResultStatus::Failed
        };

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO quiz_results (
                id, quiz_id, quiz_title, user_id, user_name, course_id, course_title,
                score_percent, status, submitted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&quiz.id)
        .bind(&quiz.title)
        .bind(&user_id)
        .bind(&user_name)
        .bind(&course.id)
        .bind(&course.title)
        .bind(score)
        .bind(status.as_str())
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM quiz_results WHERE id = ?",
            QUIZ_RESULT_COLUMNS
        ))
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
        let result = quiz_result_from_row(&row)?;
        tx.commit().await?;

        info!(
            "User {} scored {}% on quiz {} ({})",
            user_id, score, quiz.id, status
        );
        Ok(result)
    }

    /// Results matching `filter`, most recent first
    pub async fn list_quiz_results(&self, filter: &QuizResultFilter) -> Result<Vec<QuizResult>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM quiz_results WHERE 1 = 1",
            QUIZ_RESULT_COLUMNS
        ));
        if let Some(user_id) = &filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(course_id) = &filter.course_id {
            query.push(" AND course_id = ").push_bind(course_id.clone());
        }
        if let Some(quiz_id) = &filter.quiz_id {
            query.push(" AND quiz_id = ").push_bind(quiz_id.clone());
        }
        query.push(" ORDER BY submitted_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(quiz_result_from_row).collect()
    }
}

async fn fetch_quiz(conn: &mut SqliteConnection, id: &str) -> Result<Quiz> {
    let row = sqlx::query(&format!("SELECT {} FROM quizzes WHERE id = ?", QUIZ_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("quiz", id))?;
    quiz_from_row(&row)
}

fn validate_quiz(passing_score: i64, questions: &[QuizQuestion]) -> Result<()> {
    if !(0..=100).contains(&passing_score) {
        return Err(Error::InvalidInput(format!(
            "passing score must be between 0 and 100, got {}",
            passing_score
        )));
    }
    if questions.is_empty() {
        return Err(Error::InvalidInput("quiz needs at least one question".to_string()));
    }
    for (index, question) in questions.iter().enumerate() {
        if question.prompt.trim().is_empty() {
            return Err(Error::InvalidInput(format!("question {} has no prompt", index + 1)));
        }
        if question.options.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "question {} needs at least two options",
                index + 1
            )));
        }
        if question.correct_option >= question.options.len() {
            return Err(Error::InvalidInput(format!(
                "question {} marks option {} correct but has {} options",
                index + 1,
                question.correct_option,
                question.options.len()
            )));
        }
    }
    Ok(())
}

/// Percentage of correct answers, rounded half up
pub fn grade(questions: &[QuizQuestion], answers: &[usize]) -> Result<i64> {
    if answers.len() != questions.len() {
        return Err(Error::InvalidInput(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }
    if questions.is_empty() {
        return Ok(0);
    }

    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.correct_option == **answer)
        .count() as i64;
    let total = questions.len() as i64;
    Ok((correct * 100 + total / 2) / total)
}
