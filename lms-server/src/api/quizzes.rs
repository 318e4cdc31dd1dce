//! Quiz and quiz result endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lms_common::db::{Quiz, QuizResult};
use lms_common::quizzes::{NewQuiz, QuizRepository, QuizResultFilter, QuizSubmission};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/courses/:id/quizzes
pub async fn list_quizzes(
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<String>,
) -> ApiResult<Json<Vec<Quiz>>> {
    let quizzes = QuizRepository::new(state.db.clone())
        .list_quizzes(&course_id)
        .await?;
    Ok(Json(quizzes))
}

/// POST /api/courses/:id/quizzes
pub async fn create_quiz(
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<String>,
    ApiJson(new): ApiJson<NewQuiz>,
) -> ApiResult<(StatusCode, Json<Quiz>)> {
    let quiz = QuizRepository::new(state.db.clone())
        .create_quiz(&course_id, new)
        .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// GET /api/quizzes/:id
pub async fn get_quiz(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Quiz>> {
    let quiz = QuizRepository::new(state.db.clone()).get_quiz(&id).await?;
    Ok(Json(quiz))
}

/// DELETE /api/quizzes/:id
pub async fn delete_quiz(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    QuizRepository::new(state.db.clone()).delete_quiz(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/quizzes/:id/submit
pub async fn submit_quiz(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(submission): ApiJson<QuizSubmission>,
) -> ApiResult<(StatusCode, Json<QuizResult>)> {
    let result = QuizRepository::new(state.db.clone())
        .submit_quiz(&id, submission)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/quiz-results?user_id=&course_id=&quiz_id=
pub async fn list_quiz_results(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<QuizResultFilter>,
) -> ApiResult<Json<Vec<QuizResult>>> {
    let results = QuizRepository::new(state.db.clone())
        .list_quiz_results(&filter)
        .await?;
    Ok(Json(results))
}
