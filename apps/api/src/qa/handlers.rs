//! Axum route handlers for the Q&A API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::qa::{Answer, AnswerWithAuthor, Question, QuestionDetail, QuestionStatus};
use crate::qa::{answers, questions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionListQuery {
    pub status: Option<QuestionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnswerRequest {
    pub content: String,
}

/// POST /api/v1/questions
pub async fn handle_create_question(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<Question>), AppError> {
    let question =
        questions::create_question(state.store.as_ref(), &principal, &req.title, &req.content)
            .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/v1/questions
pub async fn handle_list_questions(
    State(state): State<AppState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(
        questions::list_questions(state.store.as_ref(), query.status).await?,
    ))
}

/// GET /api/v1/questions/:question_id
pub async fn handle_get_question(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
) -> Result<Json<QuestionDetail>, AppError> {
    Ok(Json(
        questions::get_question(state.store.as_ref(), question_id).await?,
    ))
}

/// PATCH /api/v1/questions/:question_id
pub async fn handle_update_question(
    State(state): State<AppState>,
    principal: Principal,
    Path(question_id): Path<Uuid>,
    Json(req): Json<UpdateQuestionRequest>,
) -> Result<Json<Question>, AppError> {
    let question = questions::update_question(
        state.store.as_ref(),
        &principal,
        question_id,
        req.title.as_deref(),
        req.content.as_deref(),
    )
    .await?;
    Ok(Json(question))
}

/// DELETE /api/v1/questions/:question_id
pub async fn handle_delete_question(
    State(state): State<AppState>,
    principal: Principal,
    Path(question_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    questions::delete_question(state.store.as_ref(), &principal, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/questions/:question_id/close
pub async fn handle_close_question(
    State(state): State<AppState>,
    principal: Principal,
    Path(question_id): Path<Uuid>,
) -> Result<Json<Question>, AppError> {
    Ok(Json(
        questions::close_question(state.store.as_ref(), &principal, question_id).await?,
    ))
}

/// POST /api/v1/questions/:question_id/answers
pub async fn handle_create_answer(
    State(state): State<AppState>,
    principal: Principal,
    Path(question_id): Path<Uuid>,
    Json(req): Json<CreateAnswerRequest>,
) -> Result<(StatusCode, Json<AnswerWithAuthor>), AppError> {
    let answer =
        answers::create_answer(state.store.as_ref(), &principal, question_id, &req.content)
            .await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

/// POST /api/v1/answers/:answer_id/accept
pub async fn handle_accept_answer(
    State(state): State<AppState>,
    principal: Principal,
    Path(answer_id): Path<Uuid>,
) -> Result<Json<Answer>, AppError> {
    Ok(Json(
        answers::accept_answer(state.store.as_ref(), &principal, answer_id).await?,
    ))
}

/// DELETE /api/v1/answers/:answer_id
pub async fn handle_delete_answer(
    State(state): State<AppState>,
    principal: Principal,
    Path(answer_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    answers::delete_answer(state.store.as_ref(), &principal, answer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
