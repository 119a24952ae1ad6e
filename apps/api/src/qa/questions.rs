use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::qa::{Question, QuestionDetail, QuestionStatus};
use crate::qa::answers::with_authors;
use crate::store::Store;

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub(crate) async fn load_question(store: &dyn Store, question_id: Uuid) -> Result<Question, AppError> {
    store
        .find_question(question_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question {question_id} not found")))
}

fn require_manager(principal: &Principal, question: &Question) -> Result<(), AppError> {
    if !principal.can_manage(question.user_id) {
        return Err(AppError::Forbidden(
            "only the question author or an admin may do this".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_question(
    store: &dyn Store,
    principal: &Principal,
    title: &str,
    content: &str,
) -> Result<Question, AppError> {
    require_text("title", title)?;
    require_text("content", content)?;
    let question = store
        .insert_question(principal.id, title.trim(), content)
        .await?;
    info!("User {} asked question {}", principal.id, question.id);
    Ok(question)
}

pub async fn list_questions(
    store: &dyn Store,
    status: Option<QuestionStatus>,
) -> Result<Vec<Question>, AppError> {
    Ok(store.list_questions(status).await?)
}

/// Counts a view and returns the question with its answers.
pub async fn get_question(store: &dyn Store, question_id: Uuid) -> Result<QuestionDetail, AppError> {
    let question = store
        .increment_question_views(question_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question {question_id} not found")))?;
    let author = store.user_summary(question.user_id).await?;
    let answers = with_authors(store, store.list_answers(question_id).await?).await?;
    Ok(QuestionDetail {
        question,
        author,
        answers,
    })
}

pub async fn update_question(
    store: &dyn Store,
    principal: &Principal,
    question_id: Uuid,
    title: Option<&str>,
    content: Option<&str>,
) -> Result<Question, AppError> {
    if let Some(title) = title {
        require_text("title", title)?;
    }
    if let Some(content) = content {
        require_text("content", content)?;
    }
    let question = load_question(store, question_id).await?;
    require_manager(principal, &question)?;

    store
        .update_question(question_id, title.map(str::trim), content, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question {question_id} not found")))
}

pub async fn delete_question(
    store: &dyn Store,
    principal: &Principal,
    question_id: Uuid,
) -> Result<(), AppError> {
    let question = load_question(store, question_id).await?;
    require_manager(principal, &question)?;
    if !store.delete_question(question_id).await? {
        return Err(AppError::NotFound(format!("Question {question_id} not found")));
    }
    info!("User {} deleted question {question_id}", principal.id);
    Ok(())
}

pub async fn close_question(
    store: &dyn Store,
    principal: &Principal,
    question_id: Uuid,
) -> Result<Question, AppError> {
    let question = load_question(store, question_id).await?;
    require_manager(principal, &question)?;
    store
        .update_question_status(question_id, None, QuestionStatus::Closed)
        .await?;
    info!("Question {question_id} closed by {}", principal.id);
    load_question(store, question_id).await
}
