use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::qa::{Answer, AnswerWithAuthor, QuestionStatus};
use crate::qa::questions::load_question;
use crate::store::Store;

/// Attaches the author summary to each answer.
pub(crate) async fn with_authors(
    store: &dyn Store,
    answers: Vec<Answer>,
) -> Result<Vec<AnswerWithAuthor>, AppError> {
    let mut resolved = Vec::with_capacity(answers.len());
    for answer in answers {
        let author = store.user_summary(answer.user_id).await?;
        resolved.push(AnswerWithAuthor { answer, author });
    }
    Ok(resolved)
}

async fn load_answer(store: &dyn Store, answer_id: Uuid) -> Result<Answer, AppError> {
    store
        .find_answer(answer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Answer {answer_id} not found")))
}

/// Posts an answer. An OPEN question becomes ANSWERED.
pub async fn create_answer(
    store: &dyn Store,
    principal: &Principal,
    question_id: Uuid,
    content: &str,
) -> Result<AnswerWithAuthor, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }
    load_question(store, question_id).await?;

    let answer = store
        .insert_answer(question_id, principal.id, content)
        .await?;
    if store
        .update_question_status(
            question_id,
            Some(QuestionStatus::Open),
            QuestionStatus::Answered,
        )
        .await?
    {
        info!("Question {question_id} is now ANSWERED");
    }

    let author = store.user_summary(principal.id).await?;
    Ok(AnswerWithAuthor { answer, author })
}

/// Accepts an answer on behalf of the question's author. Any previously
/// accepted answer on the same question is unaccepted in the same step.
pub async fn accept_answer(
    store: &dyn Store,
    principal: &Principal,
    answer_id: Uuid,
) -> Result<Answer, AppError> {
    let answer = load_answer(store, answer_id).await?;
    let question = load_question(store, answer.question_id).await?;
    if principal.id != question.user_id {
        return Err(AppError::Forbidden(
            "only the question author may accept an answer".to_string(),
        ));
    }

    let accepted = store
        .accept_answer(answer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Answer {answer_id} not found")))?;
    info!("Answer {answer_id} accepted on question {}", question.id);
    Ok(accepted)
}

/// Deletes an answer (its author or an admin). Removing the last answer
/// reopens the question whatever its prior status, CLOSED included.
pub async fn delete_answer(
    store: &dyn Store,
    principal: &Principal,
    answer_id: Uuid,
) -> Result<(), AppError> {
    let answer = load_answer(store, answer_id).await?;
    if !principal.can_manage(answer.user_id) {
        return Err(AppError::Forbidden(
            "only the answer author or an admin may delete it".to_string(),
        ));
    }

    if !store.delete_answer(answer_id).await? {
        return Err(AppError::NotFound(format!("Answer {answer_id} not found")));
    }
    info!("Answer {answer_id} deleted by {}", principal.id);

    if store.reopen_if_unanswered(answer.question_id).await? {
        info!("Question {} has no answers left, reopened", answer.question_id);
    }
    Ok(())
}
