use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::learning::certification::{completion_percentage, recompute_course_progress};
use crate::models::course::LessonContext;
use crate::models::progress::{LessonProgress, ProgressUpdate};
use crate::store::Store;

/// Per-lesson line of a course progress report.
#[derive(Debug, Clone, Serialize)]
pub struct LessonStatus {
    pub lesson_id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub is_completed: bool,
    pub watched_duration: i32,
    pub last_position: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseProgressReport {
    pub course_id: Uuid,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub percentage: i32,
    pub lessons: Vec<LessonStatus>,
}

/// Loads the lesson and requires the principal to be enrolled in its course.
async fn enrolled_lesson(
    store: &dyn Store,
    principal: &Principal,
    lesson_id: Uuid,
) -> Result<LessonContext, AppError> {
    let lesson = store
        .lesson_context(lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {lesson_id} not found")))?;

    if store
        .find_enrollment(principal.id, lesson.course_id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden(
            "not enrolled in this course".to_string(),
        ));
    }
    Ok(lesson)
}

fn validate_update(update: &ProgressUpdate) -> Result<(), AppError> {
    if update.watched_duration.is_some_and(|d| d < 0) {
        return Err(AppError::Validation(
            "watched_duration cannot be negative".to_string(),
        ));
    }
    if update.last_position.is_some_and(|p| p < 0) {
        return Err(AppError::Validation(
            "last_position cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Records a progress report for one lesson.
///
/// Supplied fields overwrite the stored ones (last write wins). When the
/// stored row ends up completed, the course aggregate is recomputed before
/// returning; if that step fails the progress row is kept and the caller gets
/// `ProgressAggregation`, after which resubmitting is safe.
///
/// Un-completing a lesson does not recompute, so enrollment progress and a
/// COMPLETED status never move backwards.
pub async fn record_progress(
    store: &dyn Store,
    principal: &Principal,
    lesson_id: Uuid,
    update: ProgressUpdate,
) -> Result<LessonProgress, AppError> {
    validate_update(&update)?;
    let lesson = enrolled_lesson(store, principal, lesson_id).await?;

    let progress = store
        .upsert_lesson_progress(principal.id, lesson_id, &update, Utc::now())
        .await?;

    info!(
        "Recorded progress for user {} on lesson {lesson_id} (completed: {})",
        principal.id, progress.is_completed
    );

    if progress.is_completed {
        recompute_course_progress(store, principal.id, lesson.course_id)
            .await
            .map_err(|e| AppError::ProgressAggregation(e.to_string()))?;
    }

    Ok(progress)
}

/// Marks a lesson completed, counting its full duration as watched.
pub async fn mark_lesson_complete(
    store: &dyn Store,
    principal: &Principal,
    lesson_id: Uuid,
) -> Result<LessonProgress, AppError> {
    let lesson = store
        .lesson_context(lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {lesson_id} not found")))?;

    record_progress(
        store,
        principal,
        lesson_id,
        ProgressUpdate {
            watched_duration: Some(lesson.duration.unwrap_or(0)),
            last_position: None,
            is_completed: Some(true),
        },
    )
    .await
}

/// `None` when nothing has been recorded yet.
pub async fn get_lesson_progress(
    store: &dyn Store,
    principal: &Principal,
    lesson_id: Uuid,
) -> Result<Option<LessonProgress>, AppError> {
    Ok(store.find_lesson_progress(principal.id, lesson_id).await?)
}

pub async fn get_course_progress(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
) -> Result<CourseProgressReport, AppError> {
    if store.find_course(course_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Course {course_id} not found")));
    }
    if store
        .find_enrollment(principal.id, course_id)
        .await?
        .is_none()
    {
        return Err(AppError::Forbidden(
            "not enrolled in this course".to_string(),
        ));
    }

    let lessons = store.course_lessons(course_id).await?;
    let recorded = store.course_lesson_progress(principal.id, course_id).await?;

    let lessons: Vec<LessonStatus> = lessons
        .into_iter()
        .map(|lesson| {
            let progress = recorded.iter().find(|p| p.lesson_id == lesson.id);
            LessonStatus {
                lesson_id: lesson.id,
                module_id: lesson.module_id,
                title: lesson.title,
                is_completed: progress.is_some_and(|p| p.is_completed),
                watched_duration: progress.map_or(0, |p| p.watched_duration),
                last_position: progress.map_or(0, |p| p.last_position),
                completed_at: progress.and_then(|p| p.completed_at),
            }
        })
        .collect();

    let total_lessons = lessons.len() as i64;
    let completed_lessons = lessons.iter().filter(|l| l.is_completed).count() as i64;

    Ok(CourseProgressReport {
        course_id,
        total_lessons,
        completed_lessons,
        percentage: completion_percentage(completed_lessons, total_lessons),
        lessons,
    })
}
