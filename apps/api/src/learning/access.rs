use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::progress::Enrollment;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    Free,
    Enrolled,
    NotAuthenticated,
    NotEnrolled,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LessonAccess {
    pub has_access: bool,
    pub reason: AccessReason,
}

impl LessonAccess {
    fn granted(reason: AccessReason) -> Self {
        Self {
            has_access: true,
            reason,
        }
    }

    fn denied(reason: AccessReason) -> Self {
        Self {
            has_access: false,
            reason,
        }
    }
}

/// Decides whether `principal` may view a lesson.
///
/// Free content (lesson or whole course) is checked first so it stays
/// reachable without a token.
pub async fn check_lesson_access(
    store: &dyn Store,
    lesson_id: Uuid,
    principal: Option<&Principal>,
) -> Result<LessonAccess, AppError> {
    let lesson = store
        .lesson_context(lesson_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lesson {lesson_id} not found")))?;

    if lesson.is_free() {
        return Ok(LessonAccess::granted(AccessReason::Free));
    }

    let Some(principal) = principal else {
        return Ok(LessonAccess::denied(AccessReason::NotAuthenticated));
    };

    let enrollment = store
        .find_enrollment(principal.id, lesson.course_id)
        .await?;
    Ok(match enrollment {
        Some(_) => LessonAccess::granted(AccessReason::Enrolled),
        None => LessonAccess::denied(AccessReason::NotEnrolled),
    })
}

/// Enrolls `principal` in a course. A second enrollment is a conflict.
pub async fn enroll(
    store: &dyn Store,
    course_id: Uuid,
    principal: &Principal,
) -> Result<Enrollment, AppError> {
    if store.find_course(course_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Course {course_id} not found")));
    }

    match store.insert_enrollment(principal.id, course_id).await {
        Ok(enrollment) => {
            info!("User {} enrolled in course {course_id}", principal.id);
            Ok(enrollment)
        }
        Err(StoreError::UniqueViolation { .. }) => Err(AppError::Conflict(format!(
            "Already enrolled in course {course_id}"
        ))),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_enrollments(
    store: &dyn Store,
    principal: &Principal,
) -> Result<Vec<Enrollment>, AppError> {
    Ok(store.list_enrollments(principal.id).await?)
}
