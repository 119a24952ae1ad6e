use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::progress::{Certificate, Enrollment};
use crate::store::{Store, StoreError};

/// Result of one course recomputation.
#[derive(Debug, Clone, Serialize)]
pub struct CourseCompletion {
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub percentage: i32,
    pub enrollment: Enrollment,
    pub certificate: Option<Certificate>,
}

/// `round(completed / total * 100)`, half-up, in integer arithmetic.
/// A course without lessons is 0% complete.
pub fn completion_percentage(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total);
    ((completed * 200 + total) / (total * 2)) as i32
}

/// Recounts the user's completed lessons for a course, stores the percentage
/// on the enrollment and issues the certificate once it reaches 100.
pub async fn recompute_course_progress(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<CourseCompletion, AppError> {
    let total_lessons = store.count_course_lessons(course_id).await?;
    let completed_lessons = store.count_completed_lessons(user_id, course_id).await?;
    let percentage = completion_percentage(completed_lessons, total_lessons);

    let enrollment = store
        .update_enrollment_progress(user_id, course_id, percentage, Utc::now())
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No enrollment for user {user_id} in course {course_id}"
            ))
        })?;

    info!(
        "Course {course_id} progress for user {user_id}: {completed_lessons}/{total_lessons} ({percentage}%)"
    );

    let certificate = if percentage == 100 {
        Some(issue_certificate_if_absent(store, user_id, course_id).await?)
    } else {
        None
    };

    Ok(CourseCompletion {
        total_lessons,
        completed_lessons,
        percentage,
        enrollment,
        certificate,
    })
}

/// Returns the user's certificate for the course, creating it on first call.
///
/// The store's (user, course) uniqueness constraint is the real guard: losing
/// an insert race returns the row the other request created.
pub async fn issue_certificate_if_absent(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Certificate, AppError> {
    if let Some(existing) = store.find_certificate(user_id, course_id).await? {
        return Ok(existing);
    }

    let course = store
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {course_id} not found")))?;

    match store
        .insert_certificate(user_id, course_id, &course.title, Utc::now())
        .await
    {
        Ok(certificate) => {
            info!(
                "Issued certificate {} to user {user_id} for course {course_id}",
                certificate.id
            );
            Ok(certificate)
        }
        Err(StoreError::UniqueViolation { .. }) => {
            warn!("Certificate for user {user_id} / course {course_id} issued concurrently");
            store
                .find_certificate(user_id, course_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "certificate vanished after unique violation"
                    ))
                })
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn list_certificates(
    store: &dyn Store,
    principal: &Principal,
) -> Result<Vec<Certificate>, AppError> {
    Ok(store.list_certificates(principal.id).await?)
}

pub async fn get_certificate(
    store: &dyn Store,
    principal: &Principal,
    certificate_id: Uuid,
) -> Result<Certificate, AppError> {
    let certificate = store
        .find_certificate_by_id(certificate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Certificate {certificate_id} not found")))?;
    if !principal.can_manage(certificate.user_id) {
        return Err(AppError::Forbidden(
            "certificate belongs to another user".to_string(),
        ));
    }
    Ok(certificate)
}
