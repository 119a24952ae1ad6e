//! Axum route handlers for enrollment, lesson progress and certificates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::{MaybePrincipal, Principal};
use crate::errors::AppError;
use crate::learning::access::{self, LessonAccess};
use crate::learning::certification;
use crate::learning::progress::{self, CourseProgressReport};
use crate::models::progress::{Certificate, Enrollment, LessonProgress, ProgressUpdate};
use crate::state::AppState;

/// GET /api/v1/lessons/:lesson_id/access
pub async fn handle_check_access(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<LessonAccess>, AppError> {
    let decision =
        access::check_lesson_access(state.store.as_ref(), lesson_id, principal.as_ref()).await?;
    Ok(Json(decision))
}

/// POST /api/v1/courses/:course_id/enroll
pub async fn handle_enroll(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    let enrollment = access::enroll(state.store.as_ref(), course_id, &principal).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// GET /api/v1/enrollments
pub async fn handle_list_enrollments(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Enrollment>>, AppError> {
    Ok(Json(
        access::list_enrollments(state.store.as_ref(), &principal).await?,
    ))
}

/// POST /api/v1/lessons/:lesson_id/progress
pub async fn handle_record_progress(
    State(state): State<AppState>,
    principal: Principal,
    Path(lesson_id): Path<Uuid>,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<LessonProgress>, AppError> {
    let progress =
        progress::record_progress(state.store.as_ref(), &principal, lesson_id, update).await?;
    Ok(Json(progress))
}

/// GET /api/v1/lessons/:lesson_id/progress
pub async fn handle_get_lesson_progress(
    State(state): State<AppState>,
    principal: Principal,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<Option<LessonProgress>>, AppError> {
    Ok(Json(
        progress::get_lesson_progress(state.store.as_ref(), &principal, lesson_id).await?,
    ))
}

/// POST /api/v1/lessons/:lesson_id/complete
pub async fn handle_mark_complete(
    State(state): State<AppState>,
    principal: Principal,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<LessonProgress>, AppError> {
    let progress =
        progress::mark_lesson_complete(state.store.as_ref(), &principal, lesson_id).await?;
    Ok(Json(progress))
}

/// GET /api/v1/courses/:course_id/progress
pub async fn handle_course_progress(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseProgressReport>, AppError> {
    Ok(Json(
        progress::get_course_progress(state.store.as_ref(), &principal, course_id).await?,
    ))
}

/// GET /api/v1/certificates
pub async fn handle_list_certificates(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Certificate>>, AppError> {
    Ok(Json(
        certification::list_certificates(state.store.as_ref(), &principal).await?,
    ))
}

/// GET /api/v1/certificates/:certificate_id
pub async fn handle_get_certificate(
    State(state): State<AppState>,
    principal: Principal,
    Path(certificate_id): Path<Uuid>,
) -> Result<Json<Certificate>, AppError> {
    Ok(Json(
        certification::get_certificate(state.store.as_ref(), &principal, certificate_id).await?,
    ))
}
