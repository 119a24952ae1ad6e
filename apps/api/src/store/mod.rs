//! Persistence seam. Components only talk to `dyn Store`; `PgStore` is the
//! production backend and `MemoryStore` backs the unit tests.
//!
//! Uniqueness constraints are enforced by the backend and surface as
//! `StoreError::UniqueViolation`, never as a read-then-write check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::bookmark::{Bookmark, BookmarkType, BookmarkWithResource, ResourceRef};
use crate::models::course::{Course, Lesson, LessonContext};
use crate::models::progress::{Certificate, Enrollment, LessonProgress, ProgressUpdate};
use crate::models::qa::{Answer, Question, QuestionStatus};
use crate::models::user::UserSummary;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("referenced row does not exist: {constraint}")]
    MissingReference { constraint: String },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // ── users ────────────────────────────────────────────────────────────────
    async fn user_summary(&self, user_id: Uuid) -> StoreResult<Option<UserSummary>>;

    // ── courses ──────────────────────────────────────────────────────────────
    async fn find_course(&self, course_id: Uuid) -> StoreResult<Option<Course>>;

    async fn lesson_context(&self, lesson_id: Uuid) -> StoreResult<Option<LessonContext>>;

    /// Every lesson of the course, ordered by module position then lesson position.
    async fn course_lessons(&self, course_id: Uuid) -> StoreResult<Vec<Lesson>>;

    async fn count_course_lessons(&self, course_id: Uuid) -> StoreResult<i64>;

    async fn count_completed_lessons(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<i64>;

    // ── enrollments ──────────────────────────────────────────────────────────
    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid)
        -> StoreResult<Option<Enrollment>>;

    async fn insert_enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Enrollment>;

    async fn list_enrollments(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>>;

    /// Sets `progress`. At 100 also marks the enrollment COMPLETED and stamps
    /// `completed_at` with `now` unless it is already set. Below 100 only
    /// `progress` changes; COMPLETED is never reverted.
    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Enrollment>>;

    // ── lesson progress ──────────────────────────────────────────────────────
    /// Single atomic insert-or-update keyed by (user, lesson).
    async fn upsert_lesson_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress>;

    async fn find_lesson_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> StoreResult<Option<LessonProgress>>;

    async fn course_lesson_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Vec<LessonProgress>>;

    // ── certificates ─────────────────────────────────────────────────────────
    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Certificate>>;

    async fn find_certificate_by_id(&self, certificate_id: Uuid)
        -> StoreResult<Option<Certificate>>;

    async fn insert_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        course_title: &str,
        issue_date: DateTime<Utc>,
    ) -> StoreResult<Certificate>;

    async fn list_certificates(&self, user_id: Uuid) -> StoreResult<Vec<Certificate>>;

    // ── bookmarks ────────────────────────────────────────────────────────────
    async fn insert_bookmark(&self, user_id: Uuid, resource: ResourceRef) -> StoreResult<Bookmark>;

    async fn find_bookmark(&self, bookmark_id: Uuid) -> StoreResult<Option<Bookmark>>;

    async fn delete_bookmark(&self, bookmark_id: Uuid) -> StoreResult<bool>;

    async fn delete_bookmark_by_resource(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> StoreResult<bool>;

    async fn bookmark_exists(&self, user_id: Uuid, resource: ResourceRef) -> StoreResult<bool>;

    async fn count_bookmarks(&self, resource: ResourceRef) -> StoreResult<i64>;

    /// Newest first, each joined with the summary of its resource.
    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        kind: Option<BookmarkType>,
    ) -> StoreResult<Vec<BookmarkWithResource>>;

    // ── questions ────────────────────────────────────────────────────────────
    async fn insert_question(
        &self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> StoreResult<Question>;

    async fn find_question(&self, question_id: Uuid) -> StoreResult<Option<Question>>;

    /// Newest first.
    async fn list_questions(&self, status: Option<QuestionStatus>) -> StoreResult<Vec<Question>>;

    async fn update_question(
        &self,
        question_id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Question>>;

    async fn delete_question(&self, question_id: Uuid) -> StoreResult<bool>;

    async fn increment_question_views(&self, question_id: Uuid) -> StoreResult<Option<Question>>;

    /// Moves the question to `to`. With `expected` set, only when the current
    /// status equals it. Returns whether a row changed.
    async fn update_question_status(
        &self,
        question_id: Uuid,
        expected: Option<QuestionStatus>,
        to: QuestionStatus,
    ) -> StoreResult<bool>;

    // ── answers ──────────────────────────────────────────────────────────────
    async fn insert_answer(
        &self,
        question_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StoreResult<Answer>;

    async fn find_answer(&self, answer_id: Uuid) -> StoreResult<Option<Answer>>;

    /// Accepted answer first, then oldest first.
    async fn list_answers(&self, question_id: Uuid) -> StoreResult<Vec<Answer>>;

    /// Sets the question OPEN if it has no answers left, in one statement.
    /// Returns whether a row changed.
    async fn reopen_if_unanswered(&self, question_id: Uuid) -> StoreResult<bool>;

    async fn delete_answer(&self, answer_id: Uuid) -> StoreResult<bool>;

    /// Clears `is_accepted` on every other answer of the same question and sets
    /// it on `answer_id`, as one unit.
    async fn accept_answer(&self, answer_id: Uuid) -> StoreResult<Option<Answer>>;
}
