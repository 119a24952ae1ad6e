use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "course_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub is_free: bool,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub position: i32,
    /// Minutes; unknown for some imported lessons.
    pub duration: Option<i32>,
    pub is_free: bool,
}

/// A lesson joined with the ids and flags of its owning module and course.
#[derive(Debug, Clone, FromRow)]
pub struct LessonContext {
    pub lesson_id: Uuid,
    pub module_id: Uuid,
    pub course_id: Uuid,
    pub duration: Option<i32>,
    pub lesson_is_free: bool,
    pub course_is_free: bool,
}

impl LessonContext {
    pub fn is_free(&self) -> bool {
        self.lesson_is_free || self.course_is_free
    }
}
