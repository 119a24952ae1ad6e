use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "bookmark_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookmarkType {
    Article,
    Book,
    Course,
}

/// The single resource a bookmark points at.
///
/// Storage keeps three nullable columns; this type is the only way to build
/// them, so "exactly one set" holds before anything reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Article(Uuid),
    Book(Uuid),
    Course(Uuid),
}

impl ResourceRef {
    /// Builds a reference from the wire shape: a declared type plus three optional ids.
    pub fn from_parts(
        kind: BookmarkType,
        article_id: Option<Uuid>,
        book_id: Option<Uuid>,
        course_id: Option<Uuid>,
    ) -> Result<Self, AppError> {
        let resource = match (article_id, book_id, course_id) {
            (Some(id), None, None) => ResourceRef::Article(id),
            (None, Some(id), None) => ResourceRef::Book(id),
            (None, None, Some(id)) => ResourceRef::Course(id),
            (None, None, None) => {
                return Err(AppError::Validation(
                    "one of article_id, book_id or course_id is required".to_string(),
                ))
            }
            _ => {
                return Err(AppError::Validation(
                    "only one of article_id, book_id or course_id may be set".to_string(),
                ))
            }
        };

        if resource.kind() != kind {
            return Err(AppError::Validation(format!(
                "bookmark type {kind:?} does not match the supplied resource id"
            )));
        }
        Ok(resource)
    }

    pub fn kind(&self) -> BookmarkType {
        match self {
            ResourceRef::Article(_) => BookmarkType::Article,
            ResourceRef::Book(_) => BookmarkType::Book,
            ResourceRef::Course(_) => BookmarkType::Course,
        }
    }

    pub fn article_id(&self) -> Option<Uuid> {
        match self {
            ResourceRef::Article(id) => Some(*id),
            _ => None,
        }
    }

    pub fn book_id(&self) -> Option<Uuid> {
        match self {
            ResourceRef::Book(id) => Some(*id),
            _ => None,
        }
    }

    pub fn course_id(&self) -> Option<Uuid> {
        match self {
            ResourceRef::Course(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: BookmarkType,
    pub article_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    #[allow(dead_code)]
    pub fn resource(&self) -> Option<ResourceRef> {
        ResourceRef::from_parts(self.kind, self.article_id, self.book_id, self.course_id).ok()
    }
}

/// Title and slug of whatever a bookmark points at.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ResourceSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookmarkWithResource {
    #[serde(flatten)]
    pub bookmark: Bookmark,
    /// Absent if the underlying resource was removed between queries.
    pub resource: Option<ResourceSummary>,
}
