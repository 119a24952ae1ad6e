//! Axum route handlers for the Bookmark API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;
use crate::bookmarks::manager;
use crate::errors::AppError;
use crate::models::bookmark::{Bookmark, BookmarkType, BookmarkWithResource, ResourceRef};
use crate::state::AppState;

/// Wire shape of a resource reference, used as JSON body and as query string.
#[derive(Debug, Deserialize)]
pub struct ResourceParams {
    #[serde(rename = "type")]
    pub kind: Option<BookmarkType>,
    pub article_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
}

impl ResourceParams {
    fn resource(&self) -> Result<ResourceRef, AppError> {
        let kind = self
            .kind
            .ok_or_else(|| AppError::Validation("type is required".to_string()))?;
        ResourceRef::from_parts(kind, self.article_id, self.book_id, self.course_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<BookmarkType>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkedResponse {
    pub bookmarked: bool,
}

#[derive(Debug, Serialize)]
pub struct BookmarkCountResponse {
    pub count: i64,
}

/// POST /api/v1/bookmarks
pub async fn handle_create(
    State(state): State<AppState>,
    principal: Principal,
    Json(params): Json<ResourceParams>,
) -> Result<(StatusCode, Json<Bookmark>), AppError> {
    let resource = params.resource()?;
    let bookmark = manager::create_bookmark(state.store.as_ref(), &principal, resource).await?;
    Ok((StatusCode::CREATED, Json(bookmark)))
}

/// GET /api/v1/bookmarks
pub async fn handle_list(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BookmarkWithResource>>, AppError> {
    Ok(Json(
        manager::list_bookmarks(state.store.as_ref(), &principal, query.kind).await?,
    ))
}

/// DELETE /api/v1/bookmarks?type=...&article_id=...
pub async fn handle_delete_by_resource(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ResourceParams>,
) -> Result<StatusCode, AppError> {
    let resource = params.resource()?;
    manager::delete_bookmark_by_resource(state.store.as_ref(), &principal, resource).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/bookmarks/:bookmark_id
pub async fn handle_delete(
    State(state): State<AppState>,
    principal: Principal,
    Path(bookmark_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    manager::delete_bookmark(state.store.as_ref(), &principal, bookmark_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/bookmarks/check
pub async fn handle_check(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ResourceParams>,
) -> Result<Json<BookmarkedResponse>, AppError> {
    let resource = params.resource()?;
    let bookmarked = manager::is_bookmarked(state.store.as_ref(), &principal, resource).await?;
    Ok(Json(BookmarkedResponse { bookmarked }))
}

/// GET /api/v1/bookmarks/count
pub async fn handle_count(
    State(state): State<AppState>,
    Query(params): Query<ResourceParams>,
) -> Result<Json<BookmarkCountResponse>, AppError> {
    let resource = params.resource()?;
    let count = manager::count_for_resource(state.store.as_ref(), resource).await?;
    Ok(Json(BookmarkCountResponse { count }))
}
