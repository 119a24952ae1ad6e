use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::bookmark::{Bookmark, BookmarkType, BookmarkWithResource, ResourceRef};
use crate::store::{Store, StoreError};

pub async fn create_bookmark(
    store: &dyn Store,
    principal: &Principal,
    resource: ResourceRef,
) -> Result<Bookmark, AppError> {
    match store.insert_bookmark(principal.id, resource).await {
        Ok(bookmark) => {
            info!(
                "User {} bookmarked {:?} ({})",
                principal.id, resource, bookmark.id
            );
            Ok(bookmark)
        }
        Err(StoreError::UniqueViolation { .. }) => Err(AppError::Conflict(
            "resource is already bookmarked".to_string(),
        )),
        Err(StoreError::MissingReference { .. }) => Err(AppError::NotFound(format!(
            "Bookmarked resource {resource:?} not found"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Deletes by primary key. Only the bookmark's owner may delete it.
pub async fn delete_bookmark(
    store: &dyn Store,
    principal: &Principal,
    bookmark_id: Uuid,
) -> Result<(), AppError> {
    let bookmark = store
        .find_bookmark(bookmark_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bookmark {bookmark_id} not found")))?;
    if bookmark.user_id != principal.id {
        return Err(AppError::Forbidden(
            "bookmark belongs to another user".to_string(),
        ));
    }
    if !store.delete_bookmark(bookmark_id).await? {
        return Err(AppError::NotFound(format!("Bookmark {bookmark_id} not found")));
    }
    info!("User {} removed bookmark {bookmark_id}", principal.id);
    Ok(())
}

/// Deletes the principal's bookmark of `resource`.
pub async fn delete_bookmark_by_resource(
    store: &dyn Store,
    principal: &Principal,
    resource: ResourceRef,
) -> Result<(), AppError> {
    if !store
        .delete_bookmark_by_resource(principal.id, resource)
        .await?
    {
        return Err(AppError::NotFound(format!(
            "No bookmark for {resource:?}"
        )));
    }
    info!("User {} removed bookmark of {:?}", principal.id, resource);
    Ok(())
}

pub async fn is_bookmarked(
    store: &dyn Store,
    principal: &Principal,
    resource: ResourceRef,
) -> Result<bool, AppError> {
    Ok(store.bookmark_exists(principal.id, resource).await?)
}

/// Number of users who bookmarked `resource`.
pub async fn count_for_resource(store: &dyn Store, resource: ResourceRef) -> Result<i64, AppError> {
    Ok(store.count_bookmarks(resource).await?)
}

pub async fn list_bookmarks(
    store: &dyn Store,
    principal: &Principal,
    kind: Option<BookmarkType>,
) -> Result<Vec<BookmarkWithResource>, AppError> {
    Ok(store.list_bookmarks(principal.id, kind).await?)
}
