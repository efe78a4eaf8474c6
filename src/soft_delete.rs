//! Soft-delete lifecycle shared by every soft-deletable entity.
//!
//! A record moves between `Active` and `SoftDeleted` through [`soft_delete`]
//! and [`restore`]; leaving `SoftDeleted` for good is the pruning engine's
//! job. Each transition stamps `updatedAt`, which is the age the retention
//! windows are measured from.

use crate::error::ApiError;
use crate::store::{Collection, DocumentStore};
use bson::oid::ObjectId;
use bson::{doc, Document};

/// Collections that carry a `deleted` flag.
pub const SOFT_DELETABLE: [Collection; 5] = [
    Collection::Users,
    Collection::Categories,
    Collection::Tags,
    Collection::Titles,
    Collection::Products,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Active,
    SoftDeleted,
}

impl LifecycleState {
    /// Records without a `deleted` field are active.
    pub(crate) fn of(document: &Document) -> Self {
        if document.get_bool("deleted").unwrap_or(false) {
            LifecycleState::SoftDeleted
        } else {
            LifecycleState::Active
        }
    }
}

pub fn is_soft_deletable(collection: Collection) -> bool {
    SOFT_DELETABLE.contains(&collection)
}

/// Set the deleted flag and return the updated record, `None` if it is gone.
pub async fn set_deleted(
    store: &dyn DocumentStore,
    collection: Collection,
    id: ObjectId,
    deleted: bool,
) -> Result<Option<Document>, ApiError> {
    if !is_soft_deletable(collection) {
        return Err(ApiError::validation(format!(
            "{} records cannot be soft-deleted",
            collection
        )));
    }
    let updated = store
        .update_by_id(
            collection,
            id,
            doc! { "deleted": deleted, "updatedAt": bson::DateTime::now() },
        )
        .await?;
    if let Some(document) = &updated {
        log::debug!("{} {} is now {:?}", collection, id, LifecycleState::of(document));
    }
    Ok(updated)
}

/// Active -> SoftDeleted. Soft-deleting twice refreshes `updatedAt`.
pub async fn soft_delete(
    store: &dyn DocumentStore,
    collection: Collection,
    id: ObjectId,
) -> Result<Document, ApiError> {
    set_deleted(store, collection, id, true)
        .await?
        .ok_or_else(|| ApiError::not_found(entity_name(collection)))
}

/// SoftDeleted -> Active.
pub async fn restore(
    store: &dyn DocumentStore,
    collection: Collection,
    id: ObjectId,
) -> Result<Document, ApiError> {
    set_deleted(store, collection, id, false)
        .await?
        .ok_or_else(|| ApiError::not_found(entity_name(collection)))
}

/// Singular display name for error messages.
pub fn entity_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Users => "User",
        Collection::Categories => "Category",
        Collection::Tags => "Tag",
        Collection::Titles => "Title",
        Collection::Products => "Product",
        Collection::Reviews => "Review",
        Collection::Suggestions => "Suggestion",
        Collection::Images => "Image",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[actix_rt::test]
    async fn test_soft_delete_then_restore() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Tags, doc! { "tagSTR": "rpg", "deleted": false })
            .await
            .unwrap();

        let deleted = soft_delete(&store, Collection::Tags, id).await.unwrap();
        assert_eq!(LifecycleState::of(&deleted), LifecycleState::SoftDeleted);
        assert!(deleted.get_datetime("updatedAt").is_ok(), "Transition stamps updatedAt");

        let restored = restore(&store, Collection::Tags, id).await.unwrap();
        assert_eq!(LifecycleState::of(&restored), LifecycleState::Active);
    }

    #[actix_rt::test]
    async fn test_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let result = soft_delete(&store, Collection::Titles, ObjectId::new()).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_hard_delete_only_collections_rejected() {
        let store = MemoryStore::new();
        let result = soft_delete(&store, Collection::Reviews, ObjectId::new()).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_missing_flag_is_active() {
        assert_eq!(LifecycleState::of(&doc! {}), LifecycleState::Active);
    }
}
