//! Entity models and their repository operations.
//!
//! Each submodule owns one collection: its stored `Model`, the validated
//! request shapes that create or change it, and the store calls behind them.

pub mod categories;
pub mod images;
pub mod products;
pub mod reviews;
pub mod suggestions;
pub mod tags;
pub mod titles;
pub mod users;

use crate::error::ApiError;
use crate::store::{Collection, DocumentStore, Stage, StoreError};
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn to_document<T: Serialize>(model: &T) -> Result<Document, ApiError> {
    Ok(bson::to_document(model).map_err(StoreError::from)?)
}

pub(crate) fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, ApiError> {
    Ok(bson::from_document(doc).map_err(StoreError::from)?)
}

pub(crate) fn from_documents<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>, ApiError> {
    docs.into_iter().map(from_document).collect()
}

/// Load a record by id, soft-deleted or not.
pub(crate) async fn find_by_id<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: ObjectId,
) -> Result<Option<T>, ApiError> {
    store
        .find_one(collection, doc! { "_id": id })
        .await?
        .map(from_document)
        .transpose()
}

/// Like [`find_by_id`] but a missing record is a `NotFound` error.
pub(crate) async fn require_by_id<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: ObjectId,
) -> Result<T, ApiError> {
    find_by_id(store, collection, id)
        .await?
        .ok_or_else(|| ApiError::not_found(crate::soft_delete::entity_name(collection)))
}

/// `$set` a patch, stamping `updatedAt`, and decode the result.
pub(crate) async fn update_fields<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: ObjectId,
    mut set: Document,
) -> Result<T, ApiError> {
    set.insert("updatedAt", bson::DateTime::now());
    store
        .update_by_id(collection, id, set)
        .await?
        .map(from_document)
        .transpose()?
        .ok_or_else(|| ApiError::not_found(crate::soft_delete::entity_name(collection)))
}

/// Trimmed copy of a required text field, rejecting blanks.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::validation(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Current time truncated to the millisecond precision the store keeps.
pub(crate) fn now() -> chrono::DateTime<chrono::Utc> {
    bson::DateTime::now().to_chrono()
}

/// `$skip`/`$limit` stages for a page window. A zero skip is left out.
pub(crate) fn window(skip: u64, limit: i64) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(2);
    if skip > 0 {
        stages.push(Stage::Skip(skip));
    }
    stages.push(Stage::Limit(limit));
    stages
}

/// Replace the array a lookup produced for a single reference with its
/// first element, or null when nothing was joined.
pub(crate) fn unwrap_joined(doc: &mut Document, field: &str) {
    let single = match doc.get(field) {
        Some(Bson::Array(items)) => items.first().cloned().unwrap_or(Bson::Null),
        Some(other) => other.clone(),
        None => Bson::Null,
    };
    doc.insert(field, single);
}

/// Keep only `keep` in the embedded document (or documents) at `field`.
pub(crate) fn trim_joined(doc: &mut Document, field: &str, keep: &[&str]) {
    fn trim(value: &mut Bson, keep: &[&str]) {
        match value {
            Bson::Document(inner) => {
                let retained: Document = inner
                    .iter()
                    .filter(|(key, _)| keep.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                *inner = retained;
            }
            Bson::Array(items) => items.iter_mut().for_each(|item| trim(item, keep)),
            _ => {}
        }
    }
    if let Some(value) = doc.get_mut(field) {
        trim(value, keep);
    }
}

/// Public fields of a joined user.
pub(crate) const PUBLIC_USER_FIELDS: &[&str] = &["_id", "username"];
