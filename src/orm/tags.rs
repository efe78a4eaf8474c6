//! Tags collection

use super::{from_documents, now, require_by_id, required_text, to_document, update_fields};
use crate::constants::MAX_TAG_LENGTH;
use crate::error::ApiError;
use crate::query::{deleted_clause, text_param, Page, Resource};
use crate::soft_delete;
use crate::store::{Collection, DocumentStore, FindOptions};
use bson::doc;
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "tagSTR")]
    pub tag_str: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TagInput {
    #[serde(rename = "tagSTR")]
    #[validate(length(min = 1, max = "MAX_TAG_LENGTH"))]
    pub tag_str: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagSearch {
    #[serde(rename = "tagSTR")]
    pub tag_str: Option<String>,
    pub deleted: Option<bool>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

pub async fn create(store: &dyn DocumentStore, input: TagInput) -> Result<Model, ApiError> {
    input.validate()?;
    let timestamp = now();
    let tag = Model {
        id: ObjectId::new(),
        tag_str: required_text("tagSTR", &input.tag_str)?,
        deleted: false,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store.insert(Collection::Tags, to_document(&tag)?).await?;
    log::debug!("Created tag {} ({})", tag.tag_str, tag.id);
    Ok(tag)
}

pub async fn get(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    require_by_id(store, Collection::Tags, id).await
}

pub async fn update(
    store: &dyn DocumentStore,
    id: ObjectId,
    input: TagInput,
) -> Result<Model, ApiError> {
    input.validate()?;
    let tag_str = required_text("tagSTR", &input.tag_str)?;
    update_fields(store, Collection::Tags, id, doc! { "tagSTR": tag_str }).await
}

/// Exact `tagSTR` match; soft-deleted tags only when asked for.
pub async fn search(store: &dyn DocumentStore, query: &TagSearch) -> Result<Vec<Model>, ApiError> {
    let mut filter = deleted_clause(query.deleted);
    if let Some(tag_str) = text_param(&query.tag_str) {
        filter.insert("tagSTR", tag_str);
    }
    let Page { skip, limit } = Page::for_resource(Resource::Tags, query.limit, query.skip);
    let found = store
        .find(Collection::Tags, filter, FindOptions::page(skip, limit))
        .await?;
    from_documents(found)
}

pub async fn soft_delete(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    super::from_document(soft_delete::soft_delete(store, Collection::Tags, id).await?)
}

pub async fn restore(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    super::from_document(soft_delete::restore(store, Collection::Tags, id).await?)
}
