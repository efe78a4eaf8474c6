//! Categories collection

use super::{from_document, from_documents, now, require_by_id, required_text, to_document, update_fields};
use crate::error::ApiError;
use crate::query::{contains_ci, deleted_clause, text_param, Page, Resource};
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
    #[serde(rename = "categorySTR")]
    pub category_str: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[serde(rename = "categorySTR")]
    #[validate(length(min = 1, max = 255))]
    pub category_str: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategorySearch {
    #[serde(rename = "categorySTR")]
    pub category_str: Option<String>,
    pub deleted: Option<bool>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

pub async fn create(store: &dyn DocumentStore, input: CategoryInput) -> Result<Model, ApiError> {
    input.validate()?;
    let timestamp = now();
    let category = Model {
        id: ObjectId::new(),
        category_str: required_text("categorySTR", &input.category_str)?,
        deleted: false,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store
        .insert(Collection::Categories, to_document(&category)?)
        .await?;
    log::debug!("Created category {} ({})", category.category_str, category.id);
    Ok(category)
}

pub async fn get(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    require_by_id(store, Collection::Categories, id).await
}

pub async fn update(
    store: &dyn DocumentStore,
    id: ObjectId,
    input: CategoryInput,
) -> Result<Model, ApiError> {
    input.validate()?;
    let category_str = required_text("categorySTR", &input.category_str)?;
    update_fields(
        store,
        Collection::Categories,
        id,
        doc! { "categorySTR": category_str },
    )
    .await
}

/// Case-insensitive substring match on `categorySTR`.
pub async fn search(
    store: &dyn DocumentStore,
    query: &CategorySearch,
) -> Result<Vec<Model>, ApiError> {
    let mut filter = deleted_clause(query.deleted);
    if let Some(text) = text_param(&query.category_str) {
        filter.insert("categorySTR", contains_ci(text));
    }
    let Page { skip, limit } = Page::for_resource(Resource::Categories, query.limit, query.skip);
    let found = store
        .find(Collection::Categories, filter, FindOptions::page(skip, limit))
        .await?;
    from_documents(found)
}

pub async fn soft_delete(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    from_document(soft_delete::soft_delete(store, Collection::Categories, id).await?)
}

pub async fn restore(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    from_document(soft_delete::restore(store, Collection::Categories, id).await?)
}
