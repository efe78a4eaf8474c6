//! Products collection
//!
//! Products are owned by the user who created them. Only the owner may
//! change, soft-delete or restore one.

use super::{
    from_document, now, require_by_id, required_text, to_document, trim_joined, unwrap_joined,
    update_fields, window, PUBLIC_USER_FIELDS,
};
use crate::auth::Principal;
use crate::constants::MAX_VERSION_LENGTH;
use crate::error::ApiError;
use crate::query::{
    contains_all, contains_ci, deleted_clause, parse_object_id, parse_optional_id,
    parse_tag_list, text_param, IdList, Page, Resource, StringList,
};
use crate::soft_delete;
use crate::store::{Collection, DocumentStore, Stage};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
    #[serde(rename = "magnetLink")]
    pub magnet_link: String,
    #[serde(rename = "othersUrl", default)]
    pub others_url: Vec<String>,
    pub title: ObjectId,
    #[serde(default)]
    pub tags: Vec<ObjectId>,
    pub owner: ObjectId,
    pub version: String,
    #[serde(rename = "timesDownloaded", default)]
    pub times_downloaded: i64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Fields hidden from search results.
pub const SEARCH_HIDDEN_FIELDS: [&str; 4] = ["magnetLink", "othersUrl", "createdAt", "updatedAt"];

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(rename = "magnetLink")]
    #[validate(length(min = 1))]
    pub magnet_link: String,
    #[serde(rename = "othersUrl")]
    pub others_url: Option<StringList>,
    pub title: String,
    pub tags: Option<IdList>,
    #[validate(length(min = 1, max = "MAX_VERSION_LENGTH"))]
    pub version: String,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(rename = "magnetLink")]
    #[validate(length(min = 1))]
    pub magnet_link: Option<String>,
    #[serde(rename = "othersUrl")]
    pub others_url: Option<StringList>,
    pub title: Option<String>,
    pub tags: Option<IdList>,
    #[validate(length(min = 1, max = "MAX_VERSION_LENGTH"))]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductSearch {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub title: Option<String>,
    /// Comma separated tag ids, all of which must be present
    pub tags: Option<String>,
    #[serde(rename = "minDownloads")]
    pub min_downloads: Option<i64>,
    #[serde(rename = "maxDownloads")]
    pub max_downloads: Option<i64>,
    pub deleted: Option<bool>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

fn tag_ids(tags: &Option<IdList>) -> Result<Vec<ObjectId>, ApiError> {
    match tags {
        Some(tags) => tags.parse(),
        None => Ok(Vec::new()),
    }
}

fn to_bson_ids(ids: Vec<ObjectId>) -> Vec<Bson> {
    ids.into_iter().map(Bson::ObjectId).collect()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

pub async fn create(
    store: &dyn DocumentStore,
    owner: &Principal,
    input: ProductInput,
) -> Result<Model, ApiError> {
    input.validate()?;
    let timestamp = now();
    let product = Model {
        id: ObjectId::new(),
        name: required_text("name", &input.name)?,
        description: input.description.unwrap_or_default().trim().to_string(),
        image_url: trimmed(input.image_url),
        magnet_link: required_text("magnetLink", &input.magnet_link)?,
        others_url: input.others_url.map(StringList::into_vec).unwrap_or_default(),
        title: parse_object_id("title", &input.title)?,
        tags: tag_ids(&input.tags)?,
        owner: owner.user_id,
        version: required_text("version", &input.version)?,
        times_downloaded: 0,
        deleted: false,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store
        .insert(Collection::Products, to_document(&product)?)
        .await?;
    log::debug!("User {} created product {}", owner.user_id, product.id);
    Ok(product)
}

/// Load the product (404 when absent) and check the caller owns it (403).
pub async fn require_owned(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
) -> Result<Model, ApiError> {
    let product: Model = require_by_id(store, Collection::Products, id).await?;
    principal.ensure_owner(product.owner)?;
    Ok(product)
}

pub async fn update(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: ProductInput,
) -> Result<Model, ApiError> {
    input.validate()?;
    require_owned(store, principal, id).await?;
    let set = doc! {
        "name": required_text("name", &input.name)?,
        "description": input.description.unwrap_or_default().trim(),
        "imageURL": trimmed(input.image_url),
        "magnetLink": required_text("magnetLink", &input.magnet_link)?,
        "othersUrl": input.others_url.map(StringList::into_vec).unwrap_or_default(),
        "title": parse_object_id("title", &input.title)?,
        "tags": to_bson_ids(tag_ids(&input.tags)?),
        "version": required_text("version", &input.version)?,
    };
    update_fields(store, Collection::Products, id, set).await
}

pub async fn patch(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: ProductPatch,
) -> Result<Model, ApiError> {
    input.validate()?;
    let current = require_owned(store, principal, id).await?;

    let mut set = Document::new();
    if let Some(name) = &input.name {
        set.insert("name", required_text("name", name)?);
    }
    if let Some(description) = &input.description {
        set.insert("description", description.trim());
    }
    if let Some(image_url) = trimmed(input.image_url) {
        set.insert("imageURL", image_url);
    }
    if let Some(magnet_link) = &input.magnet_link {
        set.insert("magnetLink", required_text("magnetLink", magnet_link)?);
    }
    if let Some(others_url) = input.others_url {
        set.insert("othersUrl", others_url.into_vec());
    }
    if let Some(title) = &input.title {
        set.insert("title", parse_object_id("title", title)?);
    }
    if input.tags.is_some() {
        set.insert("tags", to_bson_ids(tag_ids(&input.tags)?));
    }
    if let Some(version) = &input.version {
        set.insert("version", required_text("version", version)?);
    }

    if set.is_empty() {
        return Ok(current);
    }
    update_fields(store, Collection::Products, id, set).await
}

/// The product with `title`, `tags` and `owner` joined in.
pub async fn get_populated(store: &dyn DocumentStore, id: ObjectId) -> Result<Document, ApiError> {
    populated(store, doc! { "_id": id }, 0, 1)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Product"))
}

pub async fn search(
    store: &dyn DocumentStore,
    query: &ProductSearch,
) -> Result<Vec<Document>, ApiError> {
    let mut filter = deleted_clause(query.deleted);
    if let Some(name) = text_param(&query.name) {
        filter.insert("name", contains_ci(name));
    }
    if let Some(owner) = parse_optional_id("owner", query.owner.as_deref())? {
        filter.insert("owner", owner);
    }
    if let Some(title) = parse_optional_id("title", query.title.as_deref())? {
        filter.insert("title", title);
    }
    if let Some(raw) = text_param(&query.tags) {
        let tags = parse_tag_list(raw)?;
        if !tags.is_empty() {
            filter.insert("tags", contains_all(&tags));
        }
    }
    let mut downloads = Document::new();
    if let Some(min) = query.min_downloads {
        downloads.insert("$gte", min);
    }
    if let Some(max) = query.max_downloads {
        downloads.insert("$lte", max);
    }
    if !downloads.is_empty() {
        filter.insert("timesDownloaded", downloads);
    }

    let Page { skip, limit } = Page::for_resource(Resource::Products, query.limit, query.skip);
    let mut found = populated(store, filter, skip, limit).await?;
    for doc in found.iter_mut() {
        for field in SEARCH_HIDDEN_FIELDS {
            doc.remove(field);
        }
    }
    Ok(found)
}

async fn populated(
    store: &dyn DocumentStore,
    filter: Document,
    skip: u64,
    limit: i64,
) -> Result<Vec<Document>, ApiError> {
    let mut pipeline = vec![Stage::Match(filter)];
    pipeline.extend(window(skip, limit));
    pipeline.push(Stage::lookup(Collection::Titles, "title", "_id", "title"));
    pipeline.push(Stage::lookup(Collection::Tags, "tags", "_id", "tags"));
    pipeline.push(Stage::lookup(Collection::Users, "owner", "_id", "owner"));

    let mut docs = store.aggregate(Collection::Products, pipeline).await?;
    for doc in docs.iter_mut() {
        unwrap_joined(doc, "title");
        unwrap_joined(doc, "owner");
        trim_joined(doc, "owner", PUBLIC_USER_FIELDS);
    }
    Ok(docs)
}

pub async fn soft_delete(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
) -> Result<Model, ApiError> {
    require_owned(store, principal, id).await?;
    from_document(soft_delete::soft_delete(store, Collection::Products, id).await?)
}

pub async fn restore(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
) -> Result<Model, ApiError> {
    require_owned(store, principal, id).await?;
    from_document(soft_delete::restore(store, Collection::Products, id).await?)
}
