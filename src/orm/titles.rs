//! Titles collection
//!
//! A title groups products under one name, a category and a set of tags.
//! Reads return the title with its category and tags joined in.

use super::{from_document, now, required_text, to_document, unwrap_joined, update_fields, window};
use crate::constants::MAX_TITLE_LENGTH;
use crate::error::ApiError;
use crate::query::{
    contains_all, contains_ci, deleted_clause, parse_optional_id, parse_tag_list, text_param,
    IdList, Page, Resource,
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
    #[serde(rename = "titleSTR")]
    pub title_str: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<ObjectId>,
    #[serde(default)]
    pub tags: Vec<ObjectId>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TitleInput {
    #[serde(rename = "titleSTR")]
    #[validate(length(min = 1, max = "MAX_TITLE_LENGTH"))]
    pub title_str: String,
    pub category: Option<String>,
    pub tags: Option<IdList>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleSearch {
    #[serde(rename = "titleSTR")]
    pub title_str: Option<String>,
    pub category: Option<String>,
    /// Comma separated tag ids, all of which must be present
    pub tags: Option<String>,
    pub deleted: Option<bool>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

struct ParsedInput {
    title_str: String,
    category: Option<ObjectId>,
    tags: Vec<ObjectId>,
    image_url: Option<String>,
}

fn parse_input(input: TitleInput) -> Result<ParsedInput, ApiError> {
    input.validate()?;
    Ok(ParsedInput {
        title_str: required_text("titleSTR", &input.title_str)?,
        category: parse_optional_id("category", input.category.as_deref())?,
        tags: match &input.tags {
            Some(tags) => tags.parse()?,
            None => Vec::new(),
        },
        image_url: input.image_url.map(|url| url.trim().to_string()),
    })
}

pub async fn create(store: &dyn DocumentStore, input: TitleInput) -> Result<Model, ApiError> {
    let parsed = parse_input(input)?;
    let timestamp = now();
    let title = Model {
        id: ObjectId::new(),
        title_str: parsed.title_str,
        image_url: parsed.image_url,
        category: parsed.category,
        tags: parsed.tags,
        deleted: false,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store.insert(Collection::Titles, to_document(&title)?).await?;
    log::debug!("Created title {} ({})", title.title_str, title.id);
    Ok(title)
}

/// Full replacement of the editable fields.
pub async fn update(
    store: &dyn DocumentStore,
    id: ObjectId,
    input: TitleInput,
) -> Result<Model, ApiError> {
    let parsed = parse_input(input)?;
    let tags: Vec<Bson> = parsed.tags.into_iter().map(Bson::ObjectId).collect();
    update_fields(
        store,
        Collection::Titles,
        id,
        doc! {
            "titleSTR": parsed.title_str,
            "category": parsed.category,
            "tags": tags,
            "imageURL": parsed.image_url,
        },
    )
    .await
}

/// The title with `category` and `tags` replaced by the joined records.
pub async fn get_populated(store: &dyn DocumentStore, id: ObjectId) -> Result<Document, ApiError> {
    populated(store, doc! { "_id": id }, 0, 1)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Title"))
}

pub async fn search(store: &dyn DocumentStore, query: &TitleSearch) -> Result<Vec<Document>, ApiError> {
    let mut filter = deleted_clause(query.deleted);
    if let Some(text) = text_param(&query.title_str) {
        filter.insert("titleSTR", contains_ci(text));
    }
    if let Some(category) = parse_optional_id("category", query.category.as_deref())? {
        filter.insert("category", category);
    }
    if let Some(raw) = text_param(&query.tags) {
        let tags = parse_tag_list(raw)?;
        if !tags.is_empty() {
            filter.insert("tags", contains_all(&tags));
        }
    }
    let Page { skip, limit } = Page::for_resource(Resource::Titles, query.limit, query.skip);
    populated(store, filter, skip, limit).await
}

async fn populated(
    store: &dyn DocumentStore,
    filter: Document,
    skip: u64,
    limit: i64,
) -> Result<Vec<Document>, ApiError> {
    let mut pipeline = vec![Stage::Match(filter)];
    pipeline.extend(window(skip, limit));
    pipeline.push(Stage::lookup(Collection::Categories, "category", "_id", "category"));
    pipeline.push(Stage::lookup(Collection::Tags, "tags", "_id", "tags"));

    let mut docs = store.aggregate(Collection::Titles, pipeline).await?;
    for doc in docs.iter_mut() {
        unwrap_joined(doc, "category");
    }
    Ok(docs)
}

pub async fn soft_delete(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    from_document(soft_delete::soft_delete(store, Collection::Titles, id).await?)
}

pub async fn restore(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    from_document(soft_delete::restore(store, Collection::Titles, id).await?)
}
