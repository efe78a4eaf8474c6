//! Reviews collection
//!
//! One review per user and product, enforced by the `(owner, product)`
//! unique index. Reviews are never soft-deleted.

use super::{
    from_document, now, require_by_id, to_document, trim_joined, unwrap_joined, update_fields,
    window, PUBLIC_USER_FIELDS,
};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::query::{parse_object_id, parse_optional_id, Page, Resource};
use crate::store::{Collection, DocumentStore, Stage, StoreError};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub score: i32,
    #[serde(default)]
    pub description: String,
    pub product: ObjectId,
    pub owner: ObjectId,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewReview {
    #[validate(range(min = 0, max = 10))]
    pub score: i32,
    pub description: Option<String>,
    pub product: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewUpdate {
    #[validate(range(min = 0, max = 10))]
    pub score: i32,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewSearch {
    pub score: Option<i32>,
    pub owner: Option<String>,
    pub product: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

pub async fn create(
    store: &dyn DocumentStore,
    owner: &Principal,
    input: NewReview,
) -> Result<Model, ApiError> {
    input.validate()?;
    let product = parse_object_id("product", &input.product)?;
    if !store
        .exists(Collection::Products, doc! { "_id": product })
        .await?
    {
        return Err(ApiError::not_found("Product"));
    }

    let timestamp = now();
    let review = Model {
        id: ObjectId::new(),
        score: input.score,
        description: input.description.unwrap_or_default().trim().to_string(),
        product,
        owner: owner.user_id,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store
        .insert(Collection::Reviews, to_document(&review)?)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => {
                ApiError::Conflict("You have already reviewed this product".to_string())
            }
            other => other.into(),
        })?;
    log::debug!("User {} reviewed product {}", owner.user_id, product);
    Ok(review)
}

pub async fn get(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    require_by_id(store, Collection::Reviews, id).await
}

pub async fn update(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: ReviewUpdate,
) -> Result<Model, ApiError> {
    input.validate()?;
    let review = get(store, id).await?;
    principal.ensure_owner(review.owner)?;
    let set = doc! {
        "score": input.score,
        "description": input.description.unwrap_or_default().trim(),
    };
    update_fields(store, Collection::Reviews, id, set).await
}

/// Hard delete by the author or an admin.
pub async fn delete(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
) -> Result<Model, ApiError> {
    let review = get(store, id).await?;
    principal.ensure_owner_or_admin(review.owner)?;
    let removed = store
        .delete_by_id(Collection::Reviews, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))?;
    from_document(removed)
}

pub async fn search(
    store: &dyn DocumentStore,
    query: &ReviewSearch,
) -> Result<Vec<Document>, ApiError> {
    let mut filter = Document::new();
    if let Some(score) = query.score {
        filter.insert("score", score);
    }
    if let Some(owner) = parse_optional_id("owner", query.owner.as_deref())? {
        filter.insert("owner", owner);
    }
    if let Some(product) = parse_optional_id("product", query.product.as_deref())? {
        filter.insert("product", product);
    }
    let Page { skip, limit } = Page::for_resource(Resource::Reviews, query.limit, query.skip);
    populated(store, filter, None, skip, limit).await
}

/// Most recent reviews of a product, newest first.
pub async fn latest(store: &dyn DocumentStore, product: ObjectId) -> Result<Vec<Document>, ApiError> {
    let Page { limit, .. } = Page::for_resource(Resource::LatestReviews, None, None);
    populated(
        store,
        doc! { "product": product },
        Some(doc! { "createdAt": -1 }),
        0,
        limit,
    )
    .await
}

async fn populated(
    store: &dyn DocumentStore,
    filter: Document,
    sort: Option<Document>,
    skip: u64,
    limit: i64,
) -> Result<Vec<Document>, ApiError> {
    let mut pipeline = vec![Stage::Match(filter)];
    if let Some(sort) = sort {
        pipeline.push(Stage::Sort(sort));
    }
    pipeline.extend(window(skip, limit));
    pipeline.push(Stage::lookup(Collection::Users, "owner", "_id", "owner"));
    pipeline.push(Stage::lookup(Collection::Products, "product", "_id", "product"));

    let mut docs = store.aggregate(Collection::Reviews, pipeline).await?;
    for doc in docs.iter_mut() {
        unwrap_joined(doc, "owner");
        unwrap_joined(doc, "product");
        trim_joined(doc, "owner", PUBLIC_USER_FIELDS);
        trim_joined(doc, "product", &["_id", "name"]);
    }
    Ok(docs)
}
