//! Test fixtures for creating test data
//!
//! Records are inserted as raw documents so tests control `deleted` and
//! `updatedAt` directly.
#![allow(dead_code)]

use actix_web::web::Data;
use bazaar::auth::{AuthGate, Principal};
use bazaar::store::{Collection, DocumentStore};
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// A BSON timestamp `days` days in the past.
pub fn days_ago(days: i64) -> bson::DateTime {
    bson::DateTime::from_chrono(Utc::now() - Duration::days(days))
}

fn ids(list: &[ObjectId]) -> Vec<Bson> {
    list.iter().copied().map(Bson::ObjectId).collect()
}

async fn insert(store: &dyn DocumentStore, collection: Collection, document: Document) -> ObjectId {
    store
        .insert(collection, document)
        .await
        .expect("Failed to insert fixture")
}

pub async fn insert_user(
    store: &dyn DocumentStore,
    username: &str,
    deleted: bool,
    age_days: i64,
) -> ObjectId {
    insert(
        store,
        Collection::Users,
        doc! {
            "username": username,
            "email": format!("{}@test.com", username.to_lowercase()),
            "password": "not-a-real-hash",
            "isAdmin": false,
            "deleted": deleted,
            "createdAt": days_ago(age_days),
            "updatedAt": days_ago(age_days),
        },
    )
    .await
}

pub async fn insert_tag(store: &dyn DocumentStore, tag: &str, deleted: bool) -> ObjectId {
    insert(
        store,
        Collection::Tags,
        doc! {
            "tagSTR": tag,
            "deleted": deleted,
            "createdAt": days_ago(0),
            "updatedAt": days_ago(0),
        },
    )
    .await
}

pub async fn insert_category(store: &dyn DocumentStore, name: &str, deleted: bool) -> ObjectId {
    insert(
        store,
        Collection::Categories,
        doc! {
            "categorySTR": name,
            "deleted": deleted,
            "createdAt": days_ago(0),
            "updatedAt": days_ago(0),
        },
    )
    .await
}

pub async fn insert_title(
    store: &dyn DocumentStore,
    title: &str,
    category: Option<ObjectId>,
    tags: &[ObjectId],
    deleted: bool,
) -> ObjectId {
    insert(
        store,
        Collection::Titles,
        doc! {
            "titleSTR": title,
            "imageURL": Bson::Null,
            "category": category,
            "tags": ids(tags),
            "deleted": deleted,
            "createdAt": days_ago(0),
            "updatedAt": days_ago(0),
        },
    )
    .await
}

/// Title created `minutes` minutes ago, for ordering assertions.
pub async fn insert_title_at(
    store: &dyn DocumentStore,
    title: &str,
    tags: &[ObjectId],
    minutes: i64,
) -> ObjectId {
    let created = bson::DateTime::from_chrono(Utc::now() - Duration::minutes(minutes));
    insert(
        store,
        Collection::Titles,
        doc! {
            "titleSTR": title,
            "category": Bson::Null,
            "tags": ids(tags),
            "deleted": false,
            "createdAt": created,
            "updatedAt": created,
        },
    )
    .await
}

/// Fields of a fixture product; the rest get fixed values.
pub struct TestProduct<'a> {
    pub name: &'a str,
    pub title: ObjectId,
    pub owner: ObjectId,
    pub tags: &'a [ObjectId],
    pub deleted: bool,
    pub age_days: i64,
}

pub async fn insert_product(store: &dyn DocumentStore, product: TestProduct<'_>) -> ObjectId {
    insert(
        store,
        Collection::Products,
        doc! {
            "name": product.name,
            "description": "",
            "imageURL": Bson::Null,
            "magnetLink": "magnet:?xt=urn:btih:0000",
            "othersUrl": [],
            "title": product.title,
            "tags": ids(product.tags),
            "owner": product.owner,
            "version": "1.0",
            "timesDownloaded": 0_i64,
            "deleted": product.deleted,
            "createdAt": days_ago(product.age_days),
            "updatedAt": days_ago(product.age_days),
        },
    )
    .await
}

/// Active product with no tags, updated today.
pub async fn insert_simple_product(
    store: &dyn DocumentStore,
    name: &str,
    title: ObjectId,
    owner: ObjectId,
) -> ObjectId {
    insert_product(
        store,
        TestProduct {
            name,
            title,
            owner,
            tags: &[],
            deleted: false,
            age_days: 0,
        },
    )
    .await
}

/// Auth gate accepting `user:<hex id>` and `admin:<hex id>` tokens.
pub struct StaticGate;

impl AuthGate for StaticGate {
    fn authenticate(&self, token: &str) -> Option<Principal> {
        let (role, id) = token.split_once(':')?;
        let is_admin = match role {
            "user" => false,
            "admin" => true,
            _ => return None,
        };
        Some(Principal {
            user_id: ObjectId::parse_str(id).ok()?,
            is_admin,
        })
    }
}

pub fn user_token(id: ObjectId) -> String {
    format!("Bearer user:{}", id.to_hex())
}

pub fn admin_token(id: ObjectId) -> String {
    format!("Bearer admin:{}", id.to_hex())
}

/// App data for a test service over `store`.
pub fn app_data(store: Arc<dyn DocumentStore>) -> (Data<dyn DocumentStore>, Data<dyn AuthGate>) {
    let gate: Arc<dyn AuthGate> = Arc::new(StaticGate);
    (Data::from(store), Data::from(gate))
}
