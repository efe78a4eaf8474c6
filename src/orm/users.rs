//! Users collection

use super::{from_document, from_documents, now, require_by_id, required_text, to_document, update_fields};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::password::{hash_password, validate_strength, verify_password};
use crate::query::{contains_ci, deleted_clause, text_param, Page, Resource};
use crate::soft_delete;
use crate::store::{Collection, DocumentStore, FindOptions};
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
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    pub password: String,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Never rendered to clients.
pub const HIDDEN_FIELDS: &[&str] = &["password"];

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom = "validate_strength")]
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    #[validate(must_match = "password")]
    pub password_confirm: String,
}

/// Body of `PUT`: both fields required.
#[derive(Debug, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(email)]
    pub email: String,
}

/// Body of `PATCH`: any subset.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserPatch {
    #[validate(length(min = 1, max = 255))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordChange {
    #[serde(rename = "oldPassword")]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    #[validate(custom = "validate_strength")]
    pub new_password: String,
    #[serde(rename = "newPasswordConfirm")]
    #[validate(must_match = "new_password")]
    pub new_password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminFlag {
    #[serde(rename = "isAdmin")]
    pub is_admin: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "isAdmin")]
    pub is_admin: Option<bool>,
    pub deleted: Option<bool>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

pub async fn create(store: &dyn DocumentStore, input: NewUser) -> Result<Model, ApiError> {
    input.validate()?;
    let timestamp = now();
    let user = Model {
        id: ObjectId::new(),
        username: required_text("username", &input.username)?,
        email: required_text("email", &input.email)?.to_lowercase(),
        password: hash_password(&input.password)?,
        is_admin: false,
        deleted: false,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store.insert(Collection::Users, to_document(&user)?).await?;
    log::info!("Created user {} ({})", user.username, user.id);
    Ok(user)
}

pub async fn get(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    require_by_id(store, Collection::Users, id).await
}

pub async fn update(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: UserUpdate,
) -> Result<Model, ApiError> {
    principal.ensure_self(id)?;
    input.validate()?;
    let set = doc! {
        "username": required_text("username", &input.username)?,
        "email": required_text("email", &input.email)?.to_lowercase(),
    };
    update_fields(store, Collection::Users, id, set).await
}

pub async fn patch(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: UserPatch,
) -> Result<Model, ApiError> {
    principal.ensure_self(id)?;
    input.validate()?;
    let mut set = Document::new();
    if let Some(username) = &input.username {
        set.insert("username", required_text("username", username)?);
    }
    if let Some(email) = &input.email {
        set.insert("email", required_text("email", email)?.to_lowercase());
    }
    if set.is_empty() {
        return get(store, id).await;
    }
    update_fields(store, Collection::Users, id, set).await
}

/// Replace the password after checking the current one (401 on mismatch).
pub async fn change_password(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: PasswordChange,
) -> Result<Model, ApiError> {
    principal.ensure_self(id)?;
    input.validate()?;
    let user = get(store, id).await?;
    if !verify_password(&input.old_password, &user.password) {
        log::debug!("Rejected password change for {}: wrong current password", id);
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }
    let hashed = hash_password(&input.new_password)?;
    update_fields(store, Collection::Users, id, doc! { "password": hashed }).await
}

/// Grant or revoke admin rights. The flag must be a JSON boolean.
pub async fn set_admin(
    store: &dyn DocumentStore,
    id: ObjectId,
    input: &AdminFlag,
) -> Result<Model, ApiError> {
    let is_admin = input
        .is_admin
        .as_bool()
        .ok_or_else(|| ApiError::validation("isAdmin must be a boolean"))?;
    let user = update_fields(store, Collection::Users, id, doc! { "isAdmin": is_admin }).await?;
    log::info!("Set isAdmin={} for user {}", is_admin, id);
    Ok(user)
}

pub async fn soft_delete(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
) -> Result<Model, ApiError> {
    principal.ensure_self(id)?;
    from_document(soft_delete::soft_delete(store, Collection::Users, id).await?)
}

pub async fn restore(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    from_document(soft_delete::restore(store, Collection::Users, id).await?)
}

pub async fn search(store: &dyn DocumentStore, query: &UserSearch) -> Result<Vec<Model>, ApiError> {
    let mut filter = deleted_clause(query.deleted);
    if let Some(email) = text_param(&query.email) {
        filter.insert("email", contains_ci(email));
    }
    if let Some(username) = text_param(&query.username) {
        filter.insert("username", contains_ci(username));
    }
    if let Some(is_admin) = query.is_admin {
        filter.insert("isAdmin", is_admin);
    }
    let Page { skip, limit } = Page::for_resource(Resource::Users, query.limit, query.skip);
    let found = store
        .find(Collection::Users, filter, FindOptions::page(skip, limit))
        .await?;
    from_documents(found)
}
