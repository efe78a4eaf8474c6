//! Suggestions collection
//!
//! Users propose new titles, tags or categories. A suggestion is unique per
//! `(name, refersto)` and is hard-deleted.

use super::{from_document, from_documents, now, require_by_id, required_text, to_document, update_fields};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::query::{contains_ci, parse_optional_id, text_param, Page, Resource};
use crate::store::{Collection, DocumentStore, FindOptions};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// What kind of record a suggestion asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Refersto {
    Title,
    Tag,
    Category,
}

impl Refersto {
    pub fn as_str(self) -> &'static str {
        match self {
            Refersto::Title => "title",
            Refersto::Tag => "tag",
            Refersto::Category => "category",
        }
    }
}

impl fmt::Display for Refersto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Refersto {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "title" => Ok(Refersto::Title),
            "tag" => Ok(Refersto::Tag),
            "category" => Ok(Refersto::Category),
            other => Err(ApiError::validation(format!(
                "{} is not valid, (title, tag, category).",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub refersto: Refersto,
    pub name: String,
    pub description: String,
    pub owner: ObjectId,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestionInput {
    pub refersto: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionSearch {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

struct Parsed {
    refersto: Refersto,
    name: String,
    description: String,
}

fn parse_input(input: &SuggestionInput) -> Result<Parsed, ApiError> {
    input.validate()?;
    Ok(Parsed {
        refersto: input.refersto.parse()?,
        name: required_text("name", &input.name)?,
        description: required_text("description", &input.description)?,
    })
}

pub async fn create(
    store: &dyn DocumentStore,
    owner: &Principal,
    input: SuggestionInput,
) -> Result<Model, ApiError> {
    let parsed = parse_input(&input)?;
    let timestamp = now();
    let suggestion = Model {
        id: ObjectId::new(),
        refersto: parsed.refersto,
        name: parsed.name,
        description: parsed.description,
        owner: owner.user_id,
        created_at: timestamp,
        updated_at: timestamp,
    };
    store
        .insert(Collection::Suggestions, to_document(&suggestion)?)
        .await?;
    log::debug!(
        "User {} suggested {} {:?}",
        owner.user_id,
        suggestion.refersto,
        suggestion.name
    );
    Ok(suggestion)
}

pub async fn get(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    require_by_id(store, Collection::Suggestions, id).await
}

pub async fn update(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
    input: SuggestionInput,
) -> Result<Model, ApiError> {
    let parsed = parse_input(&input)?;
    let current = get(store, id).await?;
    principal.ensure_owner(current.owner)?;
    let set = doc! {
        "refersto": parsed.refersto.as_str(),
        "name": parsed.name,
        "description": parsed.description,
    };
    update_fields(store, Collection::Suggestions, id, set).await
}

/// Hard delete by the author or an admin.
pub async fn delete(
    store: &dyn DocumentStore,
    principal: &Principal,
    id: ObjectId,
) -> Result<Model, ApiError> {
    let current = get(store, id).await?;
    principal.ensure_owner_or_admin(current.owner)?;
    let removed = store
        .delete_by_id(Collection::Suggestions, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Suggestion"))?;
    from_document(removed)
}

pub async fn search(
    store: &dyn DocumentStore,
    query: &SuggestionSearch,
) -> Result<Vec<Model>, ApiError> {
    let mut filter = Document::new();
    if let Some(name) = text_param(&query.name) {
        filter.insert("name", contains_ci(name));
    }
    if let Some(owner) = parse_optional_id("owner", query.owner.as_deref())? {
        filter.insert("owner", owner);
    }
    let Page { skip, limit } = Page::for_resource(Resource::Suggestions, query.limit, query.skip);
    let found = store
        .find(Collection::Suggestions, filter, FindOptions::page(skip, limit))
        .await?;
    from_documents(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refersto_parses_known_kinds() {
        assert_eq!("title".parse::<Refersto>().unwrap(), Refersto::Title);
        assert_eq!(" tag ".parse::<Refersto>().unwrap(), Refersto::Tag);
        assert_eq!("category".parse::<Refersto>().unwrap(), Refersto::Category);
    }

    #[test]
    fn test_refersto_rejects_unknown_kind() {
        let err = "product".parse::<Refersto>().unwrap_err();
        assert_eq!(err.to_string(), "product is not valid, (title, tag, category).");
    }

    #[test]
    fn test_refersto_serializes_lowercase() {
        let doc = bson::to_bson(&Refersto::Category).unwrap();
        assert_eq!(doc.as_str(), Some("category"));
    }
}
