//! Translation of untrusted query input into store filters and page windows.

use crate::app_config::{self, PageLimits, PaginationConfig};
use crate::error::ApiError;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use serde::Deserialize;

/// Resources with their own entry in the pagination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Categories,
    Tags,
    Titles,
    Products,
    Reviews,
    LatestReviews,
    Suggestions,
    Images,
    CrossSearch,
}

impl Resource {
    pub fn limits(self, table: &PaginationConfig) -> PageLimits {
        match self {
            Resource::Users => table.users,
            Resource::Categories => table.categories,
            Resource::Tags => table.tags,
            Resource::Titles => table.titles,
            Resource::Products => table.products,
            Resource::Reviews => table.reviews,
            Resource::LatestReviews => table.latest_reviews,
            Resource::Suggestions => table.suggestions,
            Resource::Images => table.images,
            Resource::CrossSearch => table.cross_search,
        }
    }
}

/// A bounded page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: i64,
}

impl Page {
    /// Missing or non-positive limits fall back to the default, larger ones
    /// are clamped to the maximum. Negative skips become 0.
    pub fn resolve(limit: Option<i64>, skip: Option<i64>, limits: PageLimits) -> Self {
        let max = limits.max.max(1);
        let limit = match limit {
            Some(requested) if requested > 0 => requested.min(max),
            _ => limits.default.clamp(1, max),
        };
        Page {
            skip: skip.unwrap_or(0).max(0) as u64,
            limit,
        }
    }

    /// Resolve against the live pagination table.
    pub fn for_resource(resource: Resource, limit: Option<i64>, skip: Option<i64>) -> Self {
        Self::resolve(limit, skip, resource.limits(&app_config::pagination()))
    }
}

/// `limit` and `skip` as they arrive on the query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

impl PageQuery {
    pub fn page(&self, resource: Resource) -> Page {
        Page::for_resource(resource, self.limit, self.skip)
    }
}

/// Parse an id supplied by a client, naming the field on failure.
pub fn parse_object_id(field: &str, value: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| ApiError::validation(format!("Invalid {} id", field)))
}

pub fn parse_optional_id(field: &str, value: Option<&str>) -> Result<Option<ObjectId>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse_object_id(field, value).map(Some),
        None => Ok(None),
    }
}

/// Split a comma separated id list. Blank entries are skipped; an entry that
/// is not an ObjectId rejects the whole list.
pub fn parse_tag_list(raw: &str) -> Result<Vec<ObjectId>, ApiError> {
    let mut ids = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let id = parse_object_id("tag", entry)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Tag references in a request body: either a JSON array or a comma string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdList {
    List(Vec<String>),
    Csv(String),
}

impl IdList {
    pub fn parse(&self) -> Result<Vec<ObjectId>, ApiError> {
        match self {
            IdList::Csv(raw) => parse_tag_list(raw),
            IdList::List(items) => parse_tag_list(&items.join(",")),
        }
    }
}

/// String references in a request body: either a JSON array or a comma string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    List(Vec<String>),
    Csv(String),
}

impl StringList {
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            StringList::List(items) => items,
            StringList::Csv(raw) => raw.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

/// Case-insensitive substring match with regex metacharacters escaped.
pub fn contains_ci(text: &str) -> Document {
    doc! { "$regex": regex::escape(text.trim()), "$options": "i" }
}

/// "Contains all" match against an array field.
pub fn contains_all(ids: &[ObjectId]) -> Document {
    let ids: Vec<Bson> = ids.iter().map(|id| Bson::ObjectId(*id)).collect();
    doc! { "$all": ids }
}

/// The soft-delete clause every search starts from. Live records are those
/// not flagged `deleted: true`, matching what the pruning engine counts as
/// an active dependent.
pub fn deleted_clause(deleted: Option<bool>) -> Document {
    if deleted == Some(true) {
        doc! { "deleted": true }
    } else {
        doc! { "deleted": { "$ne": true } }
    }
}

/// Non-empty, trimmed text filter value.
pub fn text_param(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
