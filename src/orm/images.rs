//! Images collection
//!
//! Raw image bytes stored inline as BSON binary. Images are not soft-deleted
//! and take no part in pruning.

use super::{from_document, from_documents, now, require_by_id, required_text, to_document};
use crate::app_config::UploadConfig;
use crate::constants::MAX_IMAGE_FILENAME_LENGTH;
use crate::error::ApiError;
use crate::query::{contains_ci, text_param, Page, Resource};
use crate::store::{Collection, DocumentStore, FindOptions};
use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::spec::BinarySubtype;
use bson::{doc, Binary, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub data: Binary,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// An upload as received from the multipart form.
#[derive(Debug)]
pub struct NewImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageSearch {
    pub filename: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Check an upload against the configured type and size limits.
pub fn check_upload(image: &NewImage, limits: &UploadConfig) -> Result<String, ApiError> {
    let filename = required_text("filename", &image.filename)?;
    if filename.chars().count() as u64 > MAX_IMAGE_FILENAME_LENGTH {
        return Err(ApiError::validation(format!(
            "filename must be at most {} characters",
            MAX_IMAGE_FILENAME_LENGTH
        )));
    }
    if !limits
        .allowed_image_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&image.content_type))
    {
        return Err(ApiError::validation(format!(
            "Unsupported image type: {}",
            image.content_type
        )));
    }
    if image.bytes.is_empty() {
        return Err(ApiError::validation("file is required"));
    }
    if image.bytes.len() > limits.max_image_bytes {
        return Err(ApiError::validation(format!(
            "Image exceeds the {} byte limit",
            limits.max_image_bytes
        )));
    }
    Ok(filename)
}

pub async fn create(
    store: &dyn DocumentStore,
    image: NewImage,
    limits: &UploadConfig,
) -> Result<Model, ApiError> {
    let filename = check_upload(&image, limits)?;
    let stored = Model {
        id: ObjectId::new(),
        filename,
        content_type: image.content_type.to_ascii_lowercase(),
        data: Binary {
            subtype: BinarySubtype::Generic,
            bytes: image.bytes,
        },
        created_at: now(),
    };
    store
        .insert(Collection::Images, to_document(&stored)?)
        .await?;
    log::info!(
        "Stored image {} ({}, {} bytes)",
        stored.id,
        stored.content_type,
        stored.data.bytes.len()
    );
    Ok(stored)
}

pub async fn get(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    require_by_id(store, Collection::Images, id).await
}

/// Metadata plus the payload as base64 under `base64`.
pub fn full_data(image: &Model) -> Result<Document, ApiError> {
    let mut doc = to_document(image)?;
    if let Some(data) = doc.remove("data") {
        doc.insert("base64", data);
    }
    Ok(doc)
}

pub async fn search(
    store: &dyn DocumentStore,
    query: &ImageSearch,
) -> Result<Vec<Document>, ApiError> {
    let mut filter = Document::new();
    if let Some(filename) = text_param(&query.filename) {
        filter.insert("filename", contains_ci(filename));
    }
    let Page { skip, limit } = Page::for_resource(Resource::Images, query.limit, query.skip);
    let found: Vec<Model> = from_documents(
        store
            .find(
                Collection::Images,
                filter,
                FindOptions::page(skip, limit).sort(doc! { "createdAt": -1 }),
            )
            .await?,
    )?;
    found.iter().map(full_data).collect()
}

pub async fn delete(store: &dyn DocumentStore, id: ObjectId) -> Result<Model, ApiError> {
    let removed = store
        .delete_by_id(Collection::Images, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Image"))?;
    from_document(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content_type: &str, size: usize) -> NewImage {
        NewImage {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            bytes: vec![7u8; size],
        }
    }

    #[test]
    fn test_accepts_allowed_upload() {
        let limits = UploadConfig::default();
        let name = check_upload(&upload(" cover.png ", "image/png", 10), &limits).unwrap();
        assert_eq!(name, "cover.png");
    }

    #[test]
    fn test_rejects_disallowed_type() {
        let limits = UploadConfig::default();
        assert!(check_upload(&upload("a.svg", "image/svg+xml", 10), &limits).is_err());
    }

    #[test]
    fn test_rejects_oversized_and_empty() {
        let limits = UploadConfig {
            max_image_bytes: 16,
            ..UploadConfig::default()
        };
        assert!(check_upload(&upload("a.gif", "image/gif", 17), &limits).is_err());
        assert!(check_upload(&upload("a.gif", "image/gif", 0), &limits).is_err());
        assert!(check_upload(&upload("a.gif", "image/gif", 16), &limits).is_ok());
    }

    #[test]
    fn test_rejects_long_filename() {
        let limits = UploadConfig::default();
        let long = "x".repeat(129);
        assert!(check_upload(&upload(&long, "image/jpeg", 1), &limits).is_err());
    }

    #[test]
    fn test_full_data_renames_payload() {
        let image = Model {
            id: ObjectId::new(),
            filename: "a.png".into(),
            content_type: "image/png".into(),
            data: Binary {
                subtype: BinarySubtype::Generic,
                bytes: vec![1, 2, 3],
            },
            created_at: now(),
        };
        let doc = full_data(&image).unwrap();
        assert!(doc.get("data").is_none());
        assert!(matches!(doc.get("base64"), Some(bson::Bson::Binary(_))));
    }
}
