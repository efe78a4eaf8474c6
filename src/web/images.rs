//! Image storage endpoints

use super::{path_id, Store};
use crate::app_config;
use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::orm::images::{self, ImageSearch, NewImage};
use crate::render;
use actix_multipart::{Field, Multipart};
use actix_web::http::header;
use actix_web::{delete, get, post, web, HttpResponse};
use futures::{StreamExt, TryStreamExt};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(upload_image)
        .service(search_images)
        .service(view_image_full)
        .service(view_image)
        .service(delete_image);
}

/// Read a field into memory, giving up once it exceeds `cap` bytes.
async fn read_field(field: &mut Field, cap: usize) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| ApiError::validation(format!("Read error: {}", e)))?;
        if buf.len() + chunk.len() > cap {
            return Err(ApiError::validation(format!(
                "Upload exceeds the {} byte limit",
                cap
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// POST /image - Multipart upload with a `file` part and an optional `filename`
#[post("/image")]
async fn upload_image(
    store: Store,
    _admin: AdminPrincipal,
    mut multipart: Multipart,
) -> Result<HttpResponse, ApiError> {
    let limits = app_config::uploads();

    let mut filename: Option<String> = None;
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(mut field) = multipart
        .try_next()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_string();

        match field_name.as_str() {
            "filename" => {
                let buf = read_field(&mut field, 1024).await?;
                filename = Some(String::from_utf8_lossy(&buf).to_string());
            }
            "file" => {
                let content_type = field
                    .content_type()
                    .map(|ct| ct.essence_str().to_string())
                    .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
                let original = field
                    .content_disposition()
                    .get_filename()
                    .map(str::to_string);
                let bytes = read_field(&mut field, limits.max_image_bytes).await?;
                upload = Some((content_type, original, bytes));
            }
            _ => {
                // Drain unknown parts so the stream can advance.
                read_field(&mut field, limits.max_image_bytes).await?;
            }
        }
    }

    let (content_type, original, bytes) =
        upload.ok_or_else(|| ApiError::validation("file is required"))?;
    let image = images::create(
        store.get_ref(),
        NewImage {
            filename: filename.or(original).unwrap_or_default(),
            content_type,
            bytes,
        },
        &limits,
    )
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "_id": image.id.to_hex(),
        "filename": image.filename,
        "contentType": image.content_type,
    })))
}

#[get("/image")]
async fn search_images(
    store: Store,
    _admin: AdminPrincipal,
    query: web::Query<ImageSearch>,
) -> Result<HttpResponse, ApiError> {
    let found = images::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::documents_to_json(found)))
}

/// GET /image/fulldata/{id} - Metadata plus base64 payload
#[get("/image/fulldata/{id}")]
async fn view_image_full(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("image", path)?;
    let image = images::get(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::document_to_json(images::full_data(&image)?)))
}

/// GET /image/{id} - Raw bytes with the stored content type
#[get("/image/{id}")]
async fn view_image(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("image", path)?;
    let image = images::get(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, image.content_type))
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(image.data.bytes))
}

#[delete("/image/{id}")]
async fn delete_image(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("image", path)?;
    images::delete(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Image deleted" })))
}
