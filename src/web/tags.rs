use super::{path_id, Store};
use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::orm::tags::{self, TagInput, TagSearch};
use crate::render;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_tag)
        .service(search_tags)
        .service(view_tag)
        .service(update_tag)
        .service(delete_tag)
        .service(restore_tag);
}

#[post("/tag")]
async fn create_tag(
    store: Store,
    _admin: AdminPrincipal,
    form: web::Json<TagInput>,
) -> Result<HttpResponse, ApiError> {
    let tag = tags::create(store.get_ref(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(render::model(&tag, &[])?))
}

#[get("/tag")]
async fn search_tags(store: Store, query: web::Query<TagSearch>) -> Result<HttpResponse, ApiError> {
    let found = tags::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::models(&found, &[])?))
}

#[get("/tag/{id}")]
async fn view_tag(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("tag", path)?;
    let tag = tags::get(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&tag, &[])?))
}

#[put("/tag/{id}")]
async fn update_tag(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
    form: web::Json<TagInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("tag", path)?;
    let tag = tags::update(store.get_ref(), id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&tag, &[])?))
}

/// DELETE /tag/{id} - Soft-delete; the record is pruned once nothing live references it
#[delete("/tag/{id}")]
async fn delete_tag(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("tag", path)?;
    let tag = tags::soft_delete(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&tag, &[])?))
}

#[patch("/tag/{id}/restore")]
async fn restore_tag(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("tag", path)?;
    let tag = tags::restore(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&tag, &[])?))
}
