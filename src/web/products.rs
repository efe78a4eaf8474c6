//! Product endpoints. Writes are limited to the product's owner.

use super::{path_id, Store};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::orm::products::{self, ProductInput, ProductPatch, ProductSearch};
use crate::render;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_product)
        .service(search_products)
        .service(view_product)
        .service(update_product)
        .service(patch_product)
        .service(delete_product)
        .service(restore_product);
}

#[post("/product")]
async fn create_product(
    store: Store,
    principal: Principal,
    form: web::Json<ProductInput>,
) -> Result<HttpResponse, ApiError> {
    let product = products::create(store.get_ref(), &principal, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(render::model(&product, &[])?))
}

#[get("/product")]
async fn search_products(
    store: Store,
    query: web::Query<ProductSearch>,
) -> Result<HttpResponse, ApiError> {
    let found = products::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::documents_to_json(found)))
}

#[get("/product/{id}")]
async fn view_product(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("product", path)?;
    let product = products::get_populated(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::document_to_json(product)))
}

#[put("/product/{id}")]
async fn update_product(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<ProductInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("product", path)?;
    let product = products::update(store.get_ref(), &principal, id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&product, &[])?))
}

#[patch("/product/{id}")]
async fn patch_product(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<ProductPatch>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("product", path)?;
    let product = products::patch(store.get_ref(), &principal, id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&product, &[])?))
}

#[delete("/product/{id}")]
async fn delete_product(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("product", path)?;
    let product = products::soft_delete(store.get_ref(), &principal, id).await?;
    Ok(HttpResponse::Ok().json(render::model(&product, &[])?))
}

#[patch("/product/{id}/restore")]
async fn restore_product(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("product", path)?;
    let product = products::restore(store.get_ref(), &principal, id).await?;
    Ok(HttpResponse::Ok().json(render::model(&product, &[])?))
}
