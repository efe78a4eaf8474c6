use super::{path_id, Store};
use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::orm::categories::{self, CategoryInput, CategorySearch};
use crate::render;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_category)
        .service(search_categories)
        .service(view_category)
        .service(update_category)
        .service(delete_category)
        .service(restore_category);
}

#[post("/category")]
async fn create_category(
    store: Store,
    _admin: AdminPrincipal,
    form: web::Json<CategoryInput>,
) -> Result<HttpResponse, ApiError> {
    let category = categories::create(store.get_ref(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(render::model(&category, &[])?))
}

#[get("/category")]
async fn search_categories(
    store: Store,
    query: web::Query<CategorySearch>,
) -> Result<HttpResponse, ApiError> {
    let found = categories::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::models(&found, &[])?))
}

#[get("/category/{id}")]
async fn view_category(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("category", path)?;
    let category = categories::get(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&category, &[])?))
}

#[put("/category/{id}")]
async fn update_category(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
    form: web::Json<CategoryInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("category", path)?;
    let category = categories::update(store.get_ref(), id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&category, &[])?))
}

#[delete("/category/{id}")]
async fn delete_category(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("category", path)?;
    let category = categories::soft_delete(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&category, &[])?))
}

#[patch("/category/{id}/restore")]
async fn restore_category(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("category", path)?;
    let category = categories::restore(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&category, &[])?))
}
