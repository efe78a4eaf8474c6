use super::{path_id, Store};
use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::orm::titles::{self, TitleInput, TitleSearch};
use crate::render;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_title)
        .service(search_titles)
        .service(view_title)
        .service(update_title)
        .service(delete_title)
        .service(restore_title);
}

#[post("/title")]
async fn create_title(
    store: Store,
    _admin: AdminPrincipal,
    form: web::Json<TitleInput>,
) -> Result<HttpResponse, ApiError> {
    let title = titles::create(store.get_ref(), form.into_inner()).await?;
    Ok(HttpResponse::Created().json(render::model(&title, &[])?))
}

/// GET /title - Search, with category and tags joined in
#[get("/title")]
async fn search_titles(
    store: Store,
    query: web::Query<TitleSearch>,
) -> Result<HttpResponse, ApiError> {
    let found = titles::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::documents_to_json(found)))
}

#[get("/title/{id}")]
async fn view_title(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("title", path)?;
    let title = titles::get_populated(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::document_to_json(title)))
}

#[put("/title/{id}")]
async fn update_title(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
    form: web::Json<TitleInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("title", path)?;
    let title = titles::update(store.get_ref(), id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&title, &[])?))
}

#[delete("/title/{id}")]
async fn delete_title(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("title", path)?;
    let title = titles::soft_delete(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&title, &[])?))
}

#[patch("/title/{id}/restore")]
async fn restore_title(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("title", path)?;
    let title = titles::restore(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&title, &[])?))
}
