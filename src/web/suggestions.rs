use super::{path_id, Store};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::orm::suggestions::{self, SuggestionInput, SuggestionSearch};
use crate::render;
use actix_web::{delete, get, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_suggestion)
        .service(search_suggestions)
        .service(view_suggestion)
        .service(update_suggestion)
        .service(delete_suggestion);
}

#[post("/suggestion")]
async fn create_suggestion(
    store: Store,
    principal: Principal,
    form: web::Json<SuggestionInput>,
) -> Result<HttpResponse, ApiError> {
    let suggestion = suggestions::create(store.get_ref(), &principal, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(render::model(&suggestion, &[])?))
}

#[get("/suggestion")]
async fn search_suggestions(
    store: Store,
    query: web::Query<SuggestionSearch>,
) -> Result<HttpResponse, ApiError> {
    let found = suggestions::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::models(&found, &[])?))
}

#[get("/suggestion/{id}")]
async fn view_suggestion(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("suggestion", path)?;
    let suggestion = suggestions::get(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&suggestion, &[])?))
}

#[put("/suggestion/{id}")]
async fn update_suggestion(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<SuggestionInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("suggestion", path)?;
    let suggestion =
        suggestions::update(store.get_ref(), &principal, id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&suggestion, &[])?))
}

#[delete("/suggestion/{id}")]
async fn delete_suggestion(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("suggestion", path)?;
    suggestions::delete(store.get_ref(), &principal, id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Suggestion deleted" })))
}
