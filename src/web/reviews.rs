use super::{path_id, Store};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::orm::reviews::{self, NewReview, ReviewSearch, ReviewUpdate};
use crate::render;
use actix_web::{delete, get, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_review)
        .service(search_reviews)
        .service(latest_reviews)
        .service(view_review)
        .service(update_review)
        .service(delete_review);
}

/// POST /review - One review per user and product
#[post("/review")]
async fn create_review(
    store: Store,
    principal: Principal,
    form: web::Json<NewReview>,
) -> Result<HttpResponse, ApiError> {
    let review = reviews::create(store.get_ref(), &principal, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(render::model(&review, &[])?))
}

#[get("/review")]
async fn search_reviews(
    store: Store,
    query: web::Query<ReviewSearch>,
) -> Result<HttpResponse, ApiError> {
    let found = reviews::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::documents_to_json(found)))
}

#[get("/review/latest/{product_id}")]
async fn latest_reviews(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let product = path_id("product", path)?;
    let found = reviews::latest(store.get_ref(), product).await?;
    Ok(HttpResponse::Ok().json(render::documents_to_json(found)))
}

#[get("/review/{id}")]
async fn view_review(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("review", path)?;
    let review = reviews::get(store.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(render::model(&review, &[])?))
}

#[put("/review/{id}")]
async fn update_review(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<ReviewUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("review", path)?;
    let review = reviews::update(store.get_ref(), &principal, id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(render::model(&review, &[])?))
}

#[delete("/review/{id}")]
async fn delete_review(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("review", path)?;
    reviews::delete(store.get_ref(), &principal, id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Review deleted" })))
}
