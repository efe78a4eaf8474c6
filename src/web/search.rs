/// Cross-entity searches over titles and products.
///
/// Both endpoints are rate limited per client address.
use super::Store;
use crate::error::ApiError;
use crate::ip::extract_client_ip;
use crate::rate_limit::check_search_rate_limit;
use crate::render;
use crate::search::{self, QueryAllParams, SearchResults, TitleAndCategoryParams};
use actix_web::{get, web, HttpRequest, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(search_by_query_all)
        .service(search_by_title_and_category);
}

fn throttle(req: &HttpRequest) -> Result<(), ApiError> {
    let client = extract_client_ip(req).unwrap_or_else(|| "unknown".to_string());
    check_search_rate_limit(&client).map_err(|e| {
        log::debug!("Search rate limit hit for {}", client);
        ApiError::from(e)
    })
}

fn respond(results: SearchResults) -> HttpResponse {
    if results.is_empty() {
        log::debug!("Search matched nothing");
    }
    HttpResponse::Ok().json(serde_json::json!({
        "titles": render::documents_to_json(results.titles),
        "products": render::documents_to_json(results.products),
    }))
}

/// GET /othersearch/searchbyqueryall - Titles first, topped up with products
#[get("/othersearch/searchbyqueryall")]
async fn search_by_query_all(
    req: HttpRequest,
    store: Store,
    query: web::Query<QueryAllParams>,
) -> Result<HttpResponse, ApiError> {
    throttle(&req)?;
    let results = search::search_by_query_all(store.get_ref(), &query).await?;
    Ok(respond(results))
}

/// GET /othersearch/searchbytitleandcategory - Titles ranked by tag overlap
#[get("/othersearch/searchbytitleandcategory")]
async fn search_by_title_and_category(
    req: HttpRequest,
    store: Store,
    query: web::Query<TitleAndCategoryParams>,
) -> Result<HttpResponse, ApiError> {
    throttle(&req)?;
    let results = search::search_by_title_and_category(store.get_ref(), &query).await?;
    Ok(respond(results))
}
