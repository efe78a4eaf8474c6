/// HTTP-level tests: routing, extractors and status mapping
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use bazaar::store::DocumentStore;
use bson::oid::ObjectId;
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;

macro_rules! test_app {
    ($store:expr) => {{
        let (store_data, gate_data) = app_data($store);
        test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(gate_data)
                .configure(bazaar::web::configure),
        )
        .await
    }};
}

async fn store_with_product() -> (Arc<dyn DocumentStore>, ObjectId, ObjectId) {
    let store = setup_store().await;
    let owner = insert_user(store.as_ref(), "owner", false, 0).await;
    let title = insert_title(store.as_ref(), "Terraria", None, &[], false).await;
    let product = insert_simple_product(store.as_ref(), "Terraria 1.4", title, owner).await;
    (store, owner, product)
}

#[actix_rt::test]
async fn test_admin_route_requires_credentials() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::post()
        .uri("/api/v1/category")
        .set_json(json!({ "categorySTR": "Games" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/category")
        .insert_header((header::AUTHORIZATION, user_token(ObjectId::new())))
        .set_json(json!({ "categorySTR": "Games" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/v1/category")
        .insert_header((header::AUTHORIZATION, "Bearer forged"))
        .set_json(json!({ "categorySTR": "Games" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/v1/category")
        .insert_header((header::AUTHORIZATION, admin_token(ObjectId::new())))
        .set_json(json!({ "categorySTR": "Games" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[actix_rt::test]
async fn test_malformed_path_id_is_bad_request() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::get()
        .uri("/api/v1/category/not-an-id")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_rt::test]
async fn test_product_update_checks_existence_before_ownership() {
    let (store, _owner, product) = store_with_product().await;
    let app = test_app!(store);
    let stranger = ObjectId::new();
    let body = json!({
        "name": "Renamed",
        "magnetLink": "magnet:?xt=urn:btih:1111",
        "title": ObjectId::new().to_hex(),
        "version": "2.0",
    });

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/product/{}", ObjectId::new()))
        .insert_header((header::AUTHORIZATION, user_token(stranger)))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/product/{}", product))
        .insert_header((header::AUTHORIZATION, user_token(stranger)))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_second_review_of_a_product_conflicts() {
    let (store, _owner, product) = store_with_product().await;
    let app = test_app!(store);
    let reviewer = ObjectId::new();
    let review = json!({ "score": 8, "description": "Great", "product": product.to_hex() });

    let req = test::TestRequest::post()
        .uri("/api/v1/review")
        .insert_header((header::AUTHORIZATION, user_token(reviewer)))
        .set_json(&review)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/v1/review")
        .insert_header((header::AUTHORIZATION, user_token(reviewer)))
        .set_json(&review)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "You have already reviewed this product");
}

#[actix_rt::test]
async fn test_review_score_out_of_range() {
    let (store, _owner, product) = store_with_product().await;
    let app = test_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/review")
        .insert_header((header::AUTHORIZATION, user_token(ObjectId::new())))
        .set_json(json!({ "score": 11, "product": product.to_hex() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_review_of_missing_product_is_not_found() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::post()
        .uri("/api/v1/review")
        .insert_header((header::AUTHORIZATION, user_token(ObjectId::new())))
        .set_json(json!({ "score": 5, "product": ObjectId::new().to_hex() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_prune_endpoint_reports_counts() {
    let store = setup_store().await;
    insert_tag(store.as_ref(), "orphan", true).await;
    insert_user(store.as_ref(), "longgone", true, 1000).await;
    let app = test_app!(store);

    let req = test::TestRequest::delete()
        .uri("/api/v1/admin/prune-all")
        .insert_header((header::AUTHORIZATION, user_token(ObjectId::new())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri("/api/v1/admin/prune-all")
        .insert_header((header::AUTHORIZATION, admin_token(ObjectId::new())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Pruning completed");
    assert_eq!(body["result"]["Tags"], 1);
    assert_eq!(body["result"]["Users"], 1);
    assert_eq!(body["result"]["Products"], 0);
}

#[actix_rt::test]
async fn test_registration_hides_password() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::post()
        .uri("/api/v1/user")
        .set_json(json!({
            "username": "newcomer",
            "email": "Newcomer@Example.com",
            "password": "Str0ng!Pass",
            "passwordConfirm": "Str0ng!Pass",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: Value = test::read_body_json(resp).await;
    assert!(created.get("password").is_none());
    assert_eq!(created["email"], "newcomer@example.com");
    let id = created["_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/user/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Value = test::read_body_json(resp).await;
    assert_eq!(fetched["username"], "newcomer");
    assert!(fetched.get("password").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1/user/me")
        .insert_header((header::AUTHORIZATION, user_token(ObjectId::parse_str(&id).unwrap())))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_registration_rejects_weak_password() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::post()
        .uri("/api/v1/user")
        .set_json(json!({
            "username": "weak",
            "email": "weak@example.com",
            "password": "password",
            "passwordConfirm": "password",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_invalid_suggestion_target() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::post()
        .uri("/api/v1/suggestion")
        .insert_header((header::AUTHORIZATION, user_token(ObjectId::new())))
        .set_json(json!({ "refersto": "product", "name": "x", "description": "y" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "product is not valid, (title, tag, category).");
}

#[actix_rt::test]
async fn test_search_response_shape() {
    let store = setup_store().await;
    insert_title(store.as_ref(), "Stardew Valley", None, &[], false).await;
    let app = test_app!(store);

    let req = test::TestRequest::get()
        .uri("/api/v1/othersearch/searchbyqueryall?query=stardew&limit=5")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["titles"].as_array().unwrap().len(), 1);
    assert_eq!(body["titles"][0]["titleSTR"], "Stardew Valley");
    assert!(body["products"].as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn test_malformed_json_body() {
    let app = test_app!(setup_store().await);

    let req = test::TestRequest::post()
        .uri("/api/v1/tag")
        .insert_header((header::AUTHORIZATION, admin_token(ObjectId::new())))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"tagSTR\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}
