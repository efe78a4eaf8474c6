//! User account endpoints

use super::{path_id, Store};
use crate::auth::{AdminPrincipal, Principal};
use crate::error::ApiError;
use crate::orm::users::{self, AdminFlag, NewUser, PasswordChange, UserPatch, UserSearch, UserUpdate};
use crate::render;
use actix_web::http::StatusCode;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_user)
        .service(view_me)
        .service(search_users)
        .service(change_password)
        .service(restore_user)
        .service(set_admin)
        .service(view_user)
        .service(update_user)
        .service(patch_user)
        .service(delete_user);
}

fn user_response(status: StatusCode, user: &users::Model) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::build(status).json(render::model(user, users::HIDDEN_FIELDS)?))
}

fn ok(user: &users::Model) -> Result<HttpResponse, ApiError> {
    user_response(StatusCode::OK, user)
}

/// POST /user - Register
#[post("/user")]
async fn create_user(store: Store, form: web::Json<NewUser>) -> Result<HttpResponse, ApiError> {
    let user = users::create(store.get_ref(), form.into_inner()).await?;
    user_response(StatusCode::CREATED, &user)
}

/// GET /user/me - The caller's own account
#[get("/user/me")]
async fn view_me(store: Store, principal: Principal) -> Result<HttpResponse, ApiError> {
    ok(&users::get(store.get_ref(), principal.user_id).await?)
}

/// GET /user - Admin search
#[get("/user")]
async fn search_users(
    store: Store,
    _admin: AdminPrincipal,
    query: web::Query<UserSearch>,
) -> Result<HttpResponse, ApiError> {
    let found = users::search(store.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(render::models(&found, users::HIDDEN_FIELDS)?))
}

#[patch("/user/changepassword/{id}")]
async fn change_password(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<PasswordChange>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    users::change_password(store.get_ref(), &principal, id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password changed" })))
}

#[patch("/user/restoreuser/{id}")]
async fn restore_user(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    ok(&users::restore(store.get_ref(), id).await?)
}

/// PATCH /user/admin/{id} - Grant or revoke admin rights
#[patch("/user/admin/{id}")]
async fn set_admin(
    store: Store,
    _admin: AdminPrincipal,
    path: web::Path<String>,
    form: web::Json<AdminFlag>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    ok(&users::set_admin(store.get_ref(), id, &form).await?)
}

#[get("/user/{id}")]
async fn view_user(store: Store, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    ok(&users::get(store.get_ref(), id).await?)
}

#[put("/user/{id}")]
async fn update_user(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<UserUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    ok(&users::update(store.get_ref(), &principal, id, form.into_inner()).await?)
}

#[patch("/user/{id}")]
async fn patch_user(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
    form: web::Json<UserPatch>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    ok(&users::patch(store.get_ref(), &principal, id, form.into_inner()).await?)
}

/// DELETE /user/{id} - Soft-delete the caller's own account
#[delete("/user/{id}")]
async fn delete_user(
    store: Store,
    principal: Principal,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path_id("user", path)?;
    ok(&users::soft_delete(store.get_ref(), &principal, id).await?)
}
