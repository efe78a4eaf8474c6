/// Administration endpoints
use super::Store;
use crate::app_config;
use crate::auth::AdminPrincipal;
use crate::error::ApiError;
use crate::prune::{prune_soft_deleted, RetentionPolicy};
use actix_web::{delete, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(prune_all);
}

/// DELETE /admin/prune-all - Run a pruning sweep now
///
/// Answers 500 with the counts reached so far when any sweep failed.
#[delete("/admin/prune-all")]
async fn prune_all(store: Store, admin: AdminPrincipal) -> Result<HttpResponse, ApiError> {
    log::info!("Prune requested by admin {}", admin.0.user_id);
    let policy = RetentionPolicy::from_config(&app_config::retention());
    let report = prune_soft_deleted(store.get_ref(), &policy, chrono::Utc::now()).await;

    if report.is_complete() {
        Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Pruning completed",
            "result": report.counts(),
        })))
    } else {
        Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Pruning failed",
            "result": report.counts(),
            "errors": report.errors(),
        })))
    }
}
