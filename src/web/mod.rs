pub mod admin;
pub mod categories;
pub mod images;
pub mod products;
pub mod reviews;
pub mod search;
pub mod suggestions;
pub mod tags;
pub mod titles;
pub mod users;

use crate::error::ApiError;
use crate::query::parse_object_id;
use crate::store::DocumentStore;
use actix_web::web::{self, Data};
use bson::oid::ObjectId;

/// Store handle shared by every handler.
pub type Store = Data<dyn DocumentStore>;

/// Configures the web app by adding services from each web file.
///
/// Every route lives under `/api/v1`. Within a file, fixed segments such as
/// `/user/me` are registered before `/user/{id}`.
pub fn configure(conf: &mut web::ServiceConfig) {
    conf.app_data(json_config())
        .app_data(query_config())
        .service(
            web::scope("/api/v1")
                .configure(users::configure)
                .configure(categories::configure)
                .configure(tags::configure)
                .configure(titles::configure)
                .configure(products::configure)
                .configure(reviews::configure)
                .configure(suggestions::configure)
                .configure(images::configure)
                .configure(search::configure)
                .configure(admin::configure),
        );
}

/// Malformed JSON bodies answer with the same `{"error"}` shape as every
/// other client error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected JSON body: {}", err);
        ApiError::validation(err.to_string()).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected query string: {}", err);
        ApiError::validation(err.to_string()).into()
    })
}

/// Parse an id taken from the request path.
pub(crate) fn path_id(field: &str, path: web::Path<String>) -> Result<ObjectId, ApiError> {
    parse_object_id(field, &path.into_inner())
}
