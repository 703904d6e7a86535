//! HTTP surface of the bridge. Each sub-module owns one `/api/...` scope and
//! exposes it through `configure_routes()`.

pub mod documents;
pub mod records;
pub mod scan;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use common::responses::MessageResponse;
use log::warn;

/// Empty answer to a CORS preflight. The allow headers come from the
/// `DefaultHeaders` middleware registered in `main`.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// JSON extractor settings shared by every route. Bodies that are too large
/// or do not match the request type are answered with the same
/// `{success: false, message}` shape as handler errors.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let status = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                _ => StatusCode::BAD_REQUEST,
            };
            let message = err.to_string();
            warn!("Rejected request body: {}", message);
            let response = HttpResponse::build(status).json(MessageResponse::error(message));
            InternalError::from_response(err, response).into()
        })
}
