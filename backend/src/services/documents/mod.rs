//! # Document Service Module
//!
//! Turns a reviewed scan into a stored PDF plus its record.
//!
//! ## Sub-modules:
//! - `save`: validates the payload, renders the PDF and registers it.

mod save;

use actix_web::web::{method, post, resource, scope};
use actix_web::http::Method;
use actix_web::Scope;

const API_PATH: &str = "/api/documents";

/// Routes under `/api/documents`.
///
/// *   **`POST /save`**: JSON `SaveRequest`. Answers `{success, message}` with
///     400 for invalid input, 409 when the serial or the output file already
///     exists, and 500 for any other failure.
/// *   **`OPTIONS /save`**: CORS preflight for browser clients posting JSON.
pub fn configure_routes() -> Scope {
    scope(API_PATH).service(
        resource("/save")
            .route(post().to(save::process))
            .route(method(Method::OPTIONS).to(super::preflight)),
    )
}
