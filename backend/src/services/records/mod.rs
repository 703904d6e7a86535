//! # Record Service Module
//!
//! Read access to stored scan records.
//!
//! ## Sub-modules:
//! - `get`: looks a record up by its BAPP serial.

mod get;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/records";

/// *   **`GET /{sn_bapp}`**: `{success, record}` or 404 with a message.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/{sn_bapp}", get().to(get::process))
}
