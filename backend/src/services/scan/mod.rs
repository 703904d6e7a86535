//! # Scan Service Module
//!
//! Endpoints that drive the physical scanner.
//!
//! ## Sub-modules:
//! - `capture`: runs one duplex capture and returns the pages as sheets.
//! - `profiles`: lists the scan profiles the operator can choose from.

mod capture;
mod profiles;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/scan";

/// Routes under `/api/scan`.
///
/// *   **`GET ?profile=<name>`**: publishes the device-patched profiles, scans
///     with the named profile (or the configured default) and answers with
///     `{success, data: [{front, back?}]}`.
/// *   **`GET /profiles`**: `{success, profiles: [displayName, ...]}` read from
///     the shipped profile definition.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(capture::process))
        .route("/profiles", get().to(profiles::process))
}
