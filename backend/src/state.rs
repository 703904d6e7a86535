//! Shared, read-only application state handed to every handler.
//!
//! Built once in `main.rs` from [`AppConfig`] and registered as `web::Data`.
//! Nothing in here changes between requests; the record store is the only
//! component that carries state across them, and it keeps that state in the
//! database.

use crate::config::AppConfig;
use crate::document::DocumentAssembler;
use crate::scanner::Scanner;
use crate::store::RecordStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Blocking; handlers call it from `spawn_blocking`.
    pub scanner: Arc<Scanner>,
    pub assembler: DocumentAssembler,
    pub store: RecordStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            scanner: Arc::new(Scanner::from_config(&config)),
            assembler: DocumentAssembler::new(&config.font_dir, config.font_family.clone()),
            store: RecordStore::new(&config.database_path),
            config: Arc::new(config),
        }
    }
}
