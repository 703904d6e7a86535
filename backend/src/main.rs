mod config;
mod document;
mod error;
mod scanner;
mod services;
mod state;
mod store;

use crate::config::AppConfig;
use crate::state::AppState;
use actix_files::Files;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{error, info};
use std::fs;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::from_env();
    fs::create_dir_all(&config.storage_dir)?;

    let state = AppState::new(config.clone());
    if let Err(e) = state.store.init() {
        error!(
            "Cannot initialise record database {}: {}",
            config.database_path.display(),
            e
        );
        return Err(std::io::Error::other(e));
    }

    info!(
        "Scan tool {} with default profile {:?}",
        config.scan_tool_path.display(),
        config.default_profile
    );
    info!(
        "Scan profiles published from {}",
        state.scanner.profiles().source().display()
    );
    info!("Documents stored in {}", config.storage_dir.display());
    info!("Server running at http://{}:{}", config.host, config.port);

    let data = web::Data::new(state);
    let storage_dir = config.storage_dir.clone();
    let max_body_bytes = config.max_body_bytes;

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "Content-Type")),
            )
            .app_data(services::json_config(max_body_bytes))
            .app_data(data.clone())
            .service(services::scan::configure_routes())
            .service(services::documents::configure_routes())
            .service(services::records::configure_routes())
            .service(Files::new("/files", &storage_dir))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
