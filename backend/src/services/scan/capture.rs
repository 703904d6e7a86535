//! # Scan Capture Service
//!
//! `GET /api/scan?profile=<name>`
//!
//! The whole capture is blocking (profile publishing, the scan tool run and
//! the page encoding), so it is moved onto tokio's blocking pool and the
//! handler only awaits the result. Every failure becomes a
//! `{success: false, message}` body; the scan tool's own diagnostic text is
//! part of the message so the operator can see what the device reported.

use crate::error::{CaptureError, ToolError};
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::requests::ScanQuery;
use common::responses::ScanResponse;
use log::error;

pub async fn process(state: web::Data<AppState>, query: web::Query<ScanQuery>) -> impl Responder {
    let scanner = state.scanner.clone();
    let profile = query.into_inner().profile;

    let result = tokio::task::spawn_blocking(move || scanner.scan(profile.as_deref())).await;

    match result {
        Ok(Ok(sheets)) => HttpResponse::Ok().json(ScanResponse::ok(sheets)),
        Ok(Err(e)) => {
            error!("Scan failed: {}", e);
            error_status(&e).json(ScanResponse::error(e.to_string()))
        }
        Err(e) => {
            error!("Scan task panicked or was cancelled: {}", e);
            HttpResponse::InternalServerError().json(ScanResponse::error("Scan task failed"))
        }
    }
}

fn error_status(err: &CaptureError) -> actix_web::HttpResponseBuilder {
    match err {
        CaptureError::Tool(ToolError::TimedOut(_)) => HttpResponse::GatewayTimeout(),
        _ => HttpResponse::InternalServerError(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::scanner::device::test_support::FixedResolver;
    use crate::scanner::Scanner;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn state_with_tool(tool: std::path::PathBuf) -> (TempDir, AppState) {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            scan_tool_path: tool,
            profiles_source: dir.path().join("missing-profiles.xml"),
            profiles_destination_dir: Some(dir.path().join("naps2")),
            temp_root: dir.path().join("tmp"),
            storage_dir: dir.path().join("scans"),
            database_path: dir.path().join("records.sqlite"),
            ..AppConfig::default()
        };
        let mut state = AppState::new(config.clone());
        state.scanner = Arc::new(
            Scanner::from_config(&config).with_resolver(Box::new(FixedResolver(None))),
        );
        (dir, state)
    }

    #[actix_web::test]
    async fn missing_scan_tool_reports_failure_body() {
        let (dir, state) = state_with_tool(std::path::PathBuf::from("/nonexistent/naps2"));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/scan").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: ScanResponse = test::read_body_json(resp).await;
        assert!(!body.success);
        assert!(body.data.is_none());
        assert!(body.message.unwrap().contains("/nonexistent/naps2"));
        drop(dir);
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn three_pages_come_back_as_two_sheets() {
        use crate::scanner::tool::test_support::fake_tool;

        let tools = tempdir().unwrap();
        let tool = fake_tool(
            tools.path(),
            r#"for n in 0001 0002 0003; do
  f=$(printf '%s' "$2" | sed "s/\$(nnnn)/$n/")
  printf 'page' > "$f"
done"#,
        );
        let (_dir, state) = state_with_tool(tool);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/scan?profile=Duplex")
            .to_request();
        let body: ScanResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.success);
        let sheets = body.data.unwrap();
        assert_eq!(sheets.len(), 2);
        assert!(sheets[0].front.starts_with("data:image/jpeg;base64,"));
        assert!(sheets[0].back.is_some());
        assert!(sheets[1].back.is_none());
    }
}
