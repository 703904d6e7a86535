//! # Document Save Service
//!
//! `POST /api/documents/save`
//!
//! ## Workflow:
//!
//! 1.  **Validation**: `npsn`, `sn_bapp` and `image_front` must be present.
//!     The two identifiers become the output file name, so they may not
//!     contain path separators, `..` or control characters. Both images are
//!     base64 decoded and sniffed here, so malformed input is rejected before
//!     anything touches the disk.
//!
//! 2.  **Storage**: the storage directory is created if missing and the output
//!     path is fixed to `<storage>/<npsn>_<sn_bapp>.pdf`.
//!
//! 3.  **Create**: `RecordStore::create_record` runs the duplicate checks,
//!     asks the assembler to render the single sheet and inserts the row,
//!     removing the file again if the insert loses.
//!
//! Steps 2 and 3 block, so the whole pipeline runs on the blocking pool.

use crate::document::page_image::decode_image;
use crate::error::SaveError;
use crate::scanner::pairing::PagePair;
use crate::state::AppState;
use crate::store::NewRecord;
use actix_web::{web, HttpResponse, Responder};
use common::model::record::ScanRecord;
use common::requests::SaveRequest;
use common::responses::MessageResponse;
use log::{error, info, warn};
use std::fs;

const SAVED_MESSAGE: &str = "Document merged into a PDF and saved";

pub async fn process(state: web::Data<AppState>, payload: web::Json<SaveRequest>) -> impl Responder {
    let request = payload.into_inner();
    let state = state.into_inner();

    let result = tokio::task::spawn_blocking(move || save_document(&state, request)).await;

    match result {
        Ok(Ok(record)) => {
            info!("Saved {} as {}", record.sn_bapp, record.path);
            HttpResponse::Ok().json(MessageResponse::ok(SAVED_MESSAGE))
        }
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Save task panicked or was cancelled: {}", e);
            HttpResponse::InternalServerError().json(MessageResponse::error("Save task failed"))
        }
    }
}

fn error_response(err: &SaveError) -> HttpResponse {
    match err {
        SaveError::Invalid(_) => {
            warn!("Rejected save request: {}", err);
            HttpResponse::BadRequest().json(MessageResponse::error(err.to_string()))
        }
        SaveError::Create(create) if create.is_conflict() => {
            warn!("Save conflict: {}", err);
            HttpResponse::Conflict().json(MessageResponse::error(err.to_string()))
        }
        _ => {
            error!("Save failed: {}", err);
            HttpResponse::InternalServerError().json(MessageResponse::error(err.to_string()))
        }
    }
}

pub fn save_document(state: &AppState, request: SaveRequest) -> Result<ScanRecord, SaveError> {
    let npsn = valid_identifier("npsn", &request.npsn)?;
    let sn_bapp = valid_identifier("sn_bapp", &request.sn_bapp)?;

    if request.image_front.trim().is_empty() {
        return Err(SaveError::Invalid("image_front is required".to_string()));
    }
    let front = decode_side("image_front", &request.image_front)?;
    let back = match request.image_back.as_deref().map(str::trim) {
        Some(encoded) if !encoded.is_empty() => Some(decode_side("image_back", encoded)?),
        _ => None,
    };

    let storage_dir = &state.config.storage_dir;
    fs::create_dir_all(storage_dir).map_err(|source| SaveError::Storage {
        path: storage_dir.clone(),
        source,
    })?;

    let base_name = format!("{}_{}", npsn, sn_bapp);
    let record = NewRecord {
        doc_name: request.doc_name.trim().to_string(),
        npsn: npsn.to_string(),
        sn_bapp: sn_bapp.to_string(),
        hasil_cek: request.hasil_cek.trim().to_string(),
        kode: request
            .kode
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()),
        path: storage_dir.join(format!("{}.pdf", base_name)),
    };
    let sheet = [PagePair { front, back }];

    let created = state.store.create_record(record, |path| {
        state.assembler.assemble(&sheet, path, &base_name)
    })?;
    Ok(created)
}

/// Characters Windows refuses in file names, on top of the separators.
const FORBIDDEN_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Device names Windows reserves regardless of extension.
const RESERVED_NAMES: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

/// Trimmed identifier, or `Invalid` when it cannot safely be part of a file
/// name on any platform the bridge runs on.
fn valid_identifier<'a>(field: &str, value: &'a str) -> Result<&'a str, SaveError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SaveError::Invalid(format!("{} is required", field)));
    }
    if value.contains(FORBIDDEN_CHARS)
        || value.contains("..")
        || value.ends_with('.')
        || value.chars().any(char::is_control)
    {
        return Err(SaveError::Invalid(format!(
            "{} contains characters not allowed in a file name",
            field
        )));
    }
    if is_reserved_name(value) {
        return Err(SaveError::Invalid(format!(
            "{} is a reserved device name",
            field
        )));
    }
    Ok(value)
}

fn is_reserved_name(value: &str) -> bool {
    let stem = value.split('.').next().unwrap_or(value).trim_end();
    if RESERVED_NAMES.iter().any(|name| stem.eq_ignore_ascii_case(name)) {
        return true;
    }
    // COM1..COM9 and LPT1..LPT9
    let upper = stem.to_ascii_uppercase();
    match upper.strip_prefix("COM").or_else(|| upper.strip_prefix("LPT")) {
        Some(digit) => digit.len() == 1 && matches!(digit.as_bytes()[0], b'1'..=b'9'),
        None => false,
    }
}

fn decode_side(field: &str, encoded: &str) -> Result<Vec<u8>, SaveError> {
    let bytes = decode_image(encoded)
        .map_err(|e| SaveError::Invalid(format!("{} is not valid base64: {}", field, e)))?;
    if image::guess_format(&bytes).is_err() {
        return Err(SaveError::Invalid(format!("{} is not a recognised image", field)));
    }
    Ok(bytes)
}
