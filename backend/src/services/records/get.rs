use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::responses::{MessageResponse, RecordResponse};
use log::error;

/// `GET /api/records/{sn_bapp}`
pub async fn process(state: web::Data<AppState>, sn_bapp: web::Path<String>) -> impl Responder {
    let sn_bapp = sn_bapp.into_inner();
    let store = state.store.clone();

    match web::block(move || store.find_by_serial(&sn_bapp)).await {
        Ok(Ok(Some(record))) => HttpResponse::Ok().json(RecordResponse {
            success: true,
            record,
        }),
        Ok(Ok(None)) => HttpResponse::NotFound().json(MessageResponse::error("Record not found")),
        Ok(Err(e)) => {
            error!("Record lookup failed: {}", e);
            HttpResponse::InternalServerError().json(MessageResponse::error(e.to_string()))
        }
        Err(e) => {
            error!("Record lookup task failed: {}", e);
            HttpResponse::InternalServerError().json(MessageResponse::error("Record lookup failed"))
        }
    }
}
