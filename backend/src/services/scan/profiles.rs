use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::responses::{MessageResponse, ProfilesResponse};
use log::error;

/// `GET /api/scan/profiles`
pub async fn process(state: web::Data<AppState>) -> impl Responder {
    let scanner = state.scanner.clone();

    match web::block(move || scanner.profiles().list_profiles()).await {
        Ok(Ok(profiles)) => HttpResponse::Ok().json(ProfilesResponse {
            success: true,
            profiles,
        }),
        Ok(Err(e)) => {
            error!("Cannot list scan profiles: {}", e);
            HttpResponse::InternalServerError().json(MessageResponse::error(e.to_string()))
        }
        Err(e) => {
            error!("Profile listing task failed: {}", e);
            HttpResponse::InternalServerError()
                .json(MessageResponse::error("Profile listing failed"))
        }
    }
}
