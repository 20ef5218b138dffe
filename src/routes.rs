mod languages;
mod run;

pub use languages::{LanguageInfo, get_languages_handler};
pub use run::{preflight_handler, run_handler};

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

use crate::sandbox::Status;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct ServerErrorResponse {
    pub error: String,
    pub status: Status,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        error: format!("Invalid request body: {err}"),
    });
    InternalError::from_response(err, response).into()
}
