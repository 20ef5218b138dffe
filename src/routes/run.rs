use actix_web::{HttpResponse, Responder, web};

use super::{ErrorResponse, ServerErrorResponse};
use crate::config::Config;
use crate::sandbox::{self, ExecutionRequest, RunError, Status};

pub async fn run_handler(
    config: web::Data<Config>,
    body: web::Json<ExecutionRequest>,
) -> impl Responder {
    let request = body.into_inner();

    match sandbox::execute(&request, &config).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(RunError::Client(e)) => {
            log::info!("Rejected submission: {e}");
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
        Err(RunError::Server(e)) => {
            log::error!("Execution failed: {e:#}");
            HttpResponse::InternalServerError().json(ServerErrorResponse {
                error: format!("{e:#}"),
                status: Status::ServerError,
            })
        }
    }
}

/// Answers CORS preflight requests for `/run`
pub async fn preflight_handler() -> impl Responder {
    HttpResponse::NoContent()
        .insert_header(("Access-Control-Allow-Methods", "POST, OPTIONS"))
        .insert_header(("Access-Control-Allow-Headers", "Content-Type"))
        .insert_header(("Access-Control-Max-Age", "86400"))
        .finish()
}
