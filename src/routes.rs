mod runs;

pub use runs::{LanguageSummary, RunSubmission, get_languages_handler, post_run_handler};

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponse {
    reason: &'static str,
    code: u32,
}

#[derive(Serialize)]
struct ErrorResponseWithMessage {
    reason: &'static str,
    code: u32,
    message: String,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    });
    InternalError::from_response(err, response).into()
}
