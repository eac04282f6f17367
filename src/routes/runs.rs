use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};

use super::{ErrorResponse, ErrorResponseWithMessage};
use crate::exec::{ExecutionRequest, RunError};
use crate::workspace::WorkspaceRegistry;

/// Body of `POST /runs`: one run request tied to the workspace that issued
/// it, so rapid re-runs from the same editor supersede each other.
#[derive(Serialize, Deserialize, Debug)]
pub struct RunSubmission {
    pub workspace_id: String,
    #[serde(flatten)]
    pub request: ExecutionRequest,
}

/// One entry of `GET /languages`; `runnable: false` tells the UI to route
/// the language to the live-preview surface instead of `POST /runs`.
#[derive(Serialize, Deserialize, Debug)]
pub struct LanguageSummary {
    pub name: String,
    pub runnable: bool,
}

#[post("/runs")]
pub async fn post_run_handler(
    registry: web::Data<WorkspaceRegistry>,
    body: web::Json<RunSubmission>,
) -> impl Responder {
    let RunSubmission {
        workspace_id,
        request,
    } = body.into_inner();

    // All execution outcomes, InternalError included, are 200s: the outcome
    // field is payload, not transport state.
    match registry.submit(&workspace_id, &request).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(RunError::PreviewOnly(language)) => {
            log::info!("Refused run of preview-only language {language}");
            HttpResponse::BadRequest().json(ErrorResponseWithMessage {
                reason: "ERR_INVALID_STATE",
                code: 2,
                message: format!("Language {language} renders through the live preview."),
            })
        }
        Err(RunError::Superseded) => HttpResponse::Conflict().json(ErrorResponse {
            reason: "ERR_SUPERSEDED",
            code: 4,
        }),
    }
}

#[get("/languages")]
pub async fn get_languages_handler(registry: web::Data<WorkspaceRegistry>) -> impl Responder {
    let languages: Vec<LanguageSummary> = registry
        .dispatcher()
        .languages()
        .iter()
        .map(|l| LanguageSummary {
            name: l.name.clone(),
            runnable: l.is_runnable(),
        })
        .collect();

    HttpResponse::Ok().json(languages)
}
