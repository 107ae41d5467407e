use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use serde::Serialize;

use evalgate_domain::code_status::CodeStatus;

use crate::error::IntakeServiceError;
use crate::state::AppState;
use crate::usecase::code::{ApplyCodeUseCase, VerifyCodeUseCase};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct VerifyCodeResponse {
    pub valid: bool,
    pub status: CodeStatus,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ApplyCodeResponse {
    pub success: bool,
    pub code: String,
    pub message: &'static str,
}

fn verify_message(status: CodeStatus) -> &'static str {
    match status {
        CodeStatus::Used => "code already used, editing may continue",
        _ => "code verified",
    }
}

// ── GET /api/verify-code/{code} ──────────────────────────────────────────────

pub async fn verify_code(
    State(state): State<AppState>,
    WithRejection(Path(code), _): WithRejection<Path<String>, IntakeServiceError>,
) -> Result<Json<VerifyCodeResponse>, IntakeServiceError> {
    let uc = VerifyCodeUseCase {
        codes: state.code_repo(),
    };
    let status = uc.execute(&code).await?;
    Ok(Json(VerifyCodeResponse {
        valid: true,
        status,
        message: verify_message(status),
    }))
}

// ── POST /api/apply-code ─────────────────────────────────────────────────────

pub async fn apply_code(
    State(state): State<AppState>,
) -> Result<Json<ApplyCodeResponse>, IntakeServiceError> {
    let uc = ApplyCodeUseCase {
        codes: state.code_repo(),
    };
    let code = uc.execute().await?;
    Ok(Json(ApplyCodeResponse {
        success: true,
        code: code.code,
        message: "code issued",
    }))
}
