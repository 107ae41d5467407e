use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::types::{Evaluation, Scores};
use crate::error::IntakeServiceError;
use crate::state::AppState;
use crate::usecase::evaluation::{
    GetEvaluationsByCodeUseCase, SubmitEvaluationInput, SubmitEvaluationUseCase,
};

// ── Request / response types ─────────────────────────────────────────────────

/// Body of `POST /api/submit-evaluation`. Field names follow the browser form;
/// required fields are optional here so their absence maps to `MissingData`.
#[derive(Deserialize)]
pub struct SubmitEvaluationRequest {
    pub code: Option<String>,
    pub patient: Option<String>,
    pub model: Option<String>,
    pub scores: Option<Scores>,
    pub total_score: Option<f64>,
    #[serde(default)]
    pub overall_comment: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEvaluationResponse {
    pub success: bool,
    pub evaluation_id: Uuid,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct EvaluationResponse {
    pub id: Uuid,
    pub code: String,
    pub patient: String,
    pub model: String,
    pub scores: Scores,
    pub total_score: f64,
    pub overall_comment: String,
    #[serde(serialize_with = "evalgate_core::serde::to_rfc3339_ms")]
    pub timestamp: DateTime<Utc>,
    #[serde(
        rename = "submittedAt",
        serialize_with = "evalgate_core::serde::to_rfc3339_ms"
    )]
    pub submitted_at: DateTime<Utc>,
}

impl From<Evaluation> for EvaluationResponse {
    fn from(e: Evaluation) -> Self {
        Self {
            id: e.id.0,
            code: e.code,
            patient: e.patient,
            model: e.model,
            scores: e.scores,
            total_score: e.total_score,
            overall_comment: e.overall_comment,
            timestamp: e.created_at,
            submitted_at: e.submitted_at,
        }
    }
}

#[derive(Serialize)]
pub struct EvaluationListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<EvaluationResponse>,
}

// ── POST /api/submit-evaluation ──────────────────────────────────────────────

pub async fn submit_evaluation(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<SubmitEvaluationRequest>, IntakeServiceError>,
) -> Result<Json<SubmitEvaluationResponse>, IntakeServiceError> {
    let (Some(code), Some(patient), Some(model), Some(scores)) =
        (body.code, body.patient, body.model, body.scores)
    else {
        return Err(IntakeServiceError::MissingData);
    };

    let uc = SubmitEvaluationUseCase {
        codes: state.code_repo(),
        evaluations: state.evaluation_repo(),
    };
    let id = uc
        .execute(SubmitEvaluationInput {
            code,
            patient,
            model,
            scores,
            total_score: body.total_score,
            overall_comment: body.overall_comment,
        })
        .await?;

    Ok(Json(SubmitEvaluationResponse {
        success: true,
        evaluation_id: id.0,
        message: "evaluation saved",
    }))
}

// ── GET /api/evaluations/{code} ──────────────────────────────────────────────

pub async fn get_evaluations_by_code(
    State(state): State<AppState>,
    WithRejection(Path(code), _): WithRejection<Path<String>, IntakeServiceError>,
) -> Result<Json<EvaluationListResponse>, IntakeServiceError> {
    let uc = GetEvaluationsByCodeUseCase {
        evaluations: state.evaluation_repo(),
    };
    let data: Vec<EvaluationResponse> = uc
        .execute(&code)
        .await?
        .into_iter()
        .map(EvaluationResponse::from)
        .collect();
    Ok(Json(EvaluationListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}
