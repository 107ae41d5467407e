use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evalgate_domain::code_status::CodeStatus;
use evalgate_domain::pagination::PageRequest;

use crate::domain::types::{EvaluationFilter, ModelStat, PatientStat};
use crate::error::IntakeServiceError;
use crate::handlers::evaluation::EvaluationResponse;
use crate::state::AppState;
use crate::usecase::code::{ExpireCodeUseCase, GenerateCodesInput, GenerateCodesUseCase};
use crate::usecase::evaluation::{GetEvaluationUseCase, ListEvaluationsUseCase};
use crate::usecase::report::{
    ClearDatabaseUseCase, CodeWithStats, GetEvaluationMatrixUseCase, GetStatsUseCase,
    ListCodesInput, ListCodesWithStatsUseCase, MatrixCell, Stats,
};

// ── Request types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodesRequest {
    /// Signed so that negative and oversized values reach validation.
    #[serde(default = "default_count")]
    pub count: i64,
    pub batch_id: Option<String>,
    pub description: Option<String>,
}

fn default_count() -> i64 {
    1
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeListQuery {
    pub status: Option<String>,
    pub batch_id: Option<String>,
}

#[derive(Deserialize)]
pub struct EvaluationListQuery {
    pub code: Option<String>,
    pub patient: Option<String>,
    pub model: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodesResponse {
    pub success: bool,
    pub count: usize,
    pub batch_id: String,
    pub codes: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub code: String,
    pub status: CodeStatus,
    #[serde(serialize_with = "evalgate_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "evalgate_core::serde::to_rfc3339_ms_opt")]
    pub used_at: Option<DateTime<Utc>>,
    pub batch_id: Option<String>,
    pub description: Option<String>,
    pub evaluation_count: u64,
    pub completion_rate: u32,
}

impl From<CodeWithStats> for CodeResponse {
    fn from(c: CodeWithStats) -> Self {
        Self {
            code: c.code.code,
            status: c.code.status,
            created_at: c.code.created_at,
            used_at: c.code.used_at,
            batch_id: c.code.batch_id,
            description: c.code.description,
            evaluation_count: c.evaluation_count,
            completion_rate: c.completion_rate,
        }
    }
}

#[derive(Serialize)]
pub struct CodeListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<CodeResponse>,
}

#[derive(Serialize)]
pub struct ExpireCodeResponse {
    pub success: bool,
    pub code: String,
    pub status: CodeStatus,
}

#[derive(Serialize)]
pub struct CodeCountsResponse {
    pub total: u64,
    pub active: u64,
    pub used: u64,
    pub expired: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatResponse {
    pub model: String,
    pub count: u64,
    pub avg_score: f64,
}

impl From<ModelStat> for ModelStatResponse {
    fn from(s: ModelStat) -> Self {
        Self {
            model: s.model,
            count: s.count,
            avg_score: s.avg_score,
        }
    }
}

#[derive(Serialize)]
pub struct PatientStatResponse {
    pub patient: String,
    pub count: u64,
}

impl From<PatientStat> for PatientStatResponse {
    fn from(s: PatientStat) -> Self {
        Self {
            patient: s.patient,
            count: s.count,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStatsResponse {
    pub total: u64,
    pub avg_score: f64,
    pub today: u64,
    pub active_models: u64,
    pub by_model: Vec<ModelStatResponse>,
    pub by_patient: Vec<PatientStatResponse>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub codes: CodeCountsResponse,
    pub evaluations: EvaluationStatsResponse,
}

impl From<Stats> for StatsResponse {
    fn from(s: Stats) -> Self {
        Self {
            success: true,
            codes: CodeCountsResponse {
                total: s.codes.total,
                active: s.codes.active,
                used: s.codes.used,
                expired: s.codes.expired,
            },
            evaluations: EvaluationStatsResponse {
                total: s.evaluations.total,
                avg_score: s.evaluations.avg_score,
                today: s.evaluations.today,
                active_models: s.evaluations.active_models,
                by_model: s
                    .evaluations
                    .by_model
                    .into_iter()
                    .map(ModelStatResponse::from)
                    .collect(),
                by_patient: s
                    .evaluations
                    .by_patient
                    .into_iter()
                    .map(PatientStatResponse::from)
                    .collect(),
            },
        }
    }
}

#[derive(Serialize)]
pub struct EvaluationPageResponse {
    pub success: bool,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<EvaluationResponse>,
}

#[derive(Serialize)]
pub struct EvaluationDetailResponse {
    pub success: bool,
    pub data: EvaluationResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearDatabaseResponse {
    pub success: bool,
    pub deleted_codes: u64,
    pub deleted_evaluations: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixCellResponse {
    pub avg: f64,
    pub std_dev: f64,
    pub count: u64,
    pub scores: Vec<f64>,
}

impl From<MatrixCell> for MatrixCellResponse {
    fn from(c: MatrixCell) -> Self {
        Self {
            avg: c.avg,
            std_dev: c.std_dev,
            count: c.count,
            scores: c.scores,
        }
    }
}

#[derive(Serialize)]
pub struct EvaluationMatrixResponse {
    pub success: bool,
    pub models: Vec<String>,
    pub patients: Vec<String>,
    pub matrix: BTreeMap<String, BTreeMap<String, MatrixCellResponse>>,
}

// ── POST /api/admin/generate-codes ───────────────────────────────────────────

pub async fn generate_codes(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<GenerateCodesRequest>, IntakeServiceError>,
) -> Result<Json<GenerateCodesResponse>, IntakeServiceError> {
    let uc = GenerateCodesUseCase {
        codes: state.code_repo(),
    };
    let batch = uc
        .execute(GenerateCodesInput {
            count: body.count,
            batch_id: body.batch_id,
            description: body.description,
        })
        .await?;

    let codes: Vec<String> = batch.codes.into_iter().map(|c| c.code).collect();
    Ok(Json(GenerateCodesResponse {
        success: true,
        count: codes.len(),
        batch_id: batch.batch_id,
        codes,
    }))
}

// ── GET /api/admin/codes ─────────────────────────────────────────────────────

pub async fn list_codes(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<CodeListQuery>, IntakeServiceError>,
) -> Result<Json<CodeListResponse>, IntakeServiceError> {
    let uc = ListCodesWithStatsUseCase {
        codes: state.code_repo(),
        evaluations: state.evaluation_repo(),
        expected_per_code: state.expected_evaluations_per_code,
    };
    let data: Vec<CodeResponse> = uc
        .execute(ListCodesInput {
            status: query.status,
            batch_id: query.batch_id,
        })
        .await?
        .into_iter()
        .map(CodeResponse::from)
        .collect();
    Ok(Json(CodeListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

// ── POST /api/admin/codes/{code}/expire ──────────────────────────────────────

pub async fn expire_code(
    State(state): State<AppState>,
    WithRejection(Path(code), _): WithRejection<Path<String>, IntakeServiceError>,
) -> Result<Json<ExpireCodeResponse>, IntakeServiceError> {
    let uc = ExpireCodeUseCase {
        codes: state.code_repo(),
    };
    let code = uc.execute(&code).await?;
    Ok(Json(ExpireCodeResponse {
        success: true,
        code: code.into_inner(),
        status: CodeStatus::Expired,
    }))
}

// ── GET /api/admin/stats ─────────────────────────────────────────────────────

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, IntakeServiceError> {
    let uc = GetStatsUseCase {
        codes: state.code_repo(),
        evaluations: state.evaluation_repo(),
    };
    Ok(Json(uc.execute().await?.into()))
}

// ── GET /api/admin/evaluations ───────────────────────────────────────────────

pub async fn list_evaluations(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EvaluationListQuery>, IntakeServiceError>,
) -> Result<Json<EvaluationPageResponse>, IntakeServiceError> {
    let defaults = PageRequest::default();
    let page = PageRequest {
        page: query.page.unwrap_or(defaults.page),
        limit: query.limit.unwrap_or(defaults.limit),
    };
    let filter = EvaluationFilter {
        code: query.code,
        patient: query.patient,
        model: query.model,
    };

    let uc = ListEvaluationsUseCase {
        evaluations: state.evaluation_repo(),
    };
    let result = uc.execute(filter, page).await?;
    Ok(Json(EvaluationPageResponse {
        success: true,
        total: result.total,
        page: result.page,
        limit: result.limit,
        data: result
            .items
            .into_iter()
            .map(EvaluationResponse::from)
            .collect(),
    }))
}

// ── GET /api/admin/evaluation/{id} ───────────────────────────────────────────

pub async fn get_evaluation(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, IntakeServiceError>,
) -> Result<Json<EvaluationDetailResponse>, IntakeServiceError> {
    let uc = GetEvaluationUseCase {
        evaluations: state.evaluation_repo(),
    };
    let evaluation = uc.execute(&id).await?;
    Ok(Json(EvaluationDetailResponse {
        success: true,
        data: evaluation.into(),
    }))
}

// ── POST /api/admin/clear-database ───────────────────────────────────────────

pub async fn clear_database(
    State(state): State<AppState>,
) -> Result<Json<ClearDatabaseResponse>, IntakeServiceError> {
    let uc = ClearDatabaseUseCase {
        maintenance: state.maintenance(),
    };
    let cleared = uc.execute().await?;
    Ok(Json(ClearDatabaseResponse {
        success: true,
        deleted_codes: cleared.codes,
        deleted_evaluations: cleared.evaluations,
    }))
}

// ── GET /api/admin/evaluation-matrix ─────────────────────────────────────────

pub async fn get_evaluation_matrix(
    State(state): State<AppState>,
) -> Result<Json<EvaluationMatrixResponse>, IntakeServiceError> {
    let uc = GetEvaluationMatrixUseCase {
        evaluations: state.evaluation_repo(),
    };
    let matrix = uc.execute().await?;
    Ok(Json(EvaluationMatrixResponse {
        success: true,
        models: matrix.models,
        patients: matrix.patients,
        matrix: matrix
            .cells
            .into_iter()
            .map(|(model, row)| {
                let row = row
                    .into_iter()
                    .map(|(patient, cell)| (patient, MatrixCellResponse::from(cell)))
                    .collect();
                (model, row)
            })
            .collect(),
    }))
}
