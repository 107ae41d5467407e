use chrono::Utc;
use tracing::info;

use evalgate_domain::code_status::CodeStatus;
use evalgate_domain::id::EvaluationId;
use evalgate_domain::pagination::{Page, PageRequest};

use crate::domain::repository::{CodeRepository, EvaluationRepository};
use crate::domain::types::{Evaluation, EvaluationFilter, Scores, sum_scores};
use crate::error::IntakeServiceError;
use crate::usecase::code::{load_usable_code, parse_code};

// ── SubmitEvaluation ─────────────────────────────────────────────────────────

pub struct SubmitEvaluationInput {
    pub code: String,
    pub patient: String,
    pub model: String,
    pub scores: Scores,
    /// Computed from `scores` when absent.
    pub total_score: Option<f64>,
    pub overall_comment: String,
}

pub struct SubmitEvaluationUseCase<C, E>
where
    C: CodeRepository,
    E: EvaluationRepository,
{
    pub codes: C,
    pub evaluations: E,
}

impl<C, E> SubmitEvaluationUseCase<C, E>
where
    C: CodeRepository,
    E: EvaluationRepository,
{
    pub async fn execute(
        &self,
        input: SubmitEvaluationInput,
    ) -> Result<EvaluationId, IntakeServiceError> {
        // 1. Re-validate the code exactly as verify does
        let code = parse_code(&input.code)?;
        let record = load_usable_code(&self.codes, &code).await?;

        let patient = input.patient.trim();
        let model = input.model.trim();
        if patient.is_empty() || model.is_empty() {
            return Err(IntakeServiceError::MissingData);
        }

        // 2. Insert-or-replace on (code, patient, model)
        let now = Utc::now();
        let total_score = input
            .total_score
            .unwrap_or_else(|| sum_scores(&input.scores));
        let evaluation = Evaluation {
            id: EvaluationId::new(),
            code: code.as_str().to_owned(),
            patient: patient.to_owned(),
            model: model.to_owned(),
            scores: input.scores,
            total_score,
            overall_comment: input.overall_comment,
            created_at: now,
            submitted_at: now,
        };
        let id = self.evaluations.upsert(&evaluation).await?;

        // 3. First accepted submission moves the code to used
        if record.status == CodeStatus::Active && self.codes.mark_used(&code, now).await? {
            info!(code = %code, "code marked used");
        }

        info!(
            code = %code,
            patient = %evaluation.patient,
            model = %evaluation.model,
            evaluation_id = %id,
            "evaluation stored"
        );
        Ok(id)
    }
}

// ── GetEvaluationsByCode ─────────────────────────────────────────────────────

pub struct GetEvaluationsByCodeUseCase<E: EvaluationRepository> {
    pub evaluations: E,
}

impl<E: EvaluationRepository> GetEvaluationsByCodeUseCase<E> {
    pub async fn execute(&self, raw: &str) -> Result<Vec<Evaluation>, IntakeServiceError> {
        let code = parse_code(raw)?;
        self.evaluations.list_by_code(&code).await
    }
}

// ── ListEvaluations (admin) ──────────────────────────────────────────────────

pub struct ListEvaluationsUseCase<E: EvaluationRepository> {
    pub evaluations: E,
}

impl<E: EvaluationRepository> ListEvaluationsUseCase<E> {
    pub async fn execute(
        &self,
        filter: EvaluationFilter,
        page: PageRequest,
    ) -> Result<Page<Evaluation>, IntakeServiceError> {
        let filter = EvaluationFilter {
            code: non_empty(filter.code),
            patient: non_empty(filter.patient),
            model: non_empty(filter.model),
        };
        self.evaluations.list(&filter, page.clamped()).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ── GetEvaluation (admin) ────────────────────────────────────────────────────

pub struct GetEvaluationUseCase<E: EvaluationRepository> {
    pub evaluations: E,
}

impl<E: EvaluationRepository> GetEvaluationUseCase<E> {
    pub async fn execute(&self, raw_id: &str) -> Result<Evaluation, IntakeServiceError> {
        let id: EvaluationId = raw_id.parse().map_err(|_| IntakeServiceError::InvalidId)?;
        self.evaluations
            .find_by_id(id)
            .await?
            .ok_or(IntakeServiceError::EvaluationNotFound)
    }
}
