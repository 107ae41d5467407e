#![allow(async_fn_in_trait)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use evalgate_domain::access_code::AccessCode;
use evalgate_domain::code_status::CodeStatus;
use evalgate_domain::id::EvaluationId;
use evalgate_domain::pagination::{Page, PageRequest};

use crate::domain::types::{
    ClearedCounts, Code, CodeFilter, Evaluation, EvaluationFilter, ModelStat, PatientStat,
    ScorePoint,
};
use crate::error::IntakeServiceError;

/// Repository for access codes.
pub trait CodeRepository: Send + Sync {
    async fn find(&self, code: &AccessCode) -> Result<Option<Code>, IntakeServiceError>;

    async fn exists(&self, code: &AccessCode) -> Result<bool, IntakeServiceError>;

    /// Insert a new code. Returns `false` if the code string is already taken;
    /// an existing row is never overwritten.
    async fn insert(&self, code: &Code) -> Result<bool, IntakeServiceError>;

    /// Transition `active` → `used`, setting `used_at`. Returns `true` only if
    /// this call performed the transition.
    async fn mark_used(
        &self,
        code: &AccessCode,
        at: DateTime<Utc>,
    ) -> Result<bool, IntakeServiceError>;

    /// Force a code into `expired`. Returns `false` if the code does not exist.
    async fn expire(&self, code: &AccessCode) -> Result<bool, IntakeServiceError>;

    /// Codes matching the filter, newest first.
    async fn list(&self, filter: &CodeFilter) -> Result<Vec<Code>, IntakeServiceError>;

    /// Number of codes in each status. Statuses with no codes may be absent.
    async fn count_by_status(&self) -> Result<HashMap<CodeStatus, u64>, IntakeServiceError>;
}

/// Repository for submitted evaluations.
pub trait EvaluationRepository: Send + Sync {
    /// Insert-or-replace on (code, patient, model). On conflict the stored
    /// `id` and `created_at` are kept and everything else is overwritten.
    /// Returns the id of the stored row.
    async fn upsert(&self, evaluation: &Evaluation) -> Result<EvaluationId, IntakeServiceError>;

    /// All evaluations under a code, newest `created_at` first.
    async fn list_by_code(
        &self,
        code: &AccessCode,
    ) -> Result<Vec<Evaluation>, IntakeServiceError>;

    /// Filtered page, newest `submitted_at` first, with the total match count.
    async fn list(
        &self,
        filter: &EvaluationFilter,
        page: PageRequest,
    ) -> Result<Page<Evaluation>, IntakeServiceError>;

    async fn find_by_id(
        &self,
        id: EvaluationId,
    ) -> Result<Option<Evaluation>, IntakeServiceError>;

    async fn count(&self) -> Result<u64, IntakeServiceError>;

    async fn count_submitted_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<u64, IntakeServiceError>;

    /// Mean `total_score` over all evaluations; `None` when there are none.
    async fn average_total_score(&self) -> Result<Option<f64>, IntakeServiceError>;

    /// Evaluation count per code. Codes without evaluations are absent.
    async fn count_by_code(&self) -> Result<HashMap<String, u64>, IntakeServiceError>;

    async fn stats_by_model(&self) -> Result<Vec<ModelStat>, IntakeServiceError>;

    async fn stats_by_patient(&self) -> Result<Vec<PatientStat>, IntakeServiceError>;

    async fn score_points(&self) -> Result<Vec<ScorePoint>, IntakeServiceError>;
}

/// Destructive maintenance spanning both stores.
pub trait MaintenancePort: Send + Sync {
    /// Delete every evaluation and every code in one transaction.
    async fn clear_all(&self) -> Result<ClearedCounts, IntakeServiceError>;
}
