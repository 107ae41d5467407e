use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evalgate_domain::code_status::CodeStatus;
use evalgate_domain::id::EvaluationId;

/// Access code record as stored.
#[derive(Debug, Clone)]
pub struct Code {
    pub code: String,
    pub status: CodeStatus,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub batch_id: Option<String>,
    pub description: Option<String>,
}

/// Score given for a single criterion (e.g. "accuracy").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub comment: String,
}

/// Criterion name → score. Ordered so stored JSON is stable.
pub type Scores = BTreeMap<String, CriterionScore>;

/// Sum of the criterion scores, used when the client sends no total.
pub fn sum_scores(scores: &Scores) -> f64 {
    scores.values().map(|s| s.score).sum()
}

/// One rater's assessment of one model's output for one patient case.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub code: String,
    pub patient: String,
    pub model: String,
    pub scores: Scores,
    pub total_score: f64,
    pub overall_comment: String,
    /// First submission time for this (code, patient, model).
    pub created_at: DateTime<Utc>,
    /// Last write time; advanced by every resubmission.
    pub submitted_at: DateTime<Utc>,
}

/// Optional filters for the code listing.
#[derive(Debug, Clone, Default)]
pub struct CodeFilter {
    pub status: Option<CodeStatus>,
    pub batch_id: Option<String>,
}

/// Optional, independent filters for the evaluation listing.
#[derive(Debug, Clone, Default)]
pub struct EvaluationFilter {
    pub code: Option<String>,
    pub patient: Option<String>,
    pub model: Option<String>,
}

/// Per-model aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStat {
    pub model: String,
    pub count: u64,
    pub avg_score: f64,
}

/// Per-patient aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientStat {
    pub patient: String,
    pub count: u64,
}

/// (model, patient, total_score) projection used for the evaluation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePoint {
    pub model: String,
    pub patient: String,
    pub total_score: f64,
}

/// Rows removed by a bulk wipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearedCounts {
    pub codes: u64,
    pub evaluations: u64,
}

/// Attempts per code before generation gives up.
pub const GENERATION_MAX_ATTEMPTS: u32 = 10;

/// Largest batch an administrator may generate in one call.
pub const MAX_BATCH_SIZE: u32 = 100;

/// Default number of evaluation forms each code is expected to complete.
pub const DEFAULT_EXPECTED_EVALUATIONS_PER_CODE: u32 = 80;

/// Description attached to self-service codes.
pub const SELF_SERVICE_DESCRIPTION: &str = "self-service application";
