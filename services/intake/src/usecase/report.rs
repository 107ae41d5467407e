use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use tracing::warn;

use evalgate_domain::code_status::CodeStatus;

use crate::domain::repository::{CodeRepository, EvaluationRepository, MaintenancePort};
use crate::domain::types::{
    ClearedCounts, Code, CodeFilter, ModelStat, PatientStat, ScorePoint,
};
use crate::error::IntakeServiceError;

// ── Pure helpers ─────────────────────────────────────────────────────────────

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for fewer than two values.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `round(count / expected * 100)`; 0 when nothing is expected.
pub fn completion_rate(count: u64, expected: u32) -> u32 {
    if expected == 0 {
        return 0;
    }
    (count as f64 / f64::from(expected) * 100.0).round() as u32
}

/// Midnight at the start of `now`'s local day, as UTC.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    // A DST jump may skip midnight; the day then starts one hour later.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

// ── GetStats ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeCounts {
    pub total: u64,
    pub active: u64,
    pub used: u64,
    pub expired: u64,
}

#[derive(Debug, Clone)]
pub struct EvaluationStats {
    pub total: u64,
    pub avg_score: f64,
    pub today: u64,
    pub active_models: u64,
    pub by_model: Vec<ModelStat>,
    pub by_patient: Vec<PatientStat>,
}

#[derive(Debug, Clone)]
pub struct Stats {
    pub codes: CodeCounts,
    pub evaluations: EvaluationStats,
}

pub struct GetStatsUseCase<C, E>
where
    C: CodeRepository,
    E: EvaluationRepository,
{
    pub codes: C,
    pub evaluations: E,
}

impl<C, E> GetStatsUseCase<C, E>
where
    C: CodeRepository,
    E: EvaluationRepository,
{
    pub async fn execute(&self) -> Result<Stats, IntakeServiceError> {
        let by_status = self.codes.count_by_status().await?;
        let status_count = |s: CodeStatus| by_status.get(&s).copied().unwrap_or(0);
        let codes = CodeCounts {
            total: by_status.values().sum(),
            active: status_count(CodeStatus::Active),
            used: status_count(CodeStatus::Used),
            expired: status_count(CodeStatus::Expired),
        };

        let since = start_of_day(&Local::now());
        let mut by_model = self.evaluations.stats_by_model().await?;
        by_model.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.model.cmp(&b.model)));
        let mut by_patient = self.evaluations.stats_by_patient().await?;
        by_patient.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.patient.cmp(&b.patient))
        });

        let evaluations = EvaluationStats {
            total: self.evaluations.count().await?,
            avg_score: self.evaluations.average_total_score().await?.unwrap_or(0.0),
            today: self.evaluations.count_submitted_since(since).await?,
            active_models: by_model.len() as u64,
            by_model,
            by_patient,
        };
        Ok(Stats { codes, evaluations })
    }
}

// ── GetEvaluationMatrix ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixCell {
    pub avg: f64,
    pub std_dev: f64,
    pub count: u64,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationMatrix {
    pub models: Vec<String>,
    pub patients: Vec<String>,
    /// model → patient → cell. Only pairs with at least one evaluation appear.
    pub cells: BTreeMap<String, BTreeMap<String, MatrixCell>>,
}

/// Cross-tabulate total scores per (model, patient).
pub fn build_matrix(points: Vec<ScorePoint>) -> EvaluationMatrix {
    let mut models = BTreeSet::new();
    let mut patients = BTreeSet::new();
    let mut grouped: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    for point in points {
        models.insert(point.model.clone());
        patients.insert(point.patient.clone());
        grouped
            .entry(point.model)
            .or_default()
            .entry(point.patient)
            .or_default()
            .push(point.total_score);
    }

    let cells = grouped
        .into_iter()
        .map(|(model, row)| {
            let row = row
                .into_iter()
                .map(|(patient, scores)| {
                    let cell = MatrixCell {
                        avg: mean(&scores),
                        std_dev: population_std_dev(&scores),
                        count: scores.len() as u64,
                        scores,
                    };
                    (patient, cell)
                })
                .collect();
            (model, row)
        })
        .collect();

    EvaluationMatrix {
        models: models.into_iter().collect(),
        patients: patients.into_iter().collect(),
        cells,
    }
}

pub struct GetEvaluationMatrixUseCase<E: EvaluationRepository> {
    pub evaluations: E,
}

impl<E: EvaluationRepository> GetEvaluationMatrixUseCase<E> {
    pub async fn execute(&self) -> Result<EvaluationMatrix, IntakeServiceError> {
        let points = self.evaluations.score_points().await?;
        Ok(build_matrix(points))
    }
}

// ── ListCodesWithStats ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CodeWithStats {
    pub code: Code,
    pub evaluation_count: u64,
    pub completion_rate: u32,
}

pub struct ListCodesInput {
    pub status: Option<String>,
    pub batch_id: Option<String>,
}

pub struct ListCodesWithStatsUseCase<C, E>
where
    C: CodeRepository,
    E: EvaluationRepository,
{
    pub codes: C,
    pub evaluations: E,
    pub expected_per_code: u32,
}

impl<C, E> ListCodesWithStatsUseCase<C, E>
where
    C: CodeRepository,
    E: EvaluationRepository,
{
    pub async fn execute(
        &self,
        input: ListCodesInput,
    ) -> Result<Vec<CodeWithStats>, IntakeServiceError> {
        let status = match input.status.as_deref() {
            None | Some("") => None,
            Some(s) => Some(CodeStatus::from_str_opt(s).ok_or(IntakeServiceError::InvalidStatus)?),
        };
        let filter = CodeFilter {
            status,
            batch_id: input.batch_id.filter(|b| !b.is_empty()),
        };

        let codes = self.codes.list(&filter).await?;
        let counts = self.evaluations.count_by_code().await?;
        Ok(codes
            .into_iter()
            .map(|code| {
                let evaluation_count = counts.get(&code.code).copied().unwrap_or(0);
                CodeWithStats {
                    completion_rate: completion_rate(evaluation_count, self.expected_per_code),
                    evaluation_count,
                    code,
                }
            })
            .collect())
    }
}

// ── ClearDatabase ────────────────────────────────────────────────────────────

pub struct ClearDatabaseUseCase<M: MaintenancePort> {
    pub maintenance: M,
}

impl<M: MaintenancePort> ClearDatabaseUseCase<M> {
    pub async fn execute(&self) -> Result<ClearedCounts, IntakeServiceError> {
        let cleared = self.maintenance.clear_all().await?;
        warn!(
            deleted_codes = cleared.codes,
            deleted_evaluations = cleared.evaluations,
            "database cleared"
        );
        Ok(cleared)
    }
}
