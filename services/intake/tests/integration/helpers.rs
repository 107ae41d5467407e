use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use evalgate_domain::access_code::AccessCode;
use evalgate_domain::code_status::CodeStatus;
use evalgate_domain::id::EvaluationId;
use evalgate_domain::pagination::{Page, PageRequest};
use evalgate_intake::domain::repository::{CodeRepository, EvaluationRepository, MaintenancePort};
use evalgate_intake::domain::types::{
    ClearedCounts, Code, CodeFilter, CriterionScore, Evaluation, EvaluationFilter, ModelStat,
    PatientStat, ScorePoint, Scores,
};
use evalgate_intake::error::IntakeServiceError;
use evalgate_intake::usecase::evaluation::SubmitEvaluationInput;

// ── InMemoryCodeRepo ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryCodeRepo {
    pub codes: Arc<Mutex<Vec<Code>>>,
}

impl InMemoryCodeRepo {
    pub fn new(codes: Vec<Code>) -> Self {
        Self {
            codes: Arc::new(Mutex::new(codes)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a shared handle to the stored codes for post-execution inspection.
    pub fn codes_handle(&self) -> Arc<Mutex<Vec<Code>>> {
        Arc::clone(&self.codes)
    }

    pub fn status_of(&self, code: &str) -> Option<CodeStatus> {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.status)
    }
}

impl CodeRepository for InMemoryCodeRepo {
    async fn find(&self, code: &AccessCode) -> Result<Option<Code>, IntakeServiceError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.code == code.as_str())
            .cloned())
    }

    async fn exists(&self, code: &AccessCode) -> Result<bool, IntakeServiceError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.code == code.as_str()))
    }

    async fn insert(&self, code: &Code) -> Result<bool, IntakeServiceError> {
        let mut codes = self.codes.lock().unwrap();
        if codes.iter().any(|c| c.code == code.code) {
            return Ok(false);
        }
        codes.push(code.clone());
        Ok(true)
    }

    async fn mark_used(
        &self,
        code: &AccessCode,
        at: DateTime<Utc>,
    ) -> Result<bool, IntakeServiceError> {
        let mut codes = self.codes.lock().unwrap();
        match codes
            .iter_mut()
            .find(|c| c.code == code.as_str() && c.status == CodeStatus::Active)
        {
            Some(c) => {
                c.status = CodeStatus::Used;
                c.used_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn expire(&self, code: &AccessCode) -> Result<bool, IntakeServiceError> {
        let mut codes = self.codes.lock().unwrap();
        match codes.iter_mut().find(|c| c.code == code.as_str()) {
            Some(c) => {
                c.status = CodeStatus::Expired;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, filter: &CodeFilter) -> Result<Vec<Code>, IntakeServiceError> {
        let mut codes: Vec<Code> = self
            .codes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .filter(|c| {
                filter
                    .batch_id
                    .as_ref()
                    .is_none_or(|b| c.batch_id.as_ref() == Some(b))
            })
            .cloned()
            .collect();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes)
    }

    async fn count_by_status(&self) -> Result<HashMap<CodeStatus, u64>, IntakeServiceError> {
        let mut counts = HashMap::new();
        for c in self.codes.lock().unwrap().iter() {
            *counts.entry(c.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

// ── InMemoryEvaluationRepo ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryEvaluationRepo {
    pub evaluations: Arc<Mutex<Vec<Evaluation>>>,
}

impl InMemoryEvaluationRepo {
    pub fn new(evaluations: Vec<Evaluation>) -> Self {
        Self {
            evaluations: Arc::new(Mutex::new(evaluations)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn evaluations_handle(&self) -> Arc<Mutex<Vec<Evaluation>>> {
        Arc::clone(&self.evaluations)
    }

    fn matching(&self, filter: &EvaluationFilter) -> Vec<Evaluation> {
        self.evaluations
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filter.code.as_ref().is_none_or(|c| &e.code == c))
            .filter(|e| filter.patient.as_ref().is_none_or(|p| &e.patient == p))
            .filter(|e| filter.model.as_ref().is_none_or(|m| &e.model == m))
            .cloned()
            .collect()
    }
}

impl EvaluationRepository for InMemoryEvaluationRepo {
    async fn upsert(&self, evaluation: &Evaluation) -> Result<EvaluationId, IntakeServiceError> {
        let mut evaluations = self.evaluations.lock().unwrap();
        if let Some(existing) = evaluations.iter_mut().find(|e| {
            e.code == evaluation.code
                && e.patient == evaluation.patient
                && e.model == evaluation.model
        }) {
            existing.scores = evaluation.scores.clone();
            existing.total_score = evaluation.total_score;
            existing.overall_comment = evaluation.overall_comment.clone();
            existing.submitted_at = evaluation.submitted_at;
            return Ok(existing.id);
        }
        evaluations.push(evaluation.clone());
        Ok(evaluation.id)
    }

    async fn list_by_code(
        &self,
        code: &AccessCode,
    ) -> Result<Vec<Evaluation>, IntakeServiceError> {
        let mut found = self.matching(&EvaluationFilter {
            code: Some(code.as_str().to_owned()),
            ..Default::default()
        });
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list(
        &self,
        filter: &EvaluationFilter,
        page: PageRequest,
    ) -> Result<Page<Evaluation>, IntakeServiceError> {
        let mut found = self.matching(filter);
        found.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        let total = found.len() as u64;
        let items = found
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page {
            items,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn find_by_id(
        &self,
        id: EvaluationId,
    ) -> Result<Option<Evaluation>, IntakeServiceError> {
        Ok(self
            .evaluations
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn count(&self) -> Result<u64, IntakeServiceError> {
        Ok(self.evaluations.lock().unwrap().len() as u64)
    }

    async fn count_submitted_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<u64, IntakeServiceError> {
        Ok(self
            .evaluations
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.submitted_at >= since)
            .count() as u64)
    }

    async fn average_total_score(&self) -> Result<Option<f64>, IntakeServiceError> {
        let evaluations = self.evaluations.lock().unwrap();
        if evaluations.is_empty() {
            return Ok(None);
        }
        let sum: f64 = evaluations.iter().map(|e| e.total_score).sum();
        Ok(Some(sum / evaluations.len() as f64))
    }

    async fn count_by_code(&self) -> Result<HashMap<String, u64>, IntakeServiceError> {
        let mut counts = HashMap::new();
        for e in self.evaluations.lock().unwrap().iter() {
            *counts.entry(e.code.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn stats_by_model(&self) -> Result<Vec<ModelStat>, IntakeServiceError> {
        let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for e in self.evaluations.lock().unwrap().iter() {
            grouped.entry(e.model.clone()).or_default().push(e.total_score);
        }
        Ok(grouped
            .into_iter()
            .map(|(model, scores)| ModelStat {
                model,
                count: scores.len() as u64,
                avg_score: scores.iter().sum::<f64>() / scores.len() as f64,
            })
            .collect())
    }

    async fn stats_by_patient(&self) -> Result<Vec<PatientStat>, IntakeServiceError> {
        let mut grouped: BTreeMap<String, u64> = BTreeMap::new();
        for e in self.evaluations.lock().unwrap().iter() {
            *grouped.entry(e.patient.clone()).or_default() += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|(patient, count)| PatientStat { patient, count })
            .collect())
    }

    async fn score_points(&self) -> Result<Vec<ScorePoint>, IntakeServiceError> {
        Ok(self
            .evaluations
            .lock()
            .unwrap()
            .iter()
            .map(|e| ScorePoint {
                model: e.model.clone(),
                patient: e.patient.clone(),
                total_score: e.total_score,
            })
            .collect())
    }
}

// ── InMemoryMaintenance ──────────────────────────────────────────────────────

pub struct InMemoryMaintenance {
    pub codes: Arc<Mutex<Vec<Code>>>,
    pub evaluations: Arc<Mutex<Vec<Evaluation>>>,
}

impl InMemoryMaintenance {
    pub fn over(codes: &InMemoryCodeRepo, evaluations: &InMemoryEvaluationRepo) -> Self {
        Self {
            codes: codes.codes_handle(),
            evaluations: evaluations.evaluations_handle(),
        }
    }
}

impl MaintenancePort for InMemoryMaintenance {
    async fn clear_all(&self) -> Result<ClearedCounts, IntakeServiceError> {
        let mut codes = self.codes.lock().unwrap();
        let mut evaluations = self.evaluations.lock().unwrap();
        let cleared = ClearedCounts {
            codes: codes.len() as u64,
            evaluations: evaluations.len() as u64,
        };
        codes.clear();
        evaluations.clear();
        Ok(cleared)
    }
}

// ── ScriptedCodeRepo ─────────────────────────────────────────────────────────

/// How [`ScriptedCodeRepo::exists`] answers one lookup.
#[derive(Clone, Copy)]
pub enum ExistsAnswer {
    /// The candidate is already taken.
    Taken,
    /// The store is unreachable.
    Fail,
}

/// Code store that answers existence checks from a script and counts how
/// often it was asked. The last answer repeats once the script runs out.
/// Inserts are never expected.
pub struct ScriptedCodeRepo {
    pub script: Vec<ExistsAnswer>,
    pub calls: Arc<Mutex<u32>>,
}

impl ScriptedCodeRepo {
    pub fn new(answer: ExistsAnswer) -> Self {
        Self::scripted(vec![answer])
    }

    pub fn scripted(script: Vec<ExistsAnswer>) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls_handle(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.calls)
    }
}

impl CodeRepository for ScriptedCodeRepo {
    async fn find(&self, _code: &AccessCode) -> Result<Option<Code>, IntakeServiceError> {
        Ok(None)
    }

    async fn exists(&self, _code: &AccessCode) -> Result<bool, IntakeServiceError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls as usize
        };
        let answer = self.script[call.min(self.script.len()) - 1];
        match answer {
            ExistsAnswer::Taken => Ok(true),
            ExistsAnswer::Fail => Err(anyhow::anyhow!("connection refused").into()),
        }
    }

    async fn insert(&self, _code: &Code) -> Result<bool, IntakeServiceError> {
        panic!("insert must not be reached");
    }

    async fn mark_used(
        &self,
        _code: &AccessCode,
        _at: DateTime<Utc>,
    ) -> Result<bool, IntakeServiceError> {
        Ok(false)
    }

    async fn expire(&self, _code: &AccessCode) -> Result<bool, IntakeServiceError> {
        Ok(false)
    }

    async fn list(&self, _filter: &CodeFilter) -> Result<Vec<Code>, IntakeServiceError> {
        Ok(vec![])
    }

    async fn count_by_status(&self) -> Result<HashMap<CodeStatus, u64>, IntakeServiceError> {
        Ok(HashMap::new())
    }
}

// ── RacyCodeRepo ─────────────────────────────────────────────────────────────

/// Code store where another writer wins the first `lost_races` inserts
/// after the existence check already said the candidate was free.
#[derive(Clone)]
pub struct RacyCodeRepo {
    pub inner: InMemoryCodeRepo,
    pub lost_races: u32,
    pub inserts: Arc<Mutex<u32>>,
}

impl RacyCodeRepo {
    pub fn new(inner: InMemoryCodeRepo, lost_races: u32) -> Self {
        Self {
            inner,
            lost_races,
            inserts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn inserts_handle(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.inserts)
    }
}

impl CodeRepository for RacyCodeRepo {
    async fn find(&self, code: &AccessCode) -> Result<Option<Code>, IntakeServiceError> {
        self.inner.find(code).await
    }

    async fn exists(&self, _code: &AccessCode) -> Result<bool, IntakeServiceError> {
        Ok(false)
    }

    async fn insert(&self, code: &Code) -> Result<bool, IntakeServiceError> {
        let attempt = {
            let mut inserts = self.inserts.lock().unwrap();
            *inserts += 1;
            *inserts
        };
        if attempt <= self.lost_races {
            return Ok(false);
        }
        self.inner.insert(code).await
    }

    async fn mark_used(
        &self,
        code: &AccessCode,
        at: DateTime<Utc>,
    ) -> Result<bool, IntakeServiceError> {
        self.inner.mark_used(code, at).await
    }

    async fn expire(&self, code: &AccessCode) -> Result<bool, IntakeServiceError> {
        self.inner.expire(code).await
    }

    async fn list(&self, filter: &CodeFilter) -> Result<Vec<Code>, IntakeServiceError> {
        self.inner.list(filter).await
    }

    async fn count_by_status(&self) -> Result<HashMap<CodeStatus, u64>, IntakeServiceError> {
        self.inner.count_by_status().await
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn code_with_status(code: &str, status: CodeStatus) -> Code {
    Code {
        code: code.to_owned(),
        status,
        created_at: Utc::now() - Duration::days(1),
        used_at: None,
        batch_id: Some("batch_test".to_owned()),
        description: None,
    }
}

pub fn active_code(code: &str) -> Code {
    code_with_status(code, CodeStatus::Active)
}

pub fn scores(pairs: &[(&str, f64)]) -> Scores {
    pairs
        .iter()
        .map(|(name, score)| {
            (
                (*name).to_owned(),
                CriterionScore {
                    score: *score,
                    max: 20.0,
                    weight: None,
                    comment: String::new(),
                },
            )
        })
        .collect()
}

pub fn submission(code: &str, patient: &str, model: &str, total: f64) -> SubmitEvaluationInput {
    SubmitEvaluationInput {
        code: code.to_owned(),
        patient: patient.to_owned(),
        model: model.to_owned(),
        scores: scores(&[("accuracy", total)]),
        total_score: Some(total),
        overall_comment: String::new(),
    }
}

pub fn evaluation(code: &str, patient: &str, model: &str, total: f64) -> Evaluation {
    let at = Utc::now();
    Evaluation {
        id: EvaluationId::new(),
        code: code.to_owned(),
        patient: patient.to_owned(),
        model: model.to_owned(),
        scores: scores(&[("accuracy", total)]),
        total_score: total,
        overall_comment: String::new(),
        created_at: at,
        submitted_at: at,
    }
}
