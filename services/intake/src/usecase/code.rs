use std::collections::HashSet;

use chrono::Utc;
use rand::RngExt;
use tracing::{info, warn};

use evalgate_domain::access_code::{ACCESS_CODE_ALPHABET, ACCESS_CODE_LEN, AccessCode};
use evalgate_domain::code_status::CodeStatus;

use crate::domain::repository::CodeRepository;
use crate::domain::types::{
    Code, GENERATION_MAX_ATTEMPTS, MAX_BATCH_SIZE, SELF_SERVICE_DESCRIPTION,
};
use crate::error::IntakeServiceError;

/// Draw a code uniformly from `[a-z0-9]{4}`.
pub fn generate_code() -> AccessCode {
    let mut rng = rand::rng();
    let indices: [usize; ACCESS_CODE_LEN] =
        std::array::from_fn(|_| rng.random_range(0..ACCESS_CODE_ALPHABET.len()));
    AccessCode::from_alphabet_indices(indices)
}

/// Parse raw input into a code, or `InvalidFormat`.
pub fn parse_code(raw: &str) -> Result<AccessCode, IntakeServiceError> {
    Ok(AccessCode::parse(raw)?)
}

/// Load a code that may still be used: `CodeNotFound` if absent,
/// `CodeExpired` if expired.
pub(crate) async fn load_usable_code<C: CodeRepository>(
    codes: &C,
    code: &AccessCode,
) -> Result<Code, IntakeServiceError> {
    let record = codes
        .find(code)
        .await?
        .ok_or(IntakeServiceError::CodeNotFound)?;
    if !record.status.is_usable() {
        return Err(IntakeServiceError::CodeExpired);
    }
    Ok(record)
}

fn batch_tag(prefix: &str) -> String {
    format!("{prefix}_{}", Utc::now().timestamp_millis())
}

/// Create one new active code, retrying on collision up to
/// [`GENERATION_MAX_ATTEMPTS`] times. Candidates already in `issued` are
/// treated as collisions without asking the store.
///
/// A store failure also consumes an attempt. `GenerationExhausted` is
/// returned only when every attempt collided; otherwise the last store
/// error is.
async fn issue_code<C: CodeRepository>(
    codes: &C,
    batch_id: &str,
    description: Option<&str>,
    issued: &HashSet<AccessCode>,
) -> Result<Code, IntakeServiceError> {
    issue_code_from(codes, batch_id, description, issued, generate_code).await
}

async fn issue_code_from<C, G>(
    codes: &C,
    batch_id: &str,
    description: Option<&str>,
    issued: &HashSet<AccessCode>,
    mut next_candidate: G,
) -> Result<Code, IntakeServiceError>
where
    C: CodeRepository,
    G: FnMut() -> AccessCode,
{
    let mut last_store_error = None;
    for attempt in 1..=GENERATION_MAX_ATTEMPTS {
        let candidate = next_candidate();
        if issued.contains(&candidate) {
            warn!(attempt, code = %candidate, "code collides with current batch");
            continue;
        }
        match try_insert(codes, &candidate, batch_id, description).await {
            Ok(Some(code)) => return Ok(code),
            Ok(None) => warn!(attempt, code = %candidate, "code already taken"),
            Err(e) => {
                warn!(attempt, error = ?e, "store failure while issuing code");
                last_store_error = Some(e);
            }
        }
    }
    Err(last_store_error.unwrap_or(IntakeServiceError::GenerationExhausted))
}

/// Pre-check then insert. The insert itself still reports a taken code,
/// covering a concurrent issuer winning between the two calls.
async fn try_insert<C: CodeRepository>(
    codes: &C,
    candidate: &AccessCode,
    batch_id: &str,
    description: Option<&str>,
) -> Result<Option<Code>, IntakeServiceError> {
    if codes.exists(candidate).await? {
        return Ok(None);
    }
    let code = Code {
        code: candidate.as_str().to_owned(),
        status: CodeStatus::Active,
        created_at: Utc::now(),
        used_at: None,
        batch_id: Some(batch_id.to_owned()),
        description: description.map(str::to_owned),
    };
    if codes.insert(&code).await? {
        Ok(Some(code))
    } else {
        Ok(None)
    }
}

// ── ApplyCode (self-service) ─────────────────────────────────────────────────

pub struct ApplyCodeUseCase<C: CodeRepository> {
    pub codes: C,
}

impl<C: CodeRepository> ApplyCodeUseCase<C> {
    pub async fn execute(&self) -> Result<Code, IntakeServiceError> {
        let batch_id = batch_tag("apply");
        let code = issue_code(
            &self.codes,
            &batch_id,
            Some(SELF_SERVICE_DESCRIPTION),
            &HashSet::new(),
        )
        .await?;
        info!(code = %code.code, batch_id = %batch_id, "issued self-service code");
        Ok(code)
    }
}

// ── VerifyCode ───────────────────────────────────────────────────────────────

pub struct VerifyCodeUseCase<C: CodeRepository> {
    pub codes: C,
}

impl<C: CodeRepository> VerifyCodeUseCase<C> {
    /// Returns the current status (`Active` or `Used`) of a usable code.
    pub async fn execute(&self, raw: &str) -> Result<CodeStatus, IntakeServiceError> {
        let code = parse_code(raw)?;
        let record = load_usable_code(&self.codes, &code).await?;
        Ok(record.status)
    }
}

// ── GenerateCodes (admin batch) ──────────────────────────────────────────────

pub struct GenerateCodesInput {
    pub count: i64,
    pub batch_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct GeneratedBatch {
    pub batch_id: String,
    pub codes: Vec<Code>,
}

pub struct GenerateCodesUseCase<C: CodeRepository> {
    pub codes: C,
}

impl<C: CodeRepository> GenerateCodesUseCase<C> {
    pub async fn execute(
        &self,
        input: GenerateCodesInput,
    ) -> Result<GeneratedBatch, IntakeServiceError> {
        if input.count > i64::from(MAX_BATCH_SIZE) {
            return Err(IntakeServiceError::BatchTooLarge);
        }
        if input.count < 0 {
            return Err(IntakeServiceError::InvalidCount);
        }
        let count = input.count as usize;
        let batch_id = input
            .batch_id
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| batch_tag("batch"));

        let mut issued = HashSet::with_capacity(count);
        let mut codes = Vec::with_capacity(count);
        for _ in 0..count {
            let code = issue_code(
                &self.codes,
                &batch_id,
                input.description.as_deref(),
                &issued,
            )
            .await?;
            issued.insert(AccessCode::parse(&code.code)?);
            codes.push(code);
        }
        info!(batch_id = %batch_id, count = codes.len(), "generated code batch");
        Ok(GeneratedBatch { batch_id, codes })
    }
}

// ── ExpireCode (admin) ───────────────────────────────────────────────────────

pub struct ExpireCodeUseCase<C: CodeRepository> {
    pub codes: C,
}

impl<C: CodeRepository> ExpireCodeUseCase<C> {
    pub async fn execute(&self, raw: &str) -> Result<AccessCode, IntakeServiceError> {
        let code = parse_code(raw)?;
        if !self.codes.expire(&code).await? {
            return Err(IntakeServiceError::CodeNotFound);
        }
        info!(code = %code, "code expired by administrator");
        Ok(code)
    }
}
