use crate::domain::types::DEFAULT_EXPECTED_EVALUATIONS_PER_CODE;

/// Intake service configuration loaded from environment variables.
#[derive(Debug)]
pub struct IntakeConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port for the HTTP server (default 3001). Env var: `INTAKE_PORT`.
    pub intake_port: u16,
    /// Evaluations a code is expected to produce; the completion-rate
    /// denominator (default 80). Env var: `EXPECTED_EVALUATIONS_PER_CODE`.
    pub expected_evaluations_per_code: u32,
    /// Request body limit in bytes (default 50 MiB). Env var: `MAX_BODY_BYTES`.
    pub max_body_bytes: usize,
}

impl IntakeConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            intake_port: env_or("INTAKE_PORT", 3001),
            expected_evaluations_per_code: env_or(
                "EXPECTED_EVALUATIONS_PER_CODE",
                DEFAULT_EXPECTED_EVALUATIONS_PER_CODE,
            ),
            max_body_bytes: env_or("MAX_BODY_BYTES", 50 * 1024 * 1024),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
