use sea_orm::DatabaseConnection;

use crate::infra::db::{DbCodeRepository, DbEvaluationRepository, DbMaintenance};

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub expected_evaluations_per_code: u32,
}

impl AppState {
    pub fn code_repo(&self) -> DbCodeRepository {
        DbCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn evaluation_repo(&self) -> DbEvaluationRepository {
        DbEvaluationRepository {
            db: self.db.clone(),
        }
    }

    pub fn maintenance(&self) -> DbMaintenance {
        DbMaintenance {
            db: self.db.clone(),
        }
    }
}
