use std::collections::HashMap;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, SqlErr, TransactionTrait,
    sea_query::{Expr, Func, OnConflict, SimpleExpr},
};

use evalgate_domain::access_code::AccessCode;
use evalgate_domain::code_status::CodeStatus;
use evalgate_domain::id::EvaluationId;
use evalgate_domain::pagination::{Page, PageRequest};
use evalgate_intake_schema::{codes, evaluations};

use crate::domain::repository::{CodeRepository, EvaluationRepository, MaintenancePort};
use crate::domain::types::{
    ClearedCounts, Code, CodeFilter, Evaluation, EvaluationFilter, ModelStat, PatientStat,
    ScorePoint, Scores,
};
use crate::error::IntakeServiceError;

// ── Code repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCodeRepository {
    pub db: DatabaseConnection,
}

impl CodeRepository for DbCodeRepository {
    async fn find(&self, code: &AccessCode) -> Result<Option<Code>, IntakeServiceError> {
        let model = codes::Entity::find_by_id(code.as_str().to_owned())
            .one(&self.db)
            .await
            .context("find code")?;
        Ok(model.map(code_from_model))
    }

    async fn exists(&self, code: &AccessCode) -> Result<bool, IntakeServiceError> {
        let count = codes::Entity::find_by_id(code.as_str().to_owned())
            .count(&self.db)
            .await
            .context("check code exists")?;
        Ok(count > 0)
    }

    async fn insert(&self, code: &Code) -> Result<bool, IntakeServiceError> {
        let result = codes::ActiveModel {
            code: Set(code.code.clone()),
            status: Set(code.status.as_str().to_owned()),
            created_at: Set(code.created_at),
            used_at: Set(code.used_at),
            batch_id: Set(code.batch_id.clone()),
            description: Set(code.description.clone()),
        }
        .insert(&self.db)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert code").into()),
        }
    }

    async fn mark_used(
        &self,
        code: &AccessCode,
        at: DateTime<Utc>,
    ) -> Result<bool, IntakeServiceError> {
        // Conditional single-statement transition; concurrent first submissions
        // race harmlessly and only one of them sees rows_affected = 1.
        let result = codes::Entity::update_many()
            .col_expr(codes::Column::Status, Expr::value(CodeStatus::Used.as_str()))
            .col_expr(codes::Column::UsedAt, Expr::value(at))
            .filter(codes::Column::Code.eq(code.as_str()))
            .filter(codes::Column::Status.eq(CodeStatus::Active.as_str()))
            .exec(&self.db)
            .await
            .context("mark code used")?;
        Ok(result.rows_affected > 0)
    }

    async fn expire(&self, code: &AccessCode) -> Result<bool, IntakeServiceError> {
        let result = codes::Entity::update_many()
            .col_expr(
                codes::Column::Status,
                Expr::value(CodeStatus::Expired.as_str()),
            )
            .filter(codes::Column::Code.eq(code.as_str()))
            .exec(&self.db)
            .await
            .context("expire code")?;
        Ok(result.rows_affected > 0)
    }

    async fn list(&self, filter: &CodeFilter) -> Result<Vec<Code>, IntakeServiceError> {
        let mut query = codes::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(codes::Column::Status.eq(status.as_str()));
        }
        if let Some(batch_id) = &filter.batch_id {
            query = query.filter(codes::Column::BatchId.eq(batch_id.as_str()));
        }
        let models = query
            .order_by_desc(codes::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list codes")?;
        Ok(models.into_iter().map(code_from_model).collect())
    }

    async fn count_by_status(&self) -> Result<HashMap<CodeStatus, u64>, IntakeServiceError> {
        let rows: Vec<(String, i64)> = codes::Entity::find()
            .select_only()
            .column(codes::Column::Status)
            .column_as(count_all(), "count")
            .group_by(codes::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await
            .context("count codes by status")?;

        Ok(tally_statuses(rows))
    }
}

/// Unknown stored statuses fail closed as `expired`, so a corrupt row can
/// never be used to submit.
fn status_from_db(raw: &str) -> CodeStatus {
    CodeStatus::from_str_opt(raw).unwrap_or_else(|| {
        tracing::warn!(status = %raw, "unknown code status read as expired");
        CodeStatus::Expired
    })
}

fn tally_statuses(rows: Vec<(String, i64)>) -> HashMap<CodeStatus, u64> {
    let mut counts = HashMap::new();
    for (status, count) in rows {
        *counts.entry(status_from_db(&status)).or_insert(0) += count as u64;
    }
    counts
}

fn code_from_model(model: codes::Model) -> Code {
    Code {
        status: status_from_db(&model.status),
        code: model.code,
        created_at: model.created_at,
        used_at: model.used_at,
        batch_id: model.batch_id,
        description: model.description,
    }
}

// ── Evaluation repository ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEvaluationRepository {
    pub db: DatabaseConnection,
}

impl DbEvaluationRepository {
    fn filtered(filter: &EvaluationFilter) -> Select<evaluations::Entity> {
        let mut query = evaluations::Entity::find();
        if let Some(code) = &filter.code {
            query = query.filter(evaluations::Column::Code.eq(code.as_str()));
        }
        if let Some(patient) = &filter.patient {
            query = query.filter(evaluations::Column::Patient.eq(patient.as_str()));
        }
        if let Some(model) = &filter.model {
            query = query.filter(evaluations::Column::Model.eq(model.as_str()));
        }
        query
    }
}

impl EvaluationRepository for DbEvaluationRepository {
    async fn upsert(&self, evaluation: &Evaluation) -> Result<EvaluationId, IntakeServiceError> {
        let scores =
            serde_json::to_value(&evaluation.scores).context("encode evaluation scores")?;
        let model = evaluations::ActiveModel {
            id: Set(evaluation.id.0),
            code: Set(evaluation.code.clone()),
            patient: Set(evaluation.patient.clone()),
            model: Set(evaluation.model.clone()),
            scores: Set(scores),
            total_score: Set(evaluation.total_score),
            overall_comment: Set(evaluation.overall_comment.clone()),
            created_at: Set(evaluation.created_at),
            submitted_at: Set(evaluation.submitted_at),
        };

        // RETURNING yields the surviving row's id on both insert and update.
        let result = evaluations::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    evaluations::Column::Code,
                    evaluations::Column::Patient,
                    evaluations::Column::Model,
                ])
                .update_columns([
                    evaluations::Column::Scores,
                    evaluations::Column::TotalScore,
                    evaluations::Column::OverallComment,
                    evaluations::Column::SubmittedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await
            .context("upsert evaluation")?;
        Ok(EvaluationId(result.last_insert_id))
    }

    async fn list_by_code(
        &self,
        code: &AccessCode,
    ) -> Result<Vec<Evaluation>, IntakeServiceError> {
        let models = evaluations::Entity::find()
            .filter(evaluations::Column::Code.eq(code.as_str()))
            .order_by_desc(evaluations::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list evaluations by code")?;
        evaluations_from_models(models)
    }

    async fn list(
        &self,
        filter: &EvaluationFilter,
        page: PageRequest,
    ) -> Result<Page<Evaluation>, IntakeServiceError> {
        let total = Self::filtered(filter)
            .count(&self.db)
            .await
            .context("count filtered evaluations")?;
        let models = Self::filtered(filter)
            .order_by_desc(evaluations::Column::SubmittedAt)
            .offset(page.offset())
            .limit(u64::from(page.limit))
            .all(&self.db)
            .await
            .context("list evaluations")?;
        Ok(Page {
            items: evaluations_from_models(models)?,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn find_by_id(
        &self,
        id: EvaluationId,
    ) -> Result<Option<Evaluation>, IntakeServiceError> {
        let model = evaluations::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find evaluation by id")?;
        Ok(model.map(evaluation_from_model).transpose()?)
    }

    async fn count(&self) -> Result<u64, IntakeServiceError> {
        let count = evaluations::Entity::find()
            .count(&self.db)
            .await
            .context("count evaluations")?;
        Ok(count)
    }

    async fn count_submitted_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<u64, IntakeServiceError> {
        let count = evaluations::Entity::find()
            .filter(evaluations::Column::SubmittedAt.gte(since))
            .count(&self.db)
            .await
            .context("count evaluations submitted since")?;
        Ok(count)
    }

    async fn average_total_score(&self) -> Result<Option<f64>, IntakeServiceError> {
        let avg: Option<Option<f64>> = evaluations::Entity::find()
            .select_only()
            .column_as(average_total_score(), "avg_score")
            .into_tuple()
            .one(&self.db)
            .await
            .context("average total score")?;
        Ok(avg.flatten())
    }

    async fn count_by_code(&self) -> Result<HashMap<String, u64>, IntakeServiceError> {
        let rows: Vec<(String, i64)> = evaluations::Entity::find()
            .select_only()
            .column(evaluations::Column::Code)
            .column_as(count_all(), "count")
            .group_by(evaluations::Column::Code)
            .into_tuple()
            .all(&self.db)
            .await
            .context("count evaluations by code")?;
        Ok(rows
            .into_iter()
            .map(|(code, count)| (code, count as u64))
            .collect())
    }

    async fn stats_by_model(&self) -> Result<Vec<ModelStat>, IntakeServiceError> {
        let rows: Vec<(String, i64, Option<f64>)> = evaluations::Entity::find()
            .select_only()
            .column(evaluations::Column::Model)
            .column_as(count_all(), "count")
            .column_as(average_total_score(), "avg_score")
            .group_by(evaluations::Column::Model)
            .into_tuple()
            .all(&self.db)
            .await
            .context("evaluation stats by model")?;
        Ok(rows
            .into_iter()
            .map(|(model, count, avg_score)| ModelStat {
                model,
                count: count as u64,
                avg_score: avg_score.unwrap_or(0.0),
            })
            .collect())
    }

    async fn stats_by_patient(&self) -> Result<Vec<PatientStat>, IntakeServiceError> {
        let rows: Vec<(String, i64)> = evaluations::Entity::find()
            .select_only()
            .column(evaluations::Column::Patient)
            .column_as(count_all(), "count")
            .group_by(evaluations::Column::Patient)
            .into_tuple()
            .all(&self.db)
            .await
            .context("evaluation stats by patient")?;
        Ok(rows
            .into_iter()
            .map(|(patient, count)| PatientStat {
                patient,
                count: count as u64,
            })
            .collect())
    }

    async fn score_points(&self) -> Result<Vec<ScorePoint>, IntakeServiceError> {
        let rows: Vec<(String, String, f64)> = evaluations::Entity::find()
            .select_only()
            .column(evaluations::Column::Model)
            .column(evaluations::Column::Patient)
            .column(evaluations::Column::TotalScore)
            .into_tuple()
            .all(&self.db)
            .await
            .context("load score points")?;
        Ok(rows
            .into_iter()
            .map(|(model, patient, total_score)| ScorePoint {
                model,
                patient,
                total_score,
            })
            .collect())
    }
}

fn count_all() -> SimpleExpr {
    SimpleExpr::FunctionCall(Func::count(Expr::col(sea_orm::sea_query::Asterisk)))
}

fn average_total_score() -> SimpleExpr {
    SimpleExpr::FunctionCall(Func::avg(Expr::col(evaluations::Column::TotalScore)))
}

fn evaluation_from_model(model: evaluations::Model) -> anyhow::Result<Evaluation> {
    let scores: Scores = serde_json::from_value(model.scores)
        .with_context(|| format!("decode scores of evaluation {}", model.id))?;
    Ok(Evaluation {
        id: EvaluationId(model.id),
        code: model.code,
        patient: model.patient,
        model: model.model,
        scores,
        total_score: model.total_score,
        overall_comment: model.overall_comment,
        created_at: model.created_at,
        submitted_at: model.submitted_at,
    })
}

fn evaluations_from_models(
    models: Vec<evaluations::Model>,
) -> Result<Vec<Evaluation>, IntakeServiceError> {
    Ok(models
        .into_iter()
        .map(evaluation_from_model)
        .collect::<anyhow::Result<Vec<_>>>()?)
}

// ── Maintenance ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbMaintenance {
    pub db: DatabaseConnection,
}

impl MaintenancePort for DbMaintenance {
    async fn clear_all(&self) -> Result<ClearedCounts, IntakeServiceError> {
        let cleared = self
            .db
            .transaction::<_, ClearedCounts, sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    let evaluations = evaluations::Entity::delete_many().exec(txn).await?;
                    let codes = codes::Entity::delete_many().exec(txn).await?;
                    Ok(ClearedCounts {
                        codes: codes.rows_affected,
                        evaluations: evaluations.rows_affected,
                    })
                })
            })
            .await
            .context("clear database")?;
        Ok(cleared)
    }
}
