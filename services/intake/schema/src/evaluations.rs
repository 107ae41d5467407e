use sea_orm::entity::prelude::*;

/// Submitted evaluation. Unique on (code, patient, model).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "evaluations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub code: String,
    pub patient: String,
    pub model: String,
    /// Criterion name → `{score, max, weight?, comment}`.
    #[sea_orm(column_type = "JsonBinary")]
    pub scores: Json,
    #[sea_orm(column_type = "Double")]
    pub total_score: f64,
    #[sea_orm(column_type = "Text")]
    pub overall_comment: String,
    /// First submission time; kept when the record is overwritten.
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
