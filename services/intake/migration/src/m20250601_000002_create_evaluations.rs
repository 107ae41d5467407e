use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Evaluations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Evaluations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Evaluations::Code).string_len(4).not_null())
                    .col(ColumnDef::new(Evaluations::Patient).string().not_null())
                    .col(ColumnDef::new(Evaluations::Model).string().not_null())
                    .col(ColumnDef::new(Evaluations::Scores).json_binary().not_null())
                    .col(ColumnDef::new(Evaluations::TotalScore).double().not_null())
                    .col(
                        ColumnDef::new(Evaluations::OverallComment)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Evaluations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Evaluations::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Upsert target: one record per (code, patient, model).
        manager
            .create_index(
                Index::create()
                    .table(Evaluations::Table)
                    .col(Evaluations::Code)
                    .col(Evaluations::Patient)
                    .col(Evaluations::Model)
                    .unique()
                    .name("idx_evaluations_code_patient_model")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Evaluations::Table)
                    .col(Evaluations::SubmittedAt)
                    .name("idx_evaluations_submitted_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Evaluations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Evaluations {
    Table,
    Id,
    Code,
    Patient,
    Model,
    Scores,
    TotalScore,
    OverallComment,
    CreatedAt,
    SubmittedAt,
}
