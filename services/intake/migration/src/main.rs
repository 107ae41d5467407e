use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(evalgate_intake_migration::Migrator).await;
}
