use sea_orm_migration::prelude::*;

mod m20250601_000001_create_codes;
mod m20250601_000002_create_evaluations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_codes::Migration),
            Box::new(m20250601_000002_create_evaluations::Migration),
        ]
    }
}
