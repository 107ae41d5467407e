use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use evalgate_core::shutdown::shutdown_signal;
use evalgate_core::tracing::init_tracing;
use evalgate_intake::config::IntakeConfig;
use evalgate_intake::router::build_router;
use evalgate_intake::state::AppState;
use evalgate_intake_migration::Migrator;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = IntakeConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let state = AppState {
        db,
        expected_evaluations_per_code: config.expected_evaluations_per_code,
    };

    let router = build_router(state, config.max_body_bytes);
    let http_addr = format!("0.0.0.0:{}", config.intake_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind");

    info!("intake service listening on {http_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("intake service stopped");
}
