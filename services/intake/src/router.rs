use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use evalgate_core::health::healthz;
use evalgate_core::middleware::{cors_layer, propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    admin::{
        clear_database, expire_code, generate_codes, get_evaluation, get_evaluation_matrix,
        get_stats, list_codes, list_evaluations,
    },
    code::{apply_code, verify_code},
    evaluation::{get_evaluations_by_code, submit_evaluation},
    health::readyz,
};
use crate::state::AppState;

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let api = Router::new()
        // Codes
        .route("/verify-code/{code}", get(verify_code))
        .route("/apply-code", post(apply_code))
        // Evaluations
        .route("/submit-evaluation", post(submit_evaluation))
        .route("/evaluations/{code}", get(get_evaluations_by_code))
        // Admin
        .route("/admin/generate-codes", post(generate_codes))
        .route("/admin/codes", get(list_codes))
        .route("/admin/codes/{code}/expire", post(expire_code))
        .route("/admin/stats", get(get_stats))
        .route("/admin/evaluations", get(list_evaluations))
        .route("/admin/evaluation/{id}", get(get_evaluation))
        .route("/admin/clear-database", post(clear_database))
        .route("/admin/evaluation-matrix", get(get_evaluation_matrix));

    // Outermost first: the request id must exist before the trace span opens.
    let middleware = ServiceBuilder::new()
        .layer(request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id_layer())
        .layer(cors_layer());

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware)
        .with_state(state)
}
