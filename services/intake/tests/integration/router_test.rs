use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

use evalgate_intake::router::build_router;
use evalgate_intake::state::AppState;

// Every request below is rejected before the store is consulted, so a
// disconnected database is enough.
fn server_with_limit(max_body_bytes: usize) -> TestServer {
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        expected_evaluations_per_code: 80,
    };
    TestServer::new(build_router(state, max_body_bytes)).unwrap()
}

fn server() -> TestServer {
    server_with_limit(50 * 1024 * 1024)
}

fn assert_kind(body: &Value, kind: &str) {
    assert_eq!(body["kind"], kind, "unexpected error body: {body}");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn should_answer_liveness_without_database() {
    let response = server().get("/healthz").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn should_report_not_ready_without_database() {
    let response = server().get("/readyz").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn should_reject_malformed_code_on_verify() {
    let response = server().get("/api/verify-code/AB12").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_FORMAT");
}

#[tokio::test]
async fn should_reject_malformed_code_on_listing() {
    let response = server().get("/api/evaluations/abc").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_FORMAT");
}

#[tokio::test]
async fn should_reject_submission_missing_fields() {
    let response = server()
        .post("/api/submit-evaluation")
        .json(&json!({ "code": "a1b2", "patient": "p1" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "MISSING_DATA");
}

#[tokio::test]
async fn should_reject_submission_with_malformed_code() {
    let response = server()
        .post("/api/submit-evaluation")
        .json(&json!({
            "code": "a1b2!",
            "patient": "p1",
            "model": "m1",
            "scores": { "accuracy": { "score": 18, "max": 20 } },
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_FORMAT");
}

#[tokio::test]
async fn should_reject_oversized_batch() {
    let response = server()
        .post("/api/admin/generate-codes")
        .json(&json!({ "count": 150 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "BATCH_TOO_LARGE");
}

#[tokio::test]
async fn should_reject_batch_beyond_u32_range() {
    let response = server()
        .post("/api/admin/generate-codes")
        .json(&json!({ "count": 5_000_000_000_i64 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "BATCH_TOO_LARGE");
}

#[tokio::test]
async fn should_reject_negative_batch_count() {
    let response = server()
        .post("/api/admin/generate-codes")
        .json(&json!({ "count": -1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_COUNT");
}

#[tokio::test]
async fn should_reject_non_numeric_score_as_json_error() {
    let response = server()
        .post("/api/submit-evaluation")
        .json(&json!({
            "code": "a1b2",
            "patient": "p1",
            "model": "m1",
            "scores": { "accuracy": { "score": "18" } },
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "BAD_REQUEST");
}

#[tokio::test]
async fn should_reject_unparsable_body_as_json_error() {
    let response = server()
        .post("/api/admin/generate-codes")
        .text("{\"count\":")
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "BAD_REQUEST");
}

#[tokio::test]
async fn should_reject_non_numeric_page_query() {
    let response = server().get("/api/admin/evaluations?page=abc").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "BAD_REQUEST");
}

#[tokio::test]
async fn should_reject_unknown_status_filter() {
    let response = server().get("/api/admin/codes?status=pending").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_STATUS");
}

#[tokio::test]
async fn should_reject_malformed_evaluation_id() {
    let response = server().get("/api/admin/evaluation/not-a-uuid").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_ID");
}

#[tokio::test]
async fn should_reject_malformed_code_on_expire() {
    let response = server().post("/api/admin/codes/ZZZZ/expire").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_kind(&response.json::<Value>(), "INVALID_FORMAT");
}

#[tokio::test]
async fn should_attach_request_id_to_responses() {
    let response = server().get("/healthz").await;
    let id = response.header("x-request-id");
    assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn should_keep_caller_supplied_request_id() {
    let response = server()
        .get("/healthz")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-me"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-me");
}

#[tokio::test]
async fn should_enforce_body_limit() {
    let response = server_with_limit(64)
        .post("/api/submit-evaluation")
        .json(&json!({ "code": "a1b2", "overall_comment": "x".repeat(256) }))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_kind(&response.json::<Value>(), "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn should_return_404_for_unknown_route() {
    let response = server().get("/api/nope").await;
    response.assert_status_not_found();
}
