//! Integration tests for the client-facing task API.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_returns_pending_task_id() {
    let app = common::build_test_app();

    let response = post_json(
        app.clone(),
        "/v1/sdxl/run",
        json!({"input": {"prompt": "a lighthouse"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let submitted = body_json(response).await;
    assert_eq!(submitted["status"], "PENDING");
    let id = submitted["id"].as_str().expect("id is a string").to_string();

    let response = get(app, &format!("/v1/status/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["status"], "PENDING");
    assert_eq!(status["delay_ms"], 0);
    assert!(status.get("worker_id").is_none());
}

#[tokio::test]
async fn run_without_input_is_rejected() {
    let app = common::build_test_app();

    let response = post_json(app, "/v1/sdxl/run", json!({"prompt": "bare"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn run_without_endpoint_uses_default() {
    let app = common::build_test_app();

    let response = post_json(app.clone(), "/v1/run", json!({"input": {}})).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The task is routed to the "default" endpoint queue.
    let response = get(app, "/v1/default/stats").await;
    let stats = body_json(response).await;
    assert_eq!(stats["pending_tasks"], 1);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tasks_listing_filters_and_paginates() {
    let app = common::build_test_app();

    post_json(app.clone(), "/v1/sdxl/run", json!({"input": {}})).await;
    post_json(app.clone(), "/v1/sdxl/run", json!({"input": {}})).await;
    let submitted = body_json(post_json(app.clone(), "/v1/whisper/run", json!({"input": {}})).await).await;
    let whisper_id = submitted["id"].as_str().unwrap().to_string();

    // Unfiltered: everything, with the page parameters echoed back.
    let listing = body_json(get(app.clone(), "/v1/tasks").await).await;
    assert_eq!(listing["total"], 3);
    assert_eq!(listing["limit"], 100);
    assert_eq!(listing["offset"], 0);
    assert_eq!(listing["tasks"].as_array().map(Vec::len), Some(3));

    // Endpoint filter.
    let listing = body_json(get(app.clone(), "/v1/tasks?endpoint=sdxl").await).await;
    assert_eq!(listing["total"], 2);

    // Status filter tracks lifecycle changes.
    post_json(app.clone(), &format!("/v1/cancel/{whisper_id}"), json!({})).await;
    let listing = body_json(get(app.clone(), "/v1/tasks?status=CANCELLED").await).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["tasks"][0]["id"], whisper_id.as_str());

    // Exact-id filter.
    let listing =
        body_json(get(app.clone(), &format!("/v1/tasks?task_id={whisper_id}")).await).await;
    assert_eq!(listing["total"], 1);

    // Pagination slices the page but reports the full total.
    let listing = body_json(get(app.clone(), "/v1/tasks?limit=2&offset=2").await).await;
    assert_eq!(listing["total"], 3);
    assert_eq!(listing["tasks"].as_array().map(Vec::len), Some(1));

    // An unknown status value is rejected, not silently empty.
    let response = get(app, "/v1/tasks?status=RUNNING").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_of_unknown_task_is_404() {
    let app = common::build_test_app();

    let response = get(app, "/v1/status/no-such-task").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_pending_task_then_cancel_again() {
    let app = common::build_test_app();

    let submitted = body_json(post_json(app.clone(), "/v1/e/run", json!({"input": {}})).await).await;
    let id = submitted["id"].as_str().unwrap().to_string();

    let response = post_json(app.clone(), &format!("/v1/cancel/{id}"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = body_json(response).await;
    assert_eq!(cancelled["status"], "CANCELLED");

    // Idempotent: a second cancel succeeds and reports the same state.
    let response = post_json(app.clone(), &format!("/v1/cancel/{id}"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let again = body_json(response).await;
    assert_eq!(again["status"], "CANCELLED");

    let status = body_json(get(app, &format!("/v1/status/{id}")).await).await;
    assert_eq!(status["status"], "CANCELLED");
}

#[tokio::test]
async fn cancel_unknown_task_is_404() {
    let app = common::build_test_app();
    let response = post_json(app, "/v1/cancel/no-such-task", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Full lifecycle through both surfaces
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitted_task_flows_through_worker_to_completion() {
    let app = common::build_test_app();

    let submitted = body_json(
        post_json(app.clone(), "/v1/e/run", json!({"input": {"n": 7}})).await,
    )
    .await;
    let id = submitted["id"].as_str().unwrap().to_string();

    // Worker pulls the task; the claim carries the untouched input.
    let response = get(app.clone(), "/runpod/job-take/w1?endpoint=e").await;
    assert_eq!(response.status(), StatusCode::OK);
    let claimed = body_json(response).await;
    assert_eq!(claimed["id"], id.as_str());
    assert_eq!(claimed["input"], json!({"n": 7}));

    // Submitter now sees IN_PROGRESS with the worker attached.
    let status = body_json(get(app.clone(), &format!("/v1/status/{id}")).await).await;
    assert_eq!(status["status"], "IN_PROGRESS");
    assert_eq!(status["worker_id"], "w1");

    // Worker reports success.
    let response = post_json(
        app.clone(),
        &format!("/runpod/job-done/w1/{id}"),
        json!({"output": {"n": 49}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(get(app, &format!("/v1/status/{id}")).await).await;
    assert_eq!(status["status"], "COMPLETED");
    assert_eq!(status["output"], json!({"n": 49}));
    assert!(status.get("worker_id").is_none());
}

// ---------------------------------------------------------------------------
// Synchronous submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn runsync_with_zero_wait_returns_pending_snapshot() {
    let app = common::build_test_app();

    // No worker ever pulls; a zero-second budget elapses immediately and
    // the snapshot comes back non-terminal instead of an error.
    let response = post_json(app.clone(), "/v1/e/runsync?wait=0", json!({"input": {}})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = body_json(response).await;
    assert_eq!(snapshot["status"], "PENDING");
    let id = snapshot["id"].as_str().unwrap().to_string();

    // The task is still live and pollable.
    let status = body_json(get(app, &format!("/v1/status/{id}")).await).await;
    assert_eq!(status["status"], "PENDING");
}

#[tokio::test]
async fn runsync_returns_result_when_worker_completes() {
    let (app, dispatcher) = common::build_test_app_with_dispatcher();

    // Background worker loop driving the dispatcher directly.
    let worker = tokio::spawn(async move {
        loop {
            if let Some(task) = dispatcher.take_next("e", "w1").await {
                dispatcher
                    .report_result(
                        &task.id,
                        "w1",
                        conveyor_dispatch::TaskOutcome::Success(json!({"ok": true})),
                    )
                    .await
                    .unwrap();
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    });

    let response = post_json(app, "/v1/e/runsync?wait=5", json!({"input": {}})).await;
    worker.await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["status"], "COMPLETED");
    assert_eq!(snapshot["output"], json!({"ok": true}));
}
