//! Integration tests for the SSE streaming endpoint.

mod common;

use axum::http::StatusCode;
use common::get;
use http_body_util::BodyExt;
use serde_json::json;

async fn body_text(response: axum::http::Response<axum::body::Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("stream closes")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("SSE body is UTF-8")
}

// ---------------------------------------------------------------------------
// Test: chunks flow to the subscriber, then the stream closes on finish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_emits_chunks_then_closes_on_finish() {
    let (app, dispatcher) = common::build_test_app_with_dispatcher();

    let task = dispatcher.submit("e", json!({"prompt": "x"})).await;
    dispatcher.take_next("e", "w1").await.expect("claimed");

    // Connect the subscriber first; nothing is replayed.
    let response = get(app, &format!("/v1/stream/{}", task.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    dispatcher
        .report_chunk(&task.id, "w1", json!({"token": "hel"}))
        .await
        .unwrap();
    dispatcher
        .report_chunk(&task.id, "w1", json!({"token": "lo"}))
        .await
        .unwrap();
    dispatcher
        .report_result(
            &task.id,
            "w1",
            conveyor_dispatch::TaskOutcome::Success(json!("hello")),
        )
        .await
        .unwrap();

    // Collecting the body only completes because the stream ends after the
    // finished event.
    let text = body_text(response).await;
    let hel = text.find("\"token\":\"hel\"").expect("first chunk present");
    let lo = text.find("\"token\":\"lo\"").expect("second chunk present");
    let finished = text.find("\"type\":\"finished\"").expect("finished event present");
    assert!(hel < lo && lo < finished, "events arrive in emit order");
}

// ---------------------------------------------------------------------------
// Test: streaming a finished task yields a single terminal event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_of_terminal_task_closes_immediately() {
    let (app, dispatcher) = common::build_test_app_with_dispatcher();

    let task = dispatcher.submit("e", json!({})).await;
    dispatcher.take_next("e", "w1").await.expect("claimed");
    dispatcher
        .report_result(&task.id, "w1", conveyor_dispatch::TaskOutcome::Success(json!(1)))
        .await
        .unwrap();

    let response = get(app, &format!("/v1/stream/{}", task.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains("\"type\":\"finished\""));
    assert!(text.contains("COMPLETED"));
    assert!(!text.contains("\"type\":\"chunk\""));
}

// ---------------------------------------------------------------------------
// Test: unknown task id is a 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_of_unknown_task_is_404() {
    let app = common::build_test_app();
    let response = get(app, "/v1/stream/no-such-task").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
