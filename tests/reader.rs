//! Reader session behavior: state machine, bounded navigation, fit math on
//! the wire, debounce, supersede-cancellation, and delayed close.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use serde_json::{json, Value};
use tokio::time::sleep;

use bookshelf_server::config::Config;
use bookshelf_server::routes;
use bookshelf_server::shelf::{Book, BookSource};
use bookshelf_server::state::AppState;

use common::{bad_bytes, pdf_bytes, FakeEngine};

async fn shelf_with_book(engine: FakeEngine) -> (AppState, TestServer) {
    let state = AppState::with_engine(Config::default(), Arc::new(engine));
    state
        .shelf()
        .insert(Book::new(
            "b1".to_string(),
            "Book One".to_string(),
            BookSource::from_upload(pdf_bytes()),
        ))
        .await;

    let server = TestServer::new(routes::app(state.clone())).unwrap();
    (state, server)
}

async fn open_session(server: &TestServer, book_id: &str) -> String {
    let response = server
        .post("/api/v1/reader")
        .json(&json!({ "bookId": book_id }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["sessionId"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn wait_for_state(server: &TestServer, id: &str, want: &str) -> Value {
    for _ in 0..200 {
        let response = server.get(&format!("/api/v1/reader/{id}")).await;
        if response.status_code() == 200 {
            let body = response.json::<Value>();
            if body["state"] == want {
                return body;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("session {id} never reached state '{want}'");
}

async fn wait_for_frame_page(server: &TestServer, id: &str, page: u64) -> Value {
    for _ in 0..200 {
        let response = server.get(&format!("/api/v1/reader/{id}/frame")).await;
        if response.status_code() == 200 {
            let body = response.json::<Value>();
            if body["page"] == page {
                return body;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("session {id} never produced a frame for page {page}");
}

async fn navigate(server: &TestServer, id: &str, request: Value) -> u64 {
    let response = server
        .post(&format!("/api/v1/reader/{id}/page"))
        .json(&request)
        .await;
    response.assert_status_ok();
    response.json::<Value>()["page"].as_u64().unwrap()
}

async fn set_viewport(server: &TestServer, id: &str, width: f32, height: f32, dpr: f32) {
    let response = server
        .post(&format!("/api/v1/reader/{id}/viewport"))
        .json(&json!({
            "width": width,
            "height": height,
            "devicePixelRatio": dpr,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread")]
async fn open_loads_document_and_reports_pages() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let id = open_session(&server, "b1").await;

    let status = wait_for_state(&server, &id, "ready").await;
    assert_eq!(status["bookId"], "b1");
    assert_eq!(status["page"], 1);
    assert_eq!(status["totalPages"], 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_load_is_an_explicit_state() {
    let (state, server) = shelf_with_book(FakeEngine::new(5)).await;
    state
        .shelf()
        .insert(Book::new(
            "broken".to_string(),
            "Broken".to_string(),
            BookSource::from_upload(bad_bytes()),
        ))
        .await;

    let id = open_session(&server, "broken").await;
    let status = wait_for_state(&server, &id, "failed").await;
    assert_eq!(status["totalPages"], 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn opening_unknown_book_is_404() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let response = server
        .post("/api/v1/reader")
        .json(&json!({ "bookId": "ghost" }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn navigation_is_clamped_to_page_range() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    // Out-of-range requests are silently ignored
    assert_eq!(navigate(&server, &id, json!({ "page": 0 })).await, 1);
    assert_eq!(navigate(&server, &id, json!({ "page": 99 })).await, 1);
    assert_eq!(navigate(&server, &id, json!({ "delta": -1 })).await, 1);

    assert_eq!(navigate(&server, &id, json!({ "page": 3 })).await, 3);
    assert_eq!(navigate(&server, &id, json!({ "delta": 1 })).await, 4);
    assert_eq!(navigate(&server, &id, json!({ "delta": -2 })).await, 2);
    assert_eq!(navigate(&server, &id, json!({ "delta": 99 })).await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn frame_is_204_before_any_render() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    let response = server.get(&format!("/api/v1/reader/{id}/frame")).await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_viewport_renders_at_fit_scale() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    // container 800x600, page 612x792, DPR 2
    set_viewport(&server, &id, 800.0, 600.0, 2.0).await;
    let frame = wait_for_frame_page(&server, &id, 1).await;

    let fit_scale = frame["fitScale"].as_f64().unwrap();
    assert!((fit_scale - 0.7576).abs() < 1e-3);

    // CSS size tracks the fit scale, independent of DPR
    assert!((frame["cssWidth"].as_f64().unwrap() - 463.6).abs() < 0.5);
    assert!((frame["cssHeight"].as_f64().unwrap() - 600.0).abs() < 1e-3);

    // Backing resolution carries the DPR
    assert_eq!(frame["width"], 927);
    assert_eq!(frame["height"], 1200);

    assert_eq!(frame["contentType"], "image/png");
    // base64 of the fake engine's single page-1 byte
    assert_eq!(frame["data"], "AQ==");
}

#[tokio::test(flavor = "multi_thread")]
async fn resize_rerender_is_debounced() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    set_viewport(&server, &id, 800.0, 600.0, 1.0).await;
    wait_for_frame_page(&server, &id, 1).await;

    // Resize: nothing should change inside the debounce window
    set_viewport(&server, &id, 1000.0, 800.0, 1.0).await;
    sleep(Duration::from_millis(50)).await;
    let frame = server
        .get(&format!("/api/v1/reader/{id}/frame"))
        .await
        .json::<Value>();
    assert!((frame["cssHeight"].as_f64().unwrap() - 600.0).abs() < 1e-3);

    // After the window the re-render lands: fit = min(1000/612, 800/792)
    sleep(Duration::from_millis(400)).await;
    let frame = server
        .get(&format!("/api/v1/reader/{id}/frame"))
        .await
        .json::<Value>();
    assert!((frame["cssHeight"].as_f64().unwrap() - 800.0).abs() < 0.5);
}

#[tokio::test(flavor = "multi_thread")]
async fn resize_bursts_collapse_into_one_render() {
    let engine = FakeEngine::new(5);
    let renders = engine.render_counter();
    let (_state, server) = shelf_with_book(engine).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    set_viewport(&server, &id, 800.0, 600.0, 1.0).await;
    wait_for_frame_page(&server, &id, 1).await;
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    // A burst of resize reports inside one debounce window
    set_viewport(&server, &id, 850.0, 640.0, 1.0).await;
    set_viewport(&server, &id, 900.0, 680.0, 1.0).await;
    set_viewport(&server, &id, 950.0, 720.0, 1.0).await;

    sleep(Duration::from_millis(600)).await;
    assert_eq!(renders.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn final_frame_is_the_last_requested_page() {
    let engine = FakeEngine::new(9).with_render_delay(Duration::from_millis(60));
    let (_state, server) = shelf_with_book(engine).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    set_viewport(&server, &id, 800.0, 600.0, 1.0).await;

    // Each navigation supersedes the render before it
    for page in 2..=5 {
        navigate(&server, &id, json!({ "page": page })).await;
    }

    let frame = wait_for_frame_page(&server, &id, 5).await;
    assert_eq!(frame["data"], "BQ==");

    // The frame stays on the last requested page once things settle
    sleep(Duration::from_millis(300)).await;
    let frame = server
        .get(&format!("/api/v1/reader/{id}/frame"))
        .await
        .json::<Value>();
    assert_eq!(frame["page"], 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_removes_session_only_after_fade_delay() {
    let (_state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let id = open_session(&server, "b1").await;
    wait_for_state(&server, &id, "ready").await;

    let response = server.delete(&format!("/api/v1/reader/{id}")).await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    // Still present (fading) well inside the 300ms delay
    sleep(Duration::from_millis(100)).await;
    let status = server
        .get(&format!("/api/v1/reader/{id}"))
        .await
        .json::<Value>();
    assert_eq!(status["state"], "closing");

    // Gone once the delay has elapsed
    sleep(Duration::from_millis(400)).await;
    let response = server.get(&format!("/api/v1/reader/{id}")).await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_all_tears_down_every_session() {
    let (state, server) = shelf_with_book(FakeEngine::new(5)).await;
    let first = open_session(&server, "b1").await;
    let second = open_session(&server, "b1").await;
    wait_for_state(&server, &first, "ready").await;
    wait_for_state(&server, &second, "ready").await;

    state.sessions().close_all().await;
    assert_eq!(state.sessions().len().await, 0);
}
