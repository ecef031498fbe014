//! Integration tests for the motion bridge
//!
//! These tests drive the HTTP facade end to end with an in-process router and
//! a manual clock, covering the phone write path and the polling read path.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use server::clock::ManualClock;
use server::config::ServerConfig;
use server::lifecycle::sweep_once;
use server::network::{router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app(config: ServerConfig) -> (AppState, ManualClock) {
    let clock = ManualClock::new(1_000_000);
    let state = AppState::new(config, Arc::new(clock.clone()));
    (state, clock)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn start(state: &AppState) -> String {
    let (status, body) = send(router(state.clone()), Method::POST, "/start", None).await;
    assert_eq!(status, StatusCode::OK);
    let reply: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(reply["ok"], true);
    reply["token"].as_str().unwrap().to_string()
}

async fn update(state: &AppState, token: &str, x: Value, y: Value) -> (StatusCode, Value) {
    let (status, body) = send(
        router(state.clone()),
        Method::POST,
        "/update",
        Some(json!({ "token": token, "x": x, "y": y })),
    )
    .await;
    (status, serde_json::from_str(&body).unwrap())
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, String) {
    send(router(state.clone()), Method::GET, uri, None).await
}

fn is_scale_text(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 6
        && b[0] == b'X'
        && b[3] == b'Y'
        && b[1..3].iter().all(u8::is_ascii_digit)
        && b[4..6].iter().all(u8::is_ascii_digit)
}

/// PHONE WRITE PATH TESTS
mod write_path_tests {
    use super::*;

    /// Full-tilt sample maps onto the scale extremes
    #[tokio::test]
    async fn full_tilt_maps_to_extremes() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        let (status, reply) = update(&state, &token, json!(10), json!(-10)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["throttled"], false);

        let (_, body) = get(&state, &format!("/simple/{}", token)).await;
        assert_eq!(body, "X09Y01");
    }

    #[tokio::test]
    async fn numeric_strings_are_accepted() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        let (status, reply) = update(&state, &token, json!("3.5"), json!("-2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["x"], 3.5);
        assert_eq!(reply["y"], -2.0);
    }

    #[tokio::test]
    async fn query_form_update() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        let (status, body) = get(&state, &format!("/update?token={}&x=4&y=-4", token)).await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["updates"], 1);

        let (_, body) = get(&state, &format!("/x/{}", token)).await;
        assert_eq!(body, "4");
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let (state, _clock) = test_app(ServerConfig::default());

        let (status, reply) = update(&state, "ZZZZ9999", json!(1), json!(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["error"], "InvalidToken");
    }

    #[tokio::test]
    async fn non_numeric_motion_is_rejected() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        for (x, y) in [
            (json!("left"), json!(1)),
            (json!(1), json!(null)),
            (json!({ "v": 1 }), json!(1)),
            (json!("NaN"), json!(0)),
        ] {
            let (status, reply) = update(&state, &token, x, y).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(reply["error"], "InvalidMotionData");
        }

        let (status, body) = send(
            router(state.clone()),
            Method::POST,
            "/update",
            Some(json!({ "token": token })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("InvalidMotionData"));
    }

    #[tokio::test]
    async fn missing_token_is_unknown_session() {
        let (state, _clock) = test_app(ServerConfig::default());
        start(&state).await;

        let (status, body) = send(
            router(state.clone()),
            Method::POST,
            "/update",
            Some(json!({ "x": 1, "y": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["error"], "InvalidToken");

        let (status, _) = get(&state, "/update?x=1&y=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rapid_updates_are_throttled() {
        let (state, clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        update(&state, &token, json!(2), json!(2)).await;
        clock.advance(5);
        let (status, reply) = update(&state, &token, json!(3), json!(3)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["throttled"], true);
        assert_eq!(reply["updates"], 1);

        clock.advance(20);
        let (_, reply) = update(&state, &token, json!(3), json!(3)).await;
        assert_eq!(reply["throttled"], false);
        assert_eq!(reply["updates"], 2);
    }

    /// Store at capacity rejects new sessions
    #[tokio::test]
    async fn start_rejected_at_capacity() {
        let mut config = ServerConfig::default();
        config.store.max_sessions = 2;
        let (state, _clock) = test_app(config);

        start(&state).await;
        start(&state).await;

        let (status, body) = send(router(state.clone()), Method::POST, "/start", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["error"], "AtCapacity");
    }

    #[tokio::test]
    async fn stop_closes_session() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        let (_, body) = send(
            router(state.clone()),
            Method::POST,
            &format!("/stop/{}", token),
            None,
        )
        .await;
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["removed"], true);

        let (status, _) = update(&state, &token, json!(1), json!(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

/// POLLING READ PATH TESTS
mod read_path_tests {
    use super::*;

    #[tokio::test]
    async fn new_session_reads_center() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        assert_eq!(get(&state, &format!("/simple/{}", token)).await.1, "X05Y05");
        assert_eq!(get(&state, &format!("/x/{}", token)).await.1, "0");
        assert_eq!(get(&state, &format!("/y/{}", token)).await.1, "0");
    }

    #[tokio::test]
    async fn unknown_token_reads_sentinels() {
        let (state, _clock) = test_app(ServerConfig::default());

        let (status, body) = get(&state, "/simple/NEVER234").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "X05Y05");
        assert_eq!(get(&state, "/x/NEVER234").await, (StatusCode::OK, "0".to_string()));
        assert_eq!(get(&state, "/y/NEVER234").await, (StatusCode::OK, "0".to_string()));

        let (status, _) = get(&state, "/latest/NEVER234").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn read_ttl_boundary() {
        let (state, clock) = test_app(ServerConfig::default());
        let token = start(&state).await;
        update(&state, &token, json!(-10), json!(10)).await;

        clock.advance(5_000);
        assert_eq!(get(&state, &format!("/simple/{}", token)).await.1, "X01Y09");
        assert_eq!(get(&state, &format!("/latest/{}", token)).await.0, StatusCode::OK);

        clock.advance(1);
        assert_eq!(get(&state, &format!("/simple/{}", token)).await.1, "X05Y05");
        assert_eq!(get(&state, &format!("/y/{}", token)).await.1, "0");
        assert_eq!(
            get(&state, &format!("/latest/{}", token)).await.0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn axis_endpoints_are_clamped() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;
        update(&state, &token, json!(12.0), json!(-2.4)).await;

        assert_eq!(get(&state, &format!("/x/{}", token)).await.1, "5");
        assert_eq!(get(&state, &format!("/y/{}", token)).await.1, "-2");
    }

    #[tokio::test]
    async fn corrupted_reading_degrades_to_center() {
        let (state, _clock) = test_app(ServerConfig::default());
        let token = start(&state).await;
        update(&state, &token, json!(3), json!(40)).await;

        assert_eq!(get(&state, &format!("/simple/{}", token)).await.1, "X05Y05");
        assert_eq!(get(&state, &format!("/x/{}", token)).await.1, "0");
    }

    #[tokio::test]
    async fn latest_reports_filtered_state() {
        let (state, clock) = test_app(ServerConfig::default());
        let token = start(&state).await;
        update(&state, &token, json!(1.5), json!(-0.5)).await;
        clock.advance(250);

        let (status, body) = get(&state, &format!("/latest/{}", token)).await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["x"], 1.5);
        assert_eq!(reply["y"], -0.5);
        assert_eq!(reply["raw"]["x"], 1.5);
        assert_eq!(reply["raw"]["y"], -0.5);
        assert_eq!(reply["updates"], 1);
        assert_eq!(reply["throttled"], 0);
        assert_eq!(reply["window"], 1);
        assert_eq!(reply["age_ms"], 250);
    }

    /// Raw sample is reported alongside the smoothed estimate
    #[tokio::test]
    async fn latest_separates_raw_from_filtered() {
        let (state, clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        update(&state, &token, json!(0), json!(0)).await;
        for x in [2, 4] {
            clock.advance(30);
            update(&state, &token, json!(x), json!(0)).await;
        }
        clock.advance(5);
        let (_, reply) = update(&state, &token, json!(9), json!(9)).await;
        assert_eq!(reply["throttled"], true);

        let (status, body) = get(&state, &format!("/latest/{}", token)).await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["raw"]["x"], 4.0);
        assert_eq!(reply["raw"]["y"], 0.0);
        let filtered = reply["x"].as_f64().unwrap();
        assert!(filtered > 2.0 && filtered < 4.0, "filtered x was {}", filtered);
        assert_eq!(reply["updates"], 3);
        assert_eq!(reply["throttled"], 1);
        assert_eq!(reply["window"], 3);
    }

    /// Scale text stays well formed across a long noisy session
    #[tokio::test]
    async fn scale_text_always_well_formed() {
        let (state, clock) = test_app(ServerConfig::default());
        let token = start(&state).await;

        for i in 0..60 {
            let x = ((i * 37) % 50) as f64 - 25.0;
            let y = ((i * 11) % 31) as f64 - 15.0;
            clock.advance(30);
            update(&state, &token, json!(x), json!(y)).await;

            let body = get(&state, &format!("/simple/{}", token)).await.1;
            assert!(is_scale_text(&body), "malformed scale text {:?}", body);
            let sx: u8 = body[1..3].parse().unwrap();
            let sy: u8 = body[4..6].parse().unwrap();
            assert!((1..=9).contains(&sx) && (1..=9).contains(&sy));
        }
    }
}

/// SESSION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn sweep_removes_idle_sessions() {
        let (state, clock) = test_app(ServerConfig::default());
        let idle = start(&state).await;
        let active = start(&state).await;

        let ttl_ms = state.config.sweep.session_ttl.as_millis() as u64;
        clock.advance(ttl_ms);
        update(&state, &active, json!(1), json!(1)).await;
        clock.advance(1);

        let report = sweep_once(&state.store, &clock, &state.config.sweep).await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.remaining, 1);

        let (status, _) = update(&state, &idle, json!(1), json!(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = update(&state, &active, json!(2), json!(2)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_session_counts() {
        let (state, clock) = test_app(ServerConfig::default());
        let token = start(&state).await;
        start(&state).await;
        update(&state, &token, json!(1), json!(1)).await;
        clock.advance(100);

        let (status, body) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["sessions"]["live"], 2);
        assert_eq!(reply["sessions"]["fresh"], 2);
        assert_eq!(reply["sessions"]["total_created"], 2);
        assert_eq!(reply["sessions"]["total_updates"], 1);
        assert_eq!(reply["sessions"]["oldest_age_ms"], 100);
        assert_eq!(reply["motion"]["smoothing"]["policy"], "weighted");
        assert_eq!(reply["read_ttl_ms"], 5_000);
    }
}
