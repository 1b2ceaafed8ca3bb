//! Integration tests for the SMAM API and subscribers.
//!
//! These tests publish messages over HTTP and observe the alerts the
//! subscribers record, covering the full intake → decode → alert → history path.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};
use tower::ServiceExt;

use smam::api;
use smam::app::App;
use smam::config::Config;

const FALL: &str = "{'id': 'A1', 'datetime': '2019:03:01:10:15:45', 'x_position': 0.3, \
    'y_position': 0.7, 'z_position': 0.1, 'model': 'Xiaomi My Band 2'}";
const CALM: &str = "{'id': 'A1', 'datetime': '2019:03:01:10:15:46', 'x_position': 0.9, \
    'y_position': 0.2, 'z_position': 0.5, 'model': 'Xiaomi My Band 2'}";

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        console: false,
        seed: Some(11),
        ..Config::default()
    }
}

async fn create_test_server(config: Config) -> (TestServer, App) {
    let app = App::start(&config).await.unwrap();
    let server = TestServer::new(api::router(app.state())).unwrap();
    (server, app)
}

/// Poll `/queues` until every published message has been acknowledged.
async fn wait_for_acks(server: &TestServer) {
    for _ in 0..400 {
        let queues: Vec<Value> = server.get("/queues").await.json();
        if queues.iter().all(|q| q["pending"] == 0) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queues never drained");
}

/// Poll `/alerts/recent` until `count` alerts are recorded.
async fn wait_for_alerts(server: &TestServer, count: usize) -> Vec<Value> {
    for _ in 0..400 {
        let body: Value = server.get("/alerts/recent").await.json();
        let alerts = body["alerts"].as_array().cloned().unwrap_or_default();
        if alerts.len() >= count {
            return alerts;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} alerts");
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _app) = create_test_server(test_config()).await;

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_health_via_oneshot() {
    let app = App::start(&test_config()).await.unwrap();

    let response = api::router(app.state())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_queue() {
    let (server, _app) = create_test_server(test_config()).await;

    server
        .post("/queues/heartbeat")
        .text(FALL)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fall_alert_recorded() {
    let (server, _app) = create_test_server(test_config()).await;

    for payload in [CALM, FALL, CALM] {
        server
            .post("/queues/accelerometer")
            .text(payload)
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
    wait_for_acks(&server).await;

    let alerts = wait_for_alerts(&server, 1).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert"]["kind"], "fall");
    assert_eq!(alerts[0]["alert"]["subject_id"], "A1");
    assert_eq!(alerts[0]["alert"]["model"], "Xiaomi My Band 2");
    assert_eq!(alerts[0]["alert"]["timestamp"], "2019:03:01:10:15:45");
}

#[tokio::test]
async fn test_malformed_payloads_are_acked_and_skipped() {
    let (server, _app) = create_test_server(test_config()).await;

    for payload in ["garbage", "{'id': 'A1'}", r#"{"id": "A1", "datetime": "#] {
        server
            .post("/queues/accelerometer")
            .text(payload)
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
    // A valid message after the bad ones is still handled.
    server.post("/queues/accelerometer").text(FALL).await;
    wait_for_acks(&server).await;

    let queues: Vec<Value> = server.get("/queues").await.json();
    let accel = queues
        .iter()
        .find(|q| q["name"] == "accelerometer")
        .unwrap();
    assert_eq!(accel["published"], 4);
    assert_eq!(accel["acked"], 4);

    let alerts = wait_for_alerts(&server, 1).await;
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn test_medication_reminder_once_per_subject() {
    let (server, _app) = create_test_server(test_config()).await;

    // First tick bootstraps the catalog at 10:16:15, 11:16:15, 12:16:15.
    // Sweeping all three windows twice guarantees each subject's window is hit.
    let mut datetimes = vec!["2019:03:01:10:15:45".to_string()];
    for _ in 0..2 {
        for hour in 10..=12 {
            datetimes.push(format!("2019:03:01:{hour:02}:16:10"));
        }
    }

    for datetime in &datetimes {
        for subject in ["A1", "B2"] {
            server
                .post("/queues/datetime")
                .json(&json!({"id": subject, "datetime": datetime, "model": "Fitbit"}))
                .await
                .assert_status(StatusCode::ACCEPTED);
        }
    }
    wait_for_acks(&server).await;

    let alerts = wait_for_alerts(&server, 2).await;
    assert_eq!(alerts.len(), 2);

    for subject in ["A1", "B2"] {
        let body: Value = server.get(&format!("/alerts/subject/{subject}")).await.json();
        let alerts = body["alerts"].as_array().unwrap();
        assert_eq!(alerts.len(), 1, "subject {subject}");
        assert_eq!(alerts[0]["alert"]["kind"], "medication");
        assert!(alerts[0]["alert"]["dosage"].as_str().unwrap().ends_with("mg"));
    }
}

#[tokio::test]
async fn test_recent_alerts_kind_filter() {
    let (server, _app) = create_test_server(test_config()).await;

    server.post("/queues/accelerometer").text(FALL).await;
    wait_for_acks(&server).await;
    wait_for_alerts(&server, 1).await;

    let body: Value = server.get("/alerts/recent?kind=medication").await.json();
    assert!(body["alerts"].as_array().unwrap().is_empty());

    let body: Value = server.get("/alerts/recent?kind=fall&limit=5").await.json();
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);

    server
        .get("/alerts/recent?kind=heartbeat")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_configured_subscribers_accept_messages() {
    let config = Config {
        run_fall: false,
        ..test_config()
    };
    let (server, _app) = create_test_server(config).await;

    server
        .post("/queues/accelerometer")
        .text(FALL)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let queues: Vec<Value> = server.get("/queues").await.json();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0]["name"], "datetime");
}

#[tokio::test]
async fn test_shutdown_flushes_recorder() {
    let app = App::start(&test_config()).await.unwrap();
    let state = app.state();
    let server = TestServer::new(api::router(state.clone())).unwrap();

    server.post("/queues/accelerometer").text(FALL).await;
    wait_for_acks(&server).await;

    app.shutdown().await.unwrap();

    assert_eq!(state.storage.count_alerts().await.unwrap(), 1);
}
