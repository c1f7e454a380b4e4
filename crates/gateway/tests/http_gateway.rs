//! HttpGateway against a stub backend

#![cfg(feature = "http")]

use std::time::Duration;

use contracts::{BackendConfig, BackendGateway, GatewayOp, TransportErrorKind};
use gateway::HttpGateway;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> HttpGateway {
    HttpGateway::new(&BackendConfig {
        base_url: format!("{}/", server.uri()),
        request_timeout_ms: 500,
    })
    .unwrap()
}

#[tokio::test]
async fn start_posts_and_decodes_ack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "started", "running": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway_for(&server).start().await.unwrap();
    assert!(ack.running);
    assert_eq!(ack.status, "started");
}

#[tokio::test]
async fn status_reads_running_and_uptime() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"running": false, "uptime": 12})))
        .mount(&server)
        .await;

    let report = gateway_for(&server).status().await.unwrap();
    assert!(!report.running);
    assert_eq!(report.uptime, Some(12));
}

#[tokio::test]
async fn latest_results_accept_backend_row_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"timestamp": "2026-03-01T12:00:00.000001", "meter": 2.5, "pv": 7.9, "sum": 5.4, "net": 5.4},
            {"timestamp": "2026-03-01T12:00:03.000001", "meter": 3.0, "pv": 7.9, "sum": 4.9, "net": 4.9}
        ])))
        .mount(&server)
        .await;

    let samples = gateway_for(&server).fetch_latest().await.unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[1].timestamp.as_str(), "2026-03-01T12:00:03.000001");
    assert!((samples[0].net - 5.4).abs() < 1e-9);
}

#[tokio::test]
async fn server_error_maps_to_status_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stop"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"status": "error", "running": true})),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server).stop().await.unwrap_err();
    assert_eq!(err.operation, GatewayOp::Stop);
    assert_eq!(err.kind, TransportErrorKind::Status(500));
}

#[tokio::test]
async fn malformed_body_maps_to_decode_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = gateway_for(&server).fetch_all().await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Decode);
}

#[tokio::test]
async fn slow_backend_maps_to_timeout_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server).fetch_all().await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn unreachable_backend_maps_to_network_kind() {
    let gateway = HttpGateway::new(&BackendConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_ms: 500,
    })
    .unwrap();

    let err = gateway.status().await.unwrap_err();
    assert!(matches!(
        err.kind,
        TransportErrorKind::Network | TransportErrorKind::Timeout
    ));
}
