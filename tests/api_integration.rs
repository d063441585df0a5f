//! Ops endpoints served from an in-memory application state.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use edugrow_notify::audit::MemoryAuditStore;
use edugrow_notify::config::Settings;
use edugrow_notify::gateway::{GatewayError, MessagingGateway, OutboundMessage};
use edugrow_notify::notification::{
    DispatchRequest, DispatcherConfig, NotificationDispatcher,
};
use edugrow_notify::server::{create_app, AppState};
use edugrow_notify::template::MessageParams;

struct AcceptingGateway;

#[async_trait]
impl MessagingGateway for AcceptingGateway {
    async fn send(&self, _message: &OutboundMessage) -> Result<String, GatewayError> {
        Ok("SM1".to_string())
    }

    fn name(&self) -> &'static str {
        "accepting"
    }
}

fn test_settings() -> Settings {
    serde_json::from_value(json!({
        "gateway": {
            "account_sid": "AC123",
            "auth_token": "secret",
            "from": "+14155238886"
        }
    }))
    .unwrap()
}

fn create_test_state() -> AppState {
    let settings = test_settings();
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(MemoryAuditStore::new()),
        Arc::new(AcceptingGateway),
        DispatcherConfig::from_settings(&settings),
    ));
    AppState::new(settings, dispatcher, None)
}

async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
    let response = create_app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health_reports_store_and_dispatcher() {
    let state = create_test_state();
    state
        .dispatcher
        .dispatch(DispatchRequest::new(
            "9876543210",
            MessageParams::Announcement {
                recipient_name: "Parent".to_string(),
                title: "Holiday".to_string(),
                body: "Closed Friday".to_string(),
            },
        ))
        .await
        .unwrap();

    let (status, body) = get(state, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["store"]["records"], 1);
    assert_eq!(body["dispatcher"]["total_sent"], 1);
    assert!(body.get("postgres").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prometheus_text() {
    let (status, body) = get(create_test_state(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("audit_records_total"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, _) = get(create_test_state(), "/api/v1/notifications").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
