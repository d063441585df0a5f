//! Wire-level tests for the Twilio client against an in-process fake API.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use edugrow_notify::gateway::{
    GatewayBody, GatewayConfig, GatewayError, MessagingGateway, OutboundMessage, TwilioGateway,
};
use edugrow_notify::metrics::GATEWAY_LATENCY;

#[derive(Debug, Clone)]
struct CapturedRequest {
    account: String,
    authorization: Option<String>,
    form: HashMap<String, String>,
}

#[derive(Clone)]
struct FakeApi {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    reply: (StatusCode, Value),
    delay: Duration,
}

async fn create_message(
    State(api): State<FakeApi>,
    Path(account): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    api.captured.lock().unwrap().push(CapturedRequest {
        account,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        form,
    });

    if !api.delay.is_zero() {
        tokio::time::sleep(api.delay).await;
    }

    (api.reply.0, Json(api.reply.1.clone()))
}

/// Start the fake API and return its base URL plus the captured requests.
async fn start_fake_api(
    reply: (StatusCode, Value),
    delay: Duration,
) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let api = FakeApi {
        captured: captured.clone(),
        reply,
        delay,
    };

    let app = Router::new()
        .route(
            "/2010-04-01/Accounts/{account}/Messages.json",
            post(create_message),
        )
        .with_state(api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

fn gateway(base_url: String, timeout: Duration) -> TwilioGateway {
    TwilioGateway::new(GatewayConfig {
        account_sid: "AC123".to_string(),
        auth_token: "secret".to_string(),
        base_url,
        channel_prefix: "whatsapp:".to_string(),
        timeout,
    })
    .unwrap()
}

fn text_message(text: &str) -> OutboundMessage {
    OutboundMessage {
        to: "+919876543210".to_string(),
        from: "+14155238886".to_string(),
        body: GatewayBody::Text(text.to_string()),
    }
}

#[tokio::test]
async fn test_text_message_wire_format() {
    let (base_url, captured) = start_fake_api(
        (StatusCode::CREATED, json!({"sid": "SM123", "status": "queued"})),
        Duration::ZERO,
    )
    .await;

    let sid = gateway(base_url, Duration::from_secs(5))
        .send(&text_message("Hello from school"))
        .await;
    let sid = tokio_test::assert_ok!(sid);
    assert_eq!(sid, "SM123");

    let requests = captured.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.account, "AC123");
    assert_eq!(request.authorization.as_deref(), Some("Basic QUMxMjM6c2VjcmV0"));
    assert_eq!(request.form["To"], "whatsapp:+919876543210");
    assert_eq!(request.form["From"], "whatsapp:+14155238886");
    assert_eq!(request.form["Body"], "Hello from school");
    assert!(!request.form.contains_key("ContentSid"));
}

#[tokio::test]
async fn test_template_message_wire_format() {
    let (base_url, captured) = start_fake_api(
        (StatusCode::CREATED, json!({"sid": "SM456"})),
        Duration::ZERO,
    )
    .await;

    let mut variables = BTreeMap::new();
    variables.insert("1".to_string(), "2025-06-01".to_string());
    variables.insert("2".to_string(), "4:30 PM".to_string());
    let message = OutboundMessage {
        to: "+919876543210".to_string(),
        from: "whatsapp:+14155238886".to_string(),
        body: GatewayBody::Template {
            content_sid: "HXreminder".to_string(),
            variables,
        },
    };

    let sid = gateway(base_url, Duration::from_secs(5))
        .send(&message)
        .await
        .unwrap();
    assert_eq!(sid, "SM456");

    let request = captured.lock().unwrap()[0].clone();
    assert_eq!(request.form["From"], "whatsapp:+14155238886");
    assert_eq!(request.form["ContentSid"], "HXreminder");
    let variables: Value = serde_json::from_str(&request.form["ContentVariables"]).unwrap();
    assert_eq!(variables, json!({"1": "2025-06-01", "2": "4:30 PM"}));
    assert!(!request.form.contains_key("Body"));
}

#[tokio::test]
async fn test_vendor_rejection_carries_status_and_message() {
    let (base_url, _) = start_fake_api(
        (
            StatusCode::BAD_REQUEST,
            json!({"code": 21211, "message": "The 'To' number is not a valid phone number.", "status": 400}),
        ),
        Duration::ZERO,
    )
    .await;

    let err = gateway(base_url, Duration::from_secs(5))
        .send(&text_message("hi"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GatewayError::Rejected {
            status: 400,
            detail: "The 'To' number is not a valid phone number. (code 21211)".to_string(),
        }
    );
}

#[tokio::test]
async fn test_success_without_sid_is_invalid_response() {
    let (base_url, _) =
        start_fake_api((StatusCode::OK, json!({"status": "queued"})), Duration::ZERO).await;

    let err = gateway(base_url, Duration::from_secs(5))
        .send(&text_message("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_vendor_times_out() {
    let (base_url, _) = start_fake_api(
        (StatusCode::CREATED, json!({"sid": "SM789"})),
        Duration::from_secs(3),
    )
    .await;

    let err = gateway(base_url, Duration::from_millis(200))
        .send(&text_message("hi"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Timeout(Duration::from_millis(200)));
}

#[tokio::test]
async fn test_unreachable_vendor_is_transport_error() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let observed_before = GATEWAY_LATENCY.get_sample_count();
    let err = gateway(format!("http://{}", addr), Duration::from_secs(2))
        .send(&text_message("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
    // Failed calls still land in the latency histogram
    assert!(GATEWAY_LATENCY.get_sample_count() > observed_before);
}
