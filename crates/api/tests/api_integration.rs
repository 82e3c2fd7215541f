//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::auth::AccessPolicy;
use api::{AppState, InMemoryBackends, StateOptions};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::PaymentIntentId;
use domain::{IntentStatus, PaymentIntent};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::AccessKind;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with(options: StateOptions) -> (axum::Router, Arc<AppState>, InMemoryBackends) {
    let (state, backends) = api::create_in_memory_state(options);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state, backends)
}

fn setup() -> (axum::Router, InMemoryBackends) {
    let (app, _, backends) = setup_with(StateOptions::default());
    (app, backends)
}

fn seed(backends: &InMemoryBackends, id: &str, status: IntentStatus, metadata: &[(&str, &str)]) {
    backends.processor.insert_intent(PaymentIntent {
        id: PaymentIntentId::parse(id).unwrap(),
        status,
        amount: 9900,
        currency: "usd".to_string(),
        metadata: metadata
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        client_secret: Some(format!("{id}_secret_1")),
    });
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_dispatch_membership_twice() {
    let (app, backends) = setup();
    seed(
        &backends,
        "pi_123",
        IntentStatus::Succeeded,
        &[("funnel_type", "membership"), ("customer_email", "a@b.com")],
    );

    let body = serde_json::json!({ "paymentIntentId": "pi_123" });
    let (status, first) = send(&app, post_json("/payments/dispatch", body.clone())).await;
    let (_, second) = send(&app, post_json("/payments/dispatch", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(
        first["actions_taken"],
        serde_json::json!(["grant_membership_access", "notify_ops"])
    );
    assert_eq!(second, first);
    assert_eq!(
        backends
            .access
            .grant_count(&PaymentIntentId::parse("pi_123").unwrap(), AccessKind::Membership),
        1
    );
}

#[tokio::test]
async fn test_dispatch_processing_intent_is_bad_request() {
    let (app, backends) = setup();
    seed(
        &backends,
        "pi_proc",
        IntentStatus::Processing,
        &[("funnel_type", "membership")],
    );

    let (status, json) = send(
        &app,
        post_json("/payments/dispatch", serde_json::json!({ "paymentIntentId": "pi_proc" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_state");
    assert_eq!(backends.access.total_grants(), 0);
}

#[tokio::test]
async fn test_dispatch_unknown_funnel_is_skipped() {
    let (app, backends) = setup();
    seed(
        &backends,
        "pi_x",
        IntentStatus::Succeeded,
        &[("funnel_type", "unknown_x")],
    );

    let (status, json) = send(
        &app,
        post_json("/payments/dispatch", serde_json::json!({ "paymentIntentId": "pi_x" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["skipped_reason"], "Unknown funnel type: unknown_x");
    assert_eq!(json["actions_taken"], serde_json::json!([]));
}

#[tokio::test]
async fn test_dispatch_input_errors() {
    let (app, backends) = setup();

    let (missing, json) = send(&app, post_json("/payments/dispatch", serde_json::json!({}))).await;
    assert_eq!(missing, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "input");

    let (wrong_prefix, _) = send(
        &app,
        post_json("/payments/dispatch", serde_json::json!({ "paymentIntentId": "seti_1" })),
    )
    .await;
    assert_eq!(wrong_prefix, StatusCode::BAD_REQUEST);
    assert_eq!(backends.processor.retrieve_calls(), 0);

    let (not_found, _) = send(
        &app,
        post_json("/payments/dispatch", serde_json::json!({ "paymentIntentId": "pi_none" })),
    )
    .await;
    assert_eq!(not_found, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upstream_failure_hides_detail() {
    let (app, backends) = setup();
    seed(&backends, "pi_down", IntentStatus::Succeeded, &[]);
    backends.processor.set_fail_upstream(true);

    let (status, json) = send(
        &app,
        post_json("/payments/dispatch", serde_json::json!({ "paymentIntentId": "pi_down" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["kind"], "upstream");
    assert_eq!(json["error"], "Payment processor unavailable, retry later");
}

#[tokio::test]
async fn test_billing_address_preserves_existing_metadata() {
    let (app, backends) = setup();
    seed(
        &backends,
        "pi_456",
        IntentStatus::RequiresAction,
        &[("funnel_type", "coaching")],
    );

    let (status, json) = send(
        &app,
        post_json(
            "/payments/billing-address",
            serde_json::json!({
                "paymentIntentId": "pi_456",
                "billingAddress": { "city": "LA" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["metadata"]["funnel_type"], "coaching");
    assert_eq!(json["metadata"]["billing_city"], "LA");
    assert_eq!(json["metadata"]["billing_country"], "");

    let stored = backends
        .processor
        .intent(&PaymentIntentId::parse("pi_456").unwrap())
        .unwrap();
    assert_eq!(stored.metadata["funnel_type"], "coaching");
}

#[tokio::test]
async fn test_cart_and_recovery() {
    let (app, backends) = setup();
    seed(
        &backends,
        "pi_cart",
        IntentStatus::RequiresAction,
        &[("customer_email", "a@b.com"), ("funnel_type", "membership")],
    );

    let (status, _) = send(
        &app,
        post_json(
            "/payments/cart",
            serde_json::json!({ "paymentIntentId": "pi_cart", "addOns": ["workbook", "replay"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        post_json("/payments/recovery", serde_json::json!({ "paymentIntentId": "pi_cart" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["customer"]["email"], "a@b.com");
    assert_eq!(json["addOns"], serde_json::json!(["workbook", "replay"]));
    assert_eq!(json["clientSecret"], "pi_cart_secret_1");
    assert_eq!(json["status"], "requires_action");
}

#[tokio::test]
async fn test_client_secret_endpoint() {
    let (app, backends) = setup();
    seed(&backends, "pi_cs", IntentStatus::RequiresAction, &[]);

    let (status, json) = send(&app, get("/payments/pi_cs/client-secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["clientSecret"], "pi_cs_secret_1");

    let (status, _) = send(&app, get("/payments/sub_1/client-secret")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approval_request_resume_and_status() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        post_json(
            "/approvals/split-payments",
            serde_json::json!({ "splitPaymentId": "sp_1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["token"], "split-payment:sp_1");

    let (status, json) = send(&app, get("/approvals/split-payments/sp_1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "pending");

    let (status, json) = send(
        &app,
        post_json(
            "/approvals/split-payments/resume",
            serde_json::json!({ "splitPaymentId": "sp_1", "approved": false, "comment": "split mismatch" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "resolved");
    assert_eq!(json["decision"]["approved"], false);
    assert_eq!(json["decision"]["comment"], "split mismatch");

    let (status, json) = send(
        &app,
        post_json(
            "/approvals/split-payments/resume",
            serde_json::json!({ "splitPaymentId": "sp_1", "approved": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "already_resolved");
}

#[tokio::test]
async fn test_resume_errors() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        post_json(
            "/approvals/split-payments/resume",
            serde_json::json!({ "splitPaymentId": "never", "approved": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (status, _) = send(
        &app,
        post_json(
            "/approvals/split-payments/resume",
            serde_json::json!({ "splitPaymentId": "sp_x", "approved": "yes" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            "/approvals/split-payments/resume",
            serde_json::json!({ "approved": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_second_request_while_waiting_is_conflict() {
    let (app, _) = setup();
    let body = serde_json::json!({ "splitPaymentId": "sp_dup" });

    let (first, _) = send(&app, post_json("/approvals/split-payments", body.clone())).await;
    let (second, json) = send(&app, post_json("/approvals/split-payments", body)).await;

    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "already_pending");
}

#[tokio::test]
async fn test_resume_requires_allowed_operator() {
    let (app, _, _) = setup_with(StateOptions {
        policy: AccessPolicy::new(Vec::new(), vec!["example.com".to_string()]),
        ..StateOptions::default()
    });

    send(
        &app,
        post_json(
            "/approvals/split-payments",
            serde_json::json!({ "splitPaymentId": "sp_auth" }),
        ),
    )
    .await;

    let mut denied = post_json(
        "/approvals/split-payments/resume",
        serde_json::json!({ "splitPaymentId": "sp_auth", "approved": true }),
    );
    denied
        .headers_mut()
        .insert("x-operator-email", "intruder@evil.test".parse().unwrap());
    let (status, json) = send(&app, denied).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "forbidden");

    let mut allowed = post_json(
        "/approvals/split-payments/resume",
        serde_json::json!({ "splitPaymentId": "sp_auth", "approved": true }),
    );
    allowed
        .headers_mut()
        .insert("x-operator-email", "ops@example.com".parse().unwrap());
    let (status, _) = send(&app, allowed).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/plain"));
}
