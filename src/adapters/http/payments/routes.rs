//! Axum router configuration for payment endpoints.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_session, datatrans_webhook, retry_side_effect, side_effect_status, stripe_webhook,
    PaymentsAppState,
};

/// Checkout routes, mounted at `/api/payments`.
///
/// - `POST /:provider/session` - Open (or reuse) a checkout session
pub fn payment_routes() -> Router<PaymentsAppState> {
    Router::new().route("/:provider/session", post(create_session))
}

/// Provider callback routes, mounted at `/api/webhooks`.
///
/// These routes are authenticated by signature, not by session.
pub fn webhook_routes() -> Router<PaymentsAppState> {
    Router::new()
        .route("/stripe", post(stripe_webhook))
        .route("/datatrans", post(datatrans_webhook))
}

/// Operator routes, mounted at `/api/ops`.
///
/// - `GET /side-effects` - Queue snapshot
/// - `POST /side-effects/:key/retry` - Re-arm a failed side effect
pub fn ops_routes() -> Router<PaymentsAppState> {
    Router::new()
        .route("/side-effects", get(side_effect_status))
        .route("/side-effects/:key/retry", post(retry_side_effect))
}

/// All payment routes under their `/api` prefixes, without state.
pub fn api_router() -> Router<PaymentsAppState> {
    Router::new()
        .nest("/api/payments", payment_routes())
        .nest("/api/webhooks", webhook_routes())
        .nest("/api/ops", ops_routes())
}

/// The complete application with tracing and a request deadline.
pub fn app(state: PaymentsAppState, request_timeout: Duration) -> Router {
    api_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryOrderRepository, MockPaymentProvider};
    use crate::adapters::notification::LoggingNotificationSender;
    use crate::application::{
        CreatePaymentSessionHandler, DispatcherConfig, PaymentProviders, PostPaymentExecutor,
        PostPaymentSettings, ReconcileWebhookHandler, SideEffectDispatcher,
    };
    use crate::domain::foundation::OrderNumber;
    use crate::domain::order::{OrderRecord, ShippingAddress};
    use crate::domain::payment::{
        Currency, PaymentProviderKind, PaymentStatus, PaymentWebhookEvent,
    };
    use crate::ports::{
        LedgerError, LedgerSync, LedgerSyncReceipt, LedgerTransactionStatus, OrderRepository,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixture
    // ════════════════════════════════════════════════════════════════════════════

    struct StubLedger;

    #[async_trait]
    impl LedgerSync for StubLedger {
        async fn sync(&self, order: &OrderRecord) -> Result<LedgerSyncReceipt, LedgerError> {
            Ok(LedgerSyncReceipt {
                external_transaction_id: format!("ext-{}", order.order_number),
                success: true,
                deduplicated: false,
            })
        }

        async fn transaction_status(
            &self,
            external_transaction_id: &str,
        ) -> Result<LedgerTransactionStatus, LedgerError> {
            Ok(LedgerTransactionStatus {
                external_transaction_id: external_transaction_id.to_string(),
                status: "booked".to_string(),
            })
        }
    }

    struct Fixture {
        repo: Arc<InMemoryOrderRepository>,
        mail: LoggingNotificationSender,
        app: Router,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let mail = LoggingNotificationSender::new();
        let providers = PaymentProviders::new()
            .with(Arc::new(MockPaymentProvider::new(PaymentProviderKind::Stripe)))
            .with(Arc::new(MockPaymentProvider::requiring_signature(
                PaymentProviderKind::Datatrans,
                "t=1,s0=good",
            )));
        let executor =
            PostPaymentExecutor::new(repo.clone(), Arc::new(mail.clone()), Arc::new(StubLedger));
        let dispatcher = SideEffectDispatcher::new(
            Arc::new(executor),
            DispatcherConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
                ..Default::default()
            },
        );
        let settings = PostPaymentSettings {
            app_base_url: "https://shop.example.ch".to_string(),
            fulfillment_email: "fulfillment@example.ch".to_string(),
        };

        let state = PaymentsAppState {
            checkout: Arc::new(CreatePaymentSessionHandler::new(
                repo.clone(),
                providers.clone(),
                "https://shop.example.ch",
            )),
            reconcile: Arc::new(ReconcileWebhookHandler::new(
                repo.clone(),
                providers,
                dispatcher.clone(),
                settings,
            )),
            dispatcher,
        };

        Fixture {
            repo,
            mail,
            app: app(state, Duration::from_secs(30)),
        }
    }

    async fn pending_order(repo: &InMemoryOrderRepository) -> OrderRecord {
        let order = OrderRecord::new(
            OrderNumber::new("ORD-1001").unwrap(),
            "Anna Muster",
            "anna@example.ch",
            ShippingAddress::swiss("Bahnhofstrasse 1", "8001", "Zürich"),
            Decimal::new(4990, 2),
            Currency::chf(),
        )
        .unwrap();
        repo.insert(order.clone()).await;
        order
    }

    fn paid_event(order: &OrderRecord) -> Vec<u8> {
        let event = PaymentWebhookEvent {
            provider: PaymentProviderKind::Datatrans,
            event_type: "transaction.update".to_string(),
            session_id: Some("240101000000001".to_string()),
            payment_id: Some("240101000000001".to_string()),
            status: PaymentStatus::Paid,
            amount: Some(Decimal::new(4990, 2)),
            currency: Some(Currency::chf()),
            metadata: HashMap::from([("order_id".to_string(), order.id.to_string())]),
            raw_payload: "{}".to_string(),
        };
        serde_json::to_vec(&event).unwrap()
    }

    fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn datatrans_request(body: Vec<u8>, signature: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/webhooks/datatrans")
            .header("Content-Type", "application/json")
            .header("Datatrans-Signature", signature)
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_session_returns_redirect() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        let response = f
            .app
            .oneshot(post_json(
                "/api/payments/stripe/session",
                format!(r#"{{"orderId":"{}"}}"#, order.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["sessionId"], "mock_stripe_1");
        assert!(body["redirectUrl"].as_str().unwrap().starts_with("https://pay.mock.test/"));
        assert!(body["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn create_session_requires_order_id() {
        let f = fixture();

        let response = f
            .app
            .oneshot(post_json("/api/payments/stripe/session", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn create_session_unknown_provider_is_not_found() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        let response = f
            .app
            .oneshot(post_json(
                "/api/payments/paypal/session",
                format!(r#"{{"orderId":"{}"}}"#, order.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "PROVIDER_NOT_FOUND");
    }

    #[tokio::test]
    async fn create_session_unknown_order_is_not_found() {
        let f = fixture();

        let response = f
            .app
            .oneshot(post_json(
                "/api/payments/stripe/session",
                format!(r#"{{"orderId":"{}"}}"#, crate::domain::foundation::OrderId::new()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "ORDER_NOT_FOUND");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Webhooks
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn datatrans_webhook_marks_order_paid() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        let response = f
            .app
            .oneshot(datatrans_request(paid_event(&order), "t=1,s0=good"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["received"], true);
        assert_eq!(body["outcome"], "applied");

        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(f.mail.sent().len(), 2);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        let response = f
            .app
            .oneshot(datatrans_request(paid_event(&order), "t=1,s0=forged"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unparseable_authenticated_payload_is_acknowledged() {
        let f = fixture();

        let response = f
            .app
            .oneshot(datatrans_request(b"not json".to_vec(), "t=1,s0=good"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["outcome"], "ignored");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Operations
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn side_effect_status_reports_deliveries() {
        let f = fixture();
        let order = pending_order(&f.repo).await;
        f.app
            .clone()
            .oneshot(datatrans_request(paid_event(&order), "t=1,s0=good"))
            .await
            .unwrap();

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri("/api/ops/side-effects")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["delivered"], 3);
        assert_eq!(body["pending"], 0);
        assert_eq!(body["failed"], 0);
    }

    #[tokio::test]
    async fn retry_rejects_malformed_key() {
        let f = fixture();

        let response = f
            .app
            .oneshot(post_json("/api/ops/side-effects/garbage/retry", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn retry_unknown_key_is_not_found() {
        let f = fixture();
        let key = format!("{}:ledger_sync", crate::domain::foundation::OrderId::new());

        let response = f
            .app
            .oneshot(post_json(
                &format!("/api/ops/side-effects/{}/retry", key),
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
