//! ReconcileWebhookHandler - turns a provider callback into an order update.
//!
//! Providers redeliver and reorder callbacks. The stored status only moves
//! along state machine edges, the write is a compare-and-set, and the
//! post-payment side effects fire only for the delivery that moved the order
//! into `paid`.

use std::sync::Arc;
use thiserror::Error;

use crate::domain::foundation::{DomainError, OrderId, Timestamp};
use crate::domain::order::{OrderRecord, PaymentStatusUpdate};
use crate::domain::payment::{
    PaymentError, PaymentEventRecord, PaymentProviderKind, PaymentStatus, PaymentTransition,
    PaymentWebhookEvent,
};
use crate::ports::OrderRepository;

use super::{PaymentProviders, PostPaymentSettings, SideEffectDispatcher};

/// Command carrying one raw provider callback.
#[derive(Debug, Clone)]
pub struct ReconcileWebhookCommand {
    pub provider: PaymentProviderKind,
    pub payload: Vec<u8>,
    pub signature: Option<String>,
}

/// What a callback did to its order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The order moved from `from` to `to`.
    Applied {
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
        side_effects_dispatched: usize,
    },

    /// The callback was valid but changed nothing.
    NoOp {
        order_id: OrderId,
        reason: &'static str,
    },

    /// No order matches the callback's references.
    OrderNotFound { correlation_id: String },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Webhook signature verification failed")]
    Unauthenticated,

    #[error("Payment provider {0} is not available")]
    ProviderUnavailable(PaymentProviderKind),

    #[error(transparent)]
    InvalidPayload(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] DomainError),
}

pub struct ReconcileWebhookHandler {
    orders: Arc<dyn OrderRepository>,
    providers: PaymentProviders,
    dispatcher: SideEffectDispatcher,
    settings: PostPaymentSettings,
}

impl ReconcileWebhookHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        providers: PaymentProviders,
        dispatcher: SideEffectDispatcher,
        settings: PostPaymentSettings,
    ) -> Self {
        Self {
            orders,
            providers,
            dispatcher,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcileWebhookCommand,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let provider = self
            .providers
            .get(cmd.provider)
            .ok_or(ReconcileError::ProviderUnavailable(cmd.provider))?;

        // 1. Authenticate
        if !provider.verify_webhook(&cmd.payload, cmd.signature.as_deref()) {
            tracing::warn!(
                provider = %cmd.provider,
                has_signature = cmd.signature.is_some(),
                "Webhook signature verification failed"
            );
            return Err(ReconcileError::Unauthenticated);
        }

        // 2. Normalize
        let event = provider.parse_callback(&cmd.payload).map_err(|err| {
            tracing::warn!(provider = %cmd.provider, error = %err, "Unparseable webhook payload");
            err
        })?;
        let correlation_id = event.correlation_id();

        // 3. Locate the order
        let Some(order) = self.locate_order(&event).await? else {
            tracing::warn!(
                provider = %cmd.provider,
                correlation_id = %correlation_id,
                event_type = %event.event_type,
                "No order matches webhook"
            );
            return Ok(ReconcileOutcome::OrderNotFound { correlation_id });
        };

        if let Some(amount) = event.amount {
            if amount != order.total_amount {
                tracing::warn!(
                    order_id = %order.id,
                    expected = %order.total_amount,
                    reported = %amount,
                    "Webhook amount differs from order total"
                );
            }
        }

        // 4. Classify and apply
        let transition = PaymentTransition::evaluate(order.payment_status, event.status);
        let mut updated = order.clone();
        let applied = match transition {
            PaymentTransition::Applied { from, to } => {
                let update = PaymentStatusUpdate {
                    status: to,
                    payment_id: event.payment_id.clone(),
                    paid_at: (to == PaymentStatus::Paid).then(Timestamp::now),
                };
                let applied = self
                    .orders
                    .transition_payment(&order.id, from, update.clone())
                    .await?;
                if applied {
                    updated.apply_payment_update(update);
                }
                applied
            }
            _ => false,
        };

        let (status_after, outcome_label) = match transition {
            PaymentTransition::Applied { to, .. } if applied => (to, transition.label()),
            PaymentTransition::Applied { .. } => (order.payment_status, "superseded"),
            _ => (order.payment_status, transition.label()),
        };

        // 5. Audit. Once the status has moved, a failed audit write must
        // not keep the side effects from firing: a redelivery is a duplicate.
        let audit = self
            .orders
            .append_payment_event(PaymentEventRecord {
                order_id: order.id,
                provider: cmd.provider,
                event_type: event.event_type.clone(),
                status_before: order.payment_status,
                status_after,
                outcome: outcome_label.to_string(),
                correlation_id: correlation_id.clone(),
                recorded_at: Timestamp::now(),
            })
            .await;
        if let Err(err) = audit {
            tracing::error!(
                order_id = %order.id,
                correlation_id = %correlation_id,
                outcome = outcome_label,
                error = %err,
                "Failed to record payment event"
            );
        }

        if !applied {
            tracing::info!(
                order_id = %order.id,
                provider = %cmd.provider,
                current = %order.payment_status,
                incoming = %event.status,
                outcome = outcome_label,
                "Webhook acknowledged without status change"
            );
            return Ok(ReconcileOutcome::NoOp {
                order_id: order.id,
                reason: outcome_label,
            });
        }

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            provider = %cmd.provider,
            from = %order.payment_status,
            to = %event.status,
            correlation_id = %correlation_id,
            "Payment status updated"
        );

        // 6. Side effects, only for the delivery that entered paid
        let side_effects_dispatched = if transition.entered_paid() {
            self.dispatch_side_effects(&updated).await
        } else {
            0
        };

        Ok(ReconcileOutcome::Applied {
            order_id: order.id,
            from: order.payment_status,
            to: event.status,
            side_effects_dispatched,
        })
    }

    async fn locate_order(
        &self,
        event: &PaymentWebhookEvent,
    ) -> Result<Option<OrderRecord>, DomainError> {
        if let Some(order_id) = event.order_id_hint() {
            if let Some(order) = self.orders.find_by_id(&order_id).await? {
                return Ok(Some(order));
            }
        }
        if let Some(order_number) = event.order_number_hint() {
            if let Some(order) = self.orders.find_by_order_number(order_number).await? {
                return Ok(Some(order));
            }
        }
        if let Some(session_id) = &event.session_id {
            if let Some(order) = self.orders.find_by_session_id(session_id).await? {
                return Ok(Some(order));
            }
        }
        if let Some(payment_id) = &event.payment_id {
            if let Some(order) = self.orders.find_by_payment_id(payment_id).await? {
                return Ok(Some(order));
            }
        }
        Ok(None)
    }

    /// `order` is the record as written by the winning transition.
    async fn dispatch_side_effects(&self, order: &OrderRecord) -> usize {
        let effects = self.settings.effects_for(order);
        let count = effects.len();
        let results = self.dispatcher.dispatch_all(effects).await;

        let delivered = results.iter().filter(|(_, delivered)| *delivered).count();
        tracing::info!(
            order_id = %order.id,
            dispatched = count,
            delivered,
            "Post-payment side effects dispatched"
        );
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryOrderRepository, MockPaymentProvider};
    use crate::adapters::notification::LoggingNotificationSender;
    use crate::application::{DispatcherConfig, PostPaymentExecutor};
    use crate::domain::foundation::{ErrorCode, OrderNumber};
    use crate::domain::order::{LedgerSyncState, ShippingAddress};
    use crate::domain::payment::Currency;
    use crate::ports::{
        LedgerError, LedgerSync, LedgerSyncReceipt, LedgerTransactionStatus,
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock ledger
    // ════════════════════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct CountingLedger {
        syncs: AtomicU32,
    }

    #[async_trait]
    impl LedgerSync for CountingLedger {
        async fn sync(&self, _order: &OrderRecord) -> Result<LedgerSyncReceipt, LedgerError> {
            let n = self.syncs.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(LedgerSyncReceipt {
                external_transaction_id: format!("ext-{}", n),
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

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        repo: Arc<InMemoryOrderRepository>,
        mail: LoggingNotificationSender,
        ledger: Arc<CountingLedger>,
        provider: MockPaymentProvider,
        handler: ReconcileWebhookHandler,
    }

    fn fixture_with(provider: MockPaymentProvider) -> Fixture {
        fixture_over(provider, |repo| repo as Arc<dyn OrderRepository>)
    }

    /// Builds the handler over `orders(repo)` while the executor keeps the plain repository.
    fn fixture_over(
        provider: MockPaymentProvider,
        orders: impl FnOnce(Arc<InMemoryOrderRepository>) -> Arc<dyn OrderRepository>,
    ) -> Fixture {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let mail = LoggingNotificationSender::new();
        let ledger = Arc::new(CountingLedger::default());
        let executor = PostPaymentExecutor::new(repo.clone(), Arc::new(mail.clone()), ledger.clone());
        let dispatcher = SideEffectDispatcher::new(
            Arc::new(executor),
            DispatcherConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
                ..Default::default()
            },
        );
        let handler = ReconcileWebhookHandler::new(
            orders(repo.clone()),
            PaymentProviders::new().with(Arc::new(provider.clone())),
            dispatcher,
            PostPaymentSettings {
                app_base_url: "https://shop.example.ch".to_string(),
                fulfillment_email: "fulfillment@example.ch".to_string(),
            },
        );
        Fixture {
            repo,
            mail,
            ledger,
            provider,
            handler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockPaymentProvider::new(PaymentProviderKind::Datatrans))
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

    fn event(status: PaymentStatus, metadata: &[(&str, &str)]) -> PaymentWebhookEvent {
        PaymentWebhookEvent {
            provider: PaymentProviderKind::Datatrans,
            event_type: "transaction.update".to_string(),
            session_id: Some("240101000000001".to_string()),
            payment_id: Some("240101000000001".to_string()),
            status,
            amount: Some(Decimal::new(4990, 2)),
            currency: Some(Currency::chf()),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            raw_payload: "{}".to_string(),
        }
    }

    fn cmd(event: &PaymentWebhookEvent) -> ReconcileWebhookCommand {
        ReconcileWebhookCommand {
            provider: event.provider,
            payload: serde_json::to_vec(event).unwrap(),
            signature: Some("sig".to_string()),
        }
    }

    /// Delegates to the in-memory repository but rejects the next `failures` audit writes.
    struct FailingAuditRepository {
        inner: Arc<InMemoryOrderRepository>,
        failures: AtomicU32,
    }

    #[async_trait]
    impl OrderRepository for FailingAuditRepository {
        async fn find_by_id(&self, id: &OrderId) -> Result<Option<OrderRecord>, DomainError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_order_number(
            &self,
            order_number: &str,
        ) -> Result<Option<OrderRecord>, DomainError> {
            self.inner.find_by_order_number(order_number).await
        }

        async fn find_by_session_id(
            &self,
            session_id: &str,
        ) -> Result<Option<OrderRecord>, DomainError> {
            self.inner.find_by_session_id(session_id).await
        }

        async fn find_by_payment_id(
            &self,
            payment_id: &str,
        ) -> Result<Option<OrderRecord>, DomainError> {
            self.inner.find_by_payment_id(payment_id).await
        }

        async fn record_session(
            &self,
            id: &OrderId,
            provider: PaymentProviderKind,
            session_id: &str,
        ) -> Result<(), DomainError> {
            self.inner.record_session(id, provider, session_id).await
        }

        async fn transition_payment(
            &self,
            id: &OrderId,
            expected: PaymentStatus,
            update: PaymentStatusUpdate,
        ) -> Result<bool, DomainError> {
            self.inner.transition_payment(id, expected, update).await
        }

        async fn record_ledger_sync(
            &self,
            id: &OrderId,
            state: LedgerSyncState,
        ) -> Result<(), DomainError> {
            self.inner.record_ledger_sync(id, state).await
        }

        async fn append_payment_event(
            &self,
            record: PaymentEventRecord,
        ) -> Result<(), DomainError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    "audit insert failed",
                ));
            }
            self.inner.append_payment_event(record).await
        }

        async fn payment_events(
            &self,
            id: &OrderId,
        ) -> Result<Vec<PaymentEventRecord>, DomainError> {
            self.inner.payment_events(id).await
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Applying transitions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn paid_callback_moves_order_and_fires_side_effects() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        let outcome = f
            .handler
            .handle(cmd(&event(PaymentStatus::Paid, &[("refno", "ORD-1001")])))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                order_id: order.id,
                from: PaymentStatus::Pending,
                to: PaymentStatus::Paid,
                side_effects_dispatched: 3,
            }
        );

        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert!(stored.paid_at.is_some());
        assert_eq!(stored.provider_payment_id.as_deref(), Some("240101000000001"));
        assert_eq!(
            stored.ledger_sync,
            LedgerSyncState::Synced {
                transaction_id: "ext-1".to_string()
            }
        );
        assert_eq!(f.mail.sent_to("anna@example.ch"), 1);
        assert_eq!(f.mail.sent_to("fulfillment@example.ch"), 1);
    }

    #[tokio::test]
    async fn redelivered_paid_callback_is_a_no_op() {
        let f = fixture();
        let order = pending_order(&f.repo).await;
        let paid = event(PaymentStatus::Paid, &[("refno", "ORD-1001")]);

        f.handler.handle(cmd(&paid)).await.unwrap();
        let second = f.handler.handle(cmd(&paid)).await.unwrap();

        assert_eq!(
            second,
            ReconcileOutcome::NoOp {
                order_id: order.id,
                reason: "duplicate"
            }
        );
        assert_eq!(f.mail.sent().len(), 2);
        assert_eq!(f.ledger.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_audit_write_still_fires_side_effects() {
        let f = fixture_over(
            MockPaymentProvider::new(PaymentProviderKind::Datatrans),
            |repo| {
                Arc::new(FailingAuditRepository {
                    inner: repo,
                    failures: AtomicU32::new(1),
                }) as Arc<dyn OrderRepository>
            },
        );
        let order = pending_order(&f.repo).await;
        let paid = event(PaymentStatus::Paid, &[("refno", "ORD-1001")]);

        let first = f.handler.handle(cmd(&paid)).await.unwrap();
        assert_eq!(
            first,
            ReconcileOutcome::Applied {
                order_id: order.id,
                from: PaymentStatus::Pending,
                to: PaymentStatus::Paid,
                side_effects_dispatched: 3,
            }
        );
        assert_eq!(f.mail.sent().len(), 2);
        assert_eq!(f.ledger.syncs.load(Ordering::SeqCst), 1);
        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(
            stored.ledger_sync,
            LedgerSyncState::Synced {
                transaction_id: "ext-1".to_string()
            }
        );

        // The redelivery is recognised as a duplicate and fires nothing.
        let second = f.handler.handle(cmd(&paid)).await.unwrap();
        assert_eq!(
            second,
            ReconcileOutcome::NoOp {
                order_id: order.id,
                reason: "duplicate"
            }
        );
        assert_eq!(f.mail.sent().len(), 2);
        assert_eq!(f.ledger.syncs.load(Ordering::SeqCst), 1);
        assert_eq!(f.repo.payment_events(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn processing_then_paid_fires_side_effects_once() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        let processing = f
            .handler
            .handle(cmd(&event(PaymentStatus::Processing, &[("refno", "ORD-1001")])))
            .await
            .unwrap();
        assert!(matches!(
            processing,
            ReconcileOutcome::Applied {
                side_effects_dispatched: 0,
                ..
            }
        ));

        f.handler
            .handle(cmd(&event(PaymentStatus::Paid, &[("refno", "ORD-1001")])))
            .await
            .unwrap();

        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(f.ledger.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn late_processing_after_paid_is_ignored() {
        let f = fixture();
        let order = pending_order(&f.repo).await;

        f.handler
            .handle(cmd(&event(PaymentStatus::Paid, &[("refno", "ORD-1001")])))
            .await
            .unwrap();
        let late = f
            .handler
            .handle(cmd(&event(PaymentStatus::Processing, &[("refno", "ORD-1001")])))
            .await
            .unwrap();

        assert_eq!(
            late,
            ReconcileOutcome::NoOp {
                order_id: order.id,
                reason: "terminal_no_op"
            }
        );
        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn every_delivery_is_audited() {
        let f = fixture();
        let order = pending_order(&f.repo).await;
        let paid = event(PaymentStatus::Paid, &[("refno", "ORD-1001")]);

        f.handler.handle(cmd(&paid)).await.unwrap();
        f.handler.handle(cmd(&paid)).await.unwrap();

        let events = f.repo.payment_events(&order.id).await.unwrap();
        let outcomes: Vec<_> = events.iter().map(|e| e.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["applied", "duplicate"]);
        assert_eq!(events[0].status_before, PaymentStatus::Pending);
        assert_eq!(events[0].status_after, PaymentStatus::Paid);
        assert_eq!(events[0].correlation_id, "240101000000001");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Locating orders
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn order_id_metadata_takes_precedence() {
        let f = fixture();
        let order = pending_order(&f.repo).await;
        let order_id = order.id.to_string();

        let outcome = f
            .handler
            .handle(cmd(&event(
                PaymentStatus::Processing,
                &[("order_id", order_id.as_str()), ("refno", "ORD-9999")],
            )))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Applied { order_id, .. } if order_id == order.id));
    }

    #[tokio::test]
    async fn falls_back_to_session_id() {
        let f = fixture();
        let order = pending_order(&f.repo).await;
        f.repo
            .record_session(&order.id, PaymentProviderKind::Datatrans, "240101000000001")
            .await
            .unwrap();

        let outcome = f
            .handler
            .handle(cmd(&event(PaymentStatus::Processing, &[])))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Applied { order_id, .. } if order_id == order.id));
    }

    #[tokio::test]
    async fn unknown_order_is_acknowledged() {
        let f = fixture();

        let outcome = f
            .handler
            .handle(cmd(&event(PaymentStatus::Paid, &[("refno", "ORD-404")])))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::OrderNotFound {
                correlation_id: "240101000000001".to_string()
            }
        );
        assert!(f.mail.sent().is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Rejections
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unauthenticated_payload_is_rejected_before_parsing() {
        let f = fixture_with(MockPaymentProvider::rejecting_webhooks(
            PaymentProviderKind::Datatrans,
        ));
        let order = pending_order(&f.repo).await;

        let result = f
            .handler
            .handle(cmd(&event(PaymentStatus::Paid, &[("refno", "ORD-1001")])))
            .await;

        assert!(matches!(result, Err(ReconcileError::Unauthenticated)));
        assert_eq!(f.provider.call_count("parse_callback"), 0);
        let stored = f.repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unparseable_payload_is_an_error() {
        let f = fixture();

        let result = f
            .handler
            .handle(ReconcileWebhookCommand {
                provider: PaymentProviderKind::Datatrans,
                payload: b"not json".to_vec(),
                signature: None,
            })
            .await;

        assert!(matches!(result, Err(ReconcileError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn unregistered_provider_is_unavailable() {
        let f = fixture();

        let mut stripe_event = event(PaymentStatus::Paid, &[]);
        stripe_event.provider = PaymentProviderKind::Stripe;

        let result = f.handler.handle(cmd(&stripe_event)).await;

        assert!(matches!(
            result,
            Err(ReconcileError::ProviderUnavailable(PaymentProviderKind::Stripe))
        ));
    }
}
