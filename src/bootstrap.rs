//! Startup wiring.
//!
//! Turns a validated [`AppConfig`] and an order store into the HTTP state:
//!
//! 1. Notification sender (Resend when a key is set, log-only otherwise)
//! 2. Payment providers (Stripe, Datatrans)
//! 3. Ledger adapter (Infoniqa)
//! 4. Post-payment executor and side-effect dispatcher
//! 5. Checkout and reconciliation handlers

use std::sync::Arc;

use crate::adapters::datatrans::DatatransPaymentAdapter;
use crate::adapters::http::PaymentsAppState;
use crate::adapters::infoniqa::InfoniqaLedgerAdapter;
use crate::adapters::notification::{LoggingNotificationSender, ResendNotificationSender};
use crate::adapters::stripe::StripePaymentAdapter;
use crate::application::{
    CreatePaymentSessionHandler, PaymentProviders, PostPaymentExecutor, PostPaymentSettings,
    ReconcileWebhookHandler, SideEffectDispatcher,
};
use crate::config::{AppConfig, ValidationError};
use crate::ports::{NotificationSender, OrderRepository};

/// Builds the application state from configuration.
///
/// Missing credentials are not an error here; the affected adapter reports
/// `NotConfigured` when it is first used.
pub fn bootstrap(
    config: &AppConfig,
    orders: Arc<dyn OrderRepository>,
) -> Result<PaymentsAppState, ValidationError> {
    let notifications: Arc<dyn NotificationSender> =
        match config.notification.resend_config(config.payment.provider_timeout()) {
            Some(resend) => Arc::new(ResendNotificationSender::new(resend)),
            None => {
                tracing::warn!("Resend API key not configured, e-mails will only be logged");
                Arc::new(LoggingNotificationSender::new())
            }
        };

    let providers = PaymentProviders::new()
        .with(Arc::new(StripePaymentAdapter::new(config.payment.stripe_config()?)))
        .with(Arc::new(DatatransPaymentAdapter::new(
            config.payment.datatrans_config()?,
        )));

    if !config.ledger.is_configured() {
        tracing::warn!("Infoniqa credentials not configured, ledger sync will fail");
    }
    let ledger = Arc::new(InfoniqaLedgerAdapter::new(config.ledger.infoniqa_config()));

    let executor = PostPaymentExecutor::new(orders.clone(), notifications, ledger);
    let dispatcher =
        SideEffectDispatcher::new(Arc::new(executor), config.dispatch.dispatcher_config());

    let settings = PostPaymentSettings {
        app_base_url: config.payment.app_base_url.clone(),
        fulfillment_email: config.notification.fulfillment_email.clone(),
    };

    let checkout = CreatePaymentSessionHandler::new(
        orders.clone(),
        providers.clone(),
        config.payment.app_base_url.clone(),
    );
    let reconcile = ReconcileWebhookHandler::new(orders, providers, dispatcher.clone(), settings);

    tracing::info!(
        stripe_test_mode = config.payment.is_stripe_test_mode(),
        ledger_configured = config.ledger.is_configured(),
        max_attempts = config.dispatch.max_attempts,
        "Payment services initialized"
    );

    Ok(PaymentsAppState {
        checkout: Arc::new(checkout),
        reconcile: Arc::new(reconcile),
        dispatcher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryOrderRepository;

    #[tokio::test]
    async fn bootstraps_without_credentials() {
        let config = AppConfig::default();
        let state = bootstrap(&config, Arc::new(InMemoryOrderRepository::new())).unwrap();

        let status = state.dispatcher.queue_status().await;
        assert_eq!(status.pending, 0);
        assert_eq!(status.delivered, 0);
    }

    #[test]
    fn rejects_invalid_default_currency() {
        let mut config = AppConfig::default();
        config.payment.default_currency = "francs".to_string();

        let result = bootstrap(&config, Arc::new(InMemoryOrderRepository::new()));

        assert!(matches!(result, Err(ValidationError::InvalidCurrency(_))));
    }
}
