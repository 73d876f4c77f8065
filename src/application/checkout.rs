//! CreatePaymentSessionHandler - Command handler for opening a checkout session.
//!
//! Customers double-click, reload and retry. Requests for the same order are
//! serialized on a per-order lock, and a session that is still open at the
//! same provider is handed out again instead of creating another one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::domain::foundation::{DomainError, OrderId, Timestamp};
use crate::domain::payment::{
    PaymentError, PaymentProviderKind, PaymentSession, PaymentSessionRequest, PaymentStatus,
};
use crate::ports::OrderRepository;

use super::PaymentProviders;

/// Command to open a checkout session for an order.
#[derive(Debug, Clone)]
pub struct CreatePaymentSessionCommand {
    pub order_id: OrderId,
    pub provider: PaymentProviderKind,
}

/// Why a checkout session could not be opened.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Order {order_id} is not payable in status {status}")]
    NotPayable {
        order_id: OrderId,
        status: PaymentStatus,
    },

    #[error("Payment provider {0} is not available")]
    ProviderUnavailable(PaymentProviderKind),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] DomainError),
}

type SessionSlot = Arc<tokio::sync::Mutex<Option<PaymentSession>>>;

/// Handler for opening checkout sessions.
pub struct CreatePaymentSessionHandler {
    orders: Arc<dyn OrderRepository>,
    providers: PaymentProviders,
    app_base_url: String,
    sessions: Mutex<HashMap<OrderId, SessionSlot>>,
}

impl CreatePaymentSessionHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        providers: PaymentProviders,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            providers,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePaymentSessionCommand,
    ) -> Result<PaymentSession, CheckoutError> {
        let provider = self
            .providers
            .get(cmd.provider)
            .ok_or(CheckoutError::ProviderUnavailable(cmd.provider))?;

        // 1. Serialize requests for this order
        let slot = self.slot(cmd.order_id);
        let mut last_session = slot.lock().await;

        // 2. Order must exist and still await payment
        let order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(cmd.order_id))?;

        if !order.is_payable() {
            return Err(CheckoutError::NotPayable {
                order_id: order.id,
                status: order.payment_status,
            });
        }

        // 3. Hand out the open session again if there is one
        if let Some(session) = last_session.as_ref() {
            if session.provider == cmd.provider && !session.is_expired_at(&Timestamp::now()) {
                tracing::info!(
                    order_id = %order.id,
                    provider = %cmd.provider,
                    session_id = %session.session_id,
                    "Reusing open checkout session"
                );
                return Ok(session.clone());
            }
        }

        // 4. Open a new session at the provider
        let request = PaymentSessionRequest {
            order_id: order.id,
            order_number: order.order_number.clone(),
            amount: order.total_amount,
            currency: Some(order.currency.clone()),
            customer_email: order.customer_email.clone(),
            customer_name: order.customer_name.clone(),
            success_url: self.success_url(&order.id, cmd.provider),
            cancel_url: self.cancel_url(&order.id, cmd.provider),
        };
        let session = provider.create_session(request).await?;

        // 5. Remember it on the order so callbacks can find it
        self.orders
            .record_session(&order.id, cmd.provider, &session.session_id)
            .await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            provider = %cmd.provider,
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "Checkout session created"
        );

        *last_session = Some(session.clone());
        Ok(session)
    }

    fn slot(&self, order_id: OrderId) -> SessionSlot {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.entry(order_id).or_default().clone()
    }

    fn success_url(&self, order_id: &OrderId, provider: PaymentProviderKind) -> String {
        format!(
            "{}/checkout/success?orderId={}&provider={}",
            self.app_base_url, order_id, provider
        )
    }

    fn cancel_url(&self, order_id: &OrderId, provider: PaymentProviderKind) -> String {
        format!(
            "{}/checkout/failure?orderId={}&provider={}&code=cancelled",
            self.app_base_url, order_id, provider
        )
    }
}
