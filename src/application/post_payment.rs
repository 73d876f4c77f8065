//! Post-payment side effects: what runs once an order is paid, and how.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::dispatch::{templates, SideEffect, SideEffectPayload};
use crate::domain::foundation::OrderId;
use crate::domain::order::{LedgerSyncState, OrderRecord};
use crate::ports::{
    LedgerSync, NotificationSender, OrderRepository, SideEffectError, SideEffectExecutor,
};

/// Recipients and links baked into the post-payment e-mails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPaymentSettings {
    pub app_base_url: String,
    pub fulfillment_email: String,
}

impl PostPaymentSettings {
    /// The three effects of a paid order, in dispatch order.
    pub fn effects_for(&self, order: &OrderRecord) -> Vec<SideEffect> {
        vec![
            SideEffect::customer_confirmation(
                order.id,
                templates::customer_confirmation(order, &self.app_base_url),
            ),
            SideEffect::fulfillment_notification(
                order.id,
                templates::fulfillment_notification(order, &self.fulfillment_email),
            ),
            SideEffect::ledger_sync(order.id),
        ]
    }
}

/// Executes one attempt of a post-payment side effect.
pub struct PostPaymentExecutor {
    orders: Arc<dyn OrderRepository>,
    notifications: Arc<dyn NotificationSender>,
    ledger: Arc<dyn LedgerSync>,
}

impl PostPaymentExecutor {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        notifications: Arc<dyn NotificationSender>,
        ledger: Arc<dyn LedgerSync>,
    ) -> Self {
        Self {
            orders,
            notifications,
            ledger,
        }
    }

    async fn sync_ledger(&self, order_id: &OrderId) -> Result<(), SideEffectError> {
        // 1. Load the order as it is now, not as it was when the effect was queued
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| SideEffectError::OrderNotFound(order_id.to_string()))?;

        // 2. A previous process may have synced already
        if let LedgerSyncState::Synced { transaction_id } = &order.ledger_sync {
            tracing::debug!(
                order_id = %order_id,
                transaction_id = %transaction_id,
                "Order already synced to ledger"
            );
            return Ok(());
        }

        // 3. Post to the ledger and record the outcome on the order
        match self.ledger.sync(&order).await {
            Ok(receipt) => {
                self.orders
                    .record_ledger_sync(
                        order_id,
                        LedgerSyncState::Synced {
                            transaction_id: receipt.external_transaction_id.clone(),
                        },
                    )
                    .await?;
                tracing::info!(
                    order_id = %order_id,
                    order_number = %order.order_number,
                    transaction_id = %receipt.external_transaction_id,
                    deduplicated = receipt.deduplicated,
                    "Order synced to ledger"
                );
                Ok(())
            }
            Err(error) => {
                let state = LedgerSyncState::Failed {
                    reason: error.to_string(),
                };
                if let Err(record_error) = self.orders.record_ledger_sync(order_id, state).await {
                    tracing::warn!(
                        order_id = %order_id,
                        error = %record_error,
                        "Could not record ledger sync failure"
                    );
                }
                Err(error.into())
            }
        }
    }
}

#[async_trait]
impl SideEffectExecutor for PostPaymentExecutor {
    async fn execute(&self, effect: &SideEffect) -> Result<(), SideEffectError> {
        match &effect.payload {
            SideEffectPayload::Email(message) => {
                let message_id = self.notifications.send(message).await?;
                tracing::info!(
                    order_id = %effect.order_id,
                    kind = %effect.kind,
                    message_id = message_id.as_deref().unwrap_or("-"),
                    "Notification sent"
                );
                Ok(())
            }
            SideEffectPayload::LedgerSync { order_id } => self.sync_ledger(order_id).await,
        }
    }
}
