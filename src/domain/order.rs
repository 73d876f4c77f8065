//! Order projection used by payment reconciliation.
//!
//! The order aggregate itself belongs to the storefront; this is the slice
//! of it that payments read and update.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::foundation::{OrderId, OrderNumber, Timestamp, ValidationError};
use super::payment::{Currency, PaymentProviderKind, PaymentStatus};

/// Shipping address, Swiss by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub postal_code: String,
    pub city: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "CH".to_string()
}

impl ShippingAddress {
    pub fn swiss(street: impl Into<String>, postal_code: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            street: street.into(),
            postal_code: postal_code.into(),
            city: city.into(),
            country: default_country(),
        }
    }

    /// Single-line rendering for e-mails.
    pub fn one_line(&self) -> String {
        format!("{}, {} {}, {}", self.street, self.postal_code, self.city, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLineItem {
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Progress of the accounting-system sync for a paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LedgerSyncState {
    #[default]
    NotRequested,
    Pending,
    Synced { transaction_id: String },
    Failed { reason: String },
}

/// Fields written by a payment status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusUpdate {
    pub status: PaymentStatus,
    pub payment_id: Option<String>,
    pub paid_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: ShippingAddress,
    pub line_items: Vec<OrderLineItem>,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub payment_provider: Option<PaymentProviderKind>,
    pub payment_status: PaymentStatus,
    pub provider_session_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub paid_at: Option<Timestamp>,
    pub ledger_sync: LedgerSyncState,
    pub created_at: Timestamp,
}

impl OrderRecord {
    /// Creates a pending order.
    pub fn new(
        order_number: OrderNumber,
        customer_name: impl Into<String>,
        customer_email: impl Into<String>,
        shipping_address: ShippingAddress,
        total_amount: Decimal,
        currency: Currency,
    ) -> Result<Self, ValidationError> {
        let customer_email = customer_email.into();
        if customer_email.trim().is_empty() {
            return Err(ValidationError::empty_field("customer_email"));
        }
        if total_amount <= Decimal::ZERO {
            return Err(ValidationError::not_positive("total_amount", total_amount));
        }
        Ok(Self {
            id: OrderId::new(),
            order_number,
            customer_name: customer_name.into(),
            customer_email,
            shipping_address,
            line_items: Vec::new(),
            total_amount,
            currency,
            payment_provider: None,
            payment_status: PaymentStatus::Pending,
            provider_session_id: None,
            provider_payment_id: None,
            paid_at: None,
            ledger_sync: LedgerSyncState::NotRequested,
            created_at: Timestamp::now(),
        })
    }

    pub fn with_line_item(mut self, item: OrderLineItem) -> Self {
        self.line_items.push(item);
        self
    }

    /// Only pending orders may open a checkout session.
    pub fn is_payable(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }

    /// Paid and stamped with a settlement time.
    pub fn is_settled(&self) -> bool {
        self.payment_status == PaymentStatus::Paid && self.paid_at.is_some()
    }

    /// Writes a status transition onto the order.
    ///
    /// Entering `paid` marks the ledger sync as pending.
    pub fn apply_payment_update(&mut self, update: PaymentStatusUpdate) {
        if update.payment_id.is_some() {
            self.provider_payment_id = update.payment_id;
        }
        if update.status == PaymentStatus::Paid {
            self.paid_at = Some(update.paid_at.unwrap_or_else(Timestamp::now));
            self.ledger_sync = LedgerSyncState::Pending;
        }
        self.payment_status = update.status;
    }
}
