//! Provider status normalization.
//!
//! Each provider gets a static, case-insensitive lookup table from its own
//! status vocabulary to [`PaymentStatus`]. Inputs missing from a table map
//! to `Pending` and are logged; an unknown word never becomes terminal.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{PaymentProviderKind, PaymentStatus};

static STRIPE_STATUSES: Lazy<HashMap<&'static str, PaymentStatus>> = Lazy::new(|| {
    use PaymentStatus::*;
    HashMap::from([
        // checkout.session payment_status / status
        ("paid", Paid),
        ("no_payment_required", Paid),
        ("unpaid", Pending),
        ("open", Pending),
        ("expired", Expired),
        // payment_intent status
        ("succeeded", Paid),
        ("processing", Processing),
        ("requires_payment_method", Pending),
        ("requires_confirmation", Pending),
        ("requires_action", Pending),
        ("requires_capture", Processing),
        ("canceled", Cancelled),
        ("cancelled", Cancelled),
        ("payment_failed", Failed),
        ("failed", Failed),
    ])
});

static DATATRANS_STATUSES: Lazy<HashMap<&'static str, PaymentStatus>> = Lazy::new(|| {
    use PaymentStatus::*;
    HashMap::from([
        // structured transaction status
        ("initialized", Pending),
        ("pending", Pending),
        ("challenge_required", Processing),
        ("challenge_ongoing", Processing),
        ("authenticated", Processing),
        ("authorized", Processing),
        ("settled", Paid),
        ("transmitted", Paid),
        ("failed", Failed),
        ("declined", Failed),
        ("canceled", Cancelled),
        ("cancelled", Cancelled),
        ("expired", Expired),
        // legacy response codes
        ("01", Paid),
        ("02", Processing),
        ("1403", Failed),
        ("1404", Failed),
        ("1405", Failed),
        ("1406", Failed),
        // legacy status words
        ("success", Paid),
        ("error", Failed),
        ("cancel", Cancelled),
    ])
});

fn table(provider: PaymentProviderKind) -> &'static HashMap<&'static str, PaymentStatus> {
    match provider {
        PaymentProviderKind::Stripe => &STRIPE_STATUSES,
        PaymentProviderKind::Datatrans => &DATATRANS_STATUSES,
    }
}

/// Looks up a provider status without the unknown-status fallback.
pub fn lookup(provider: PaymentProviderKind, provider_status: &str) -> Option<PaymentStatus> {
    let key = provider_status.trim().to_ascii_lowercase();
    table(provider).get(key.as_str()).copied()
}

/// Maps a provider status string to the internal status.
pub fn normalize(provider: PaymentProviderKind, provider_status: &str) -> PaymentStatus {
    match lookup(provider, provider_status) {
        Some(status) => status,
        None => {
            tracing::warn!(
                provider = %provider,
                provider_status = %provider_status,
                "Unmapped provider status, treating as pending"
            );
            PaymentStatus::Pending
        }
    }
}
