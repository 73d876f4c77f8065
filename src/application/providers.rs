//! Lookup of the configured payment provider adapters.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::payment::PaymentProviderKind;
use crate::ports::PaymentProvider;

/// Payment provider adapters keyed by the provider they talk to.
#[derive(Clone, Default)]
pub struct PaymentProviders {
    providers: HashMap<PaymentProviderKind, Arc<dyn PaymentProvider>>,
}

impl PaymentProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under its own `kind()`, replacing any previous one.
    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: PaymentProviderKind) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&kind).cloned()
    }
}
