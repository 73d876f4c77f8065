//! Datatrans wire types.
//!
//! Datatrans reaches us with two incompatible callback generations: the
//! structured JSON webhook of the transactions API, and the legacy
//! redirect-era callback with numeric response codes (posted as a form or
//! as flat JSON). Both decode into [`DatatransCallback`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ════════════════════════════════════════════════════════════════════════════════
// API Types
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /v1/transactions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitTransactionRequest {
    pub currency: String,
    pub refno: String,

    /// Minor units.
    pub amount: i64,

    pub auto_settle: bool,
    pub language: String,
    pub customer: InitCustomer,
    pub redirect: InitRedirect,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<InitWebhook>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitCustomer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl InitCustomer {
    /// Splits a full name at the first space.
    pub fn from_full_name(email: &str, name: &str) -> Self {
        let name = name.trim();
        let (first, last) = name.split_once(' ').unwrap_or((name, ""));
        Self {
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRedirect {
    pub success_url: String,
    pub cancel_url: String,
    pub error_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitWebhook {
    pub url: String,
}

/// Answer to `POST /v1/transactions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitTransactionResponse {
    pub transaction_id: Option<String>,
}

/// Error envelope of the transactions API.
#[derive(Debug, Clone, Deserialize)]
pub struct DatatransApiError {
    pub error: DatatransErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatatransErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Callback Types
// ════════════════════════════════════════════════════════════════════════════════

/// Transaction object as sent by the structured webhook and returned by
/// `GET /v1/transactions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredTransaction {
    pub transaction_id: String,

    /// `initialized`, `authenticated`, `authorized`, `settled`, ...
    pub status: String,

    pub refno: Option<String>,

    /// Minor units.
    pub amount: Option<i64>,

    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub acquirer_authorization_code: Option<String>,
    pub error: Option<DatatransErrorDetail>,
}

/// Legacy callback, flattened to string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyCallback {
    pub upp_transaction_id: Option<String>,
    pub refno: Option<String>,
    pub response_code: Option<String>,

    /// `success`, `error` or `cancel`.
    pub status: Option<String>,

    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub authorization_code: Option<String>,

    /// Minor units, as sent.
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub merchant_id: Option<String>,
    pub sign: Option<String>,
}

impl LegacyCallback {
    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        let mut take = |key: &str| fields.remove(key).filter(|v| !v.trim().is_empty());
        Self {
            upp_transaction_id: take("uppTransactionId"),
            refno: take("refno"),
            response_code: take("responseCode"),
            status: take("status"),
            error_code: take("errorCode"),
            error_message: take("errorMessage"),
            authorization_code: take("authorizationCode"),
            amount: take("amount"),
            currency: take("currency"),
            merchant_id: take("merchantId"),
            sign: take("sign"),
        }
    }

    fn looks_legacy(fields: &HashMap<String, String>) -> bool {
        fields.contains_key("uppTransactionId") || fields.contains_key("responseCode")
    }

    /// Amount in minor units, if it parses.
    pub fn amount_minor(&self) -> Option<i64> {
        self.amount.as_deref().and_then(|a| a.trim().parse().ok())
    }
}

/// Any callback shape Datatrans may send.
#[derive(Debug, Clone, PartialEq)]
pub enum DatatransCallback {
    Structured(StructuredTransaction),
    Legacy(LegacyCallback),
    Unknown,
}

impl DatatransCallback {
    /// Decodes a raw callback body. Never fails: unrecognized bodies are `Unknown`.
    pub fn parse(raw: &[u8]) -> Self {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(raw) {
            let fields = flatten_scalars(&map);
            if LegacyCallback::looks_legacy(&fields) {
                return Self::Legacy(LegacyCallback::from_fields(fields));
            }
            if map.contains_key("transactionId") && map.get("status").is_some_and(Value::is_string) {
                if let Ok(tx) = serde_json::from_value(Value::Object(map)) {
                    return Self::Structured(tx);
                }
            }
            return Self::Unknown;
        }

        let fields = form_fields(raw);
        if LegacyCallback::looks_legacy(&fields) {
            return Self::Legacy(LegacyCallback::from_fields(fields));
        }
        Self::Unknown
    }
}

/// Decodes an `application/x-www-form-urlencoded` body.
pub fn form_fields(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn flatten_scalars(map: &serde_json::Map<String, Value>) -> HashMap<String, String> {
    map.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}
