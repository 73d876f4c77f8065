//! Datatrans callback signature verification.
//!
//! Datatrans has signed callbacks three different ways over the years. The
//! verifier accepts, in order:
//!
//! 1. `Datatrans-Signature: t=<ts>,s0=<hex>` over `ts ++ payload`
//! 2. a bare hex HMAC over the payload
//! 3. a form callback carrying `sign` over
//!    `merchantId ++ amount ++ currency ++ uppTransactionId`
//!
//! All schemes are HMAC-SHA256 keyed with the merchant sign key.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::callback_types::form_fields;
use crate::adapters::stripe::hex_decode;

type HmacSha256 = Hmac<Sha256>;

/// Verifies Datatrans callbacks against the merchant sign key.
#[derive(Clone, Default)]
pub struct DatatransSignatureVerifier {
    sign_key: Option<SecretString>,
}

impl DatatransSignatureVerifier {
    pub fn new(sign_key: Option<SecretString>) -> Self {
        Self { sign_key }
    }

    /// Returns whether the callback is authentic. Never errors.
    ///
    /// Without a sign key every payload is accepted, with a warning.
    pub fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> bool {
        let Some(key) = self.sign_key.as_ref() else {
            tracing::warn!(
                provider = "datatrans",
                "Sign key not configured - accepting callback WITHOUT verification"
            );
            return true;
        };
        let key = key.expose_secret().as_bytes();

        if let Some(header) = signature_header.map(str::trim).filter(|h| !h.is_empty()) {
            if let Some((timestamp, signature)) = parse_timestamped(header) {
                if digest_matches(key, &[timestamp.as_bytes(), payload], &signature) {
                    return true;
                }
            } else if let Some(signature) = hex_decode(header) {
                if digest_matches(key, &[payload], &signature) {
                    return true;
                }
            }
        }

        if let Some(true) = verify_form_sign(key, payload) {
            return true;
        }

        tracing::warn!(
            provider = "datatrans",
            has_header = signature_header.is_some(),
            "Datatrans callback signature did not match"
        );
        false
    }
}

/// Parses `t=<ts>,s0=<hex>`.
fn parse_timestamped(header: &str) -> Option<(String, Vec<u8>)> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value.trim().to_string()),
            Some(("s0", value)) => signature = hex_decode(value),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

/// Checks a legacy form `sign` field. `None` when the payload carries none.
fn verify_form_sign(key: &[u8], payload: &[u8]) -> Option<bool> {
    let fields = form_fields(payload);
    let sign = hex_decode(fields.get("sign")?)?;
    let field = |name: &str| fields.get(name).map(String::as_str).unwrap_or_default();
    let material = [
        field("merchantId"),
        field("amount"),
        field("currency"),
        field("uppTransactionId"),
    ]
    .concat();
    Some(digest_matches(key, &[material.as_bytes()], &sign))
}

fn digest_matches(key: &[u8], parts: &[&[u8]], provided: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    for part in parts {
        mac.update(part);
    }
    let expected = mac.finalize().into_bytes();
    expected.as_slice().ct_eq(provided).unwrap_u8() == 1
}
