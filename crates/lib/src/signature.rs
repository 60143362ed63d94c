//! Webhook signature verification: HMAC-SHA256 over the raw request body.
//!
//! Intercom sends `X-Hub-Signature-256: sha256=<hex>`. The digest is compared with
//! `Mac::verify_slice`, which is constant-time, so a partially matching signature
//! takes as long to reject as a completely wrong one.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Outcome of a signature check. `verify_signature` collapses this to a bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// No secret configured; verification skipped.
    Bypassed,
}

impl SignatureCheck {
    pub fn is_accepted(self) -> bool {
        matches!(self, SignatureCheck::Valid | SignatureCheck::Bypassed)
    }
}

/// Sign a payload and return the lowercase hex digest (no prefix).
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Classify a signature header without logging. Malformed headers are `Invalid`.
pub fn check_signature(secret: &str, payload: &[u8], signature_header: &str) -> SignatureCheck {
    if secret.is_empty() {
        return SignatureCheck::Bypassed;
    }
    let provided = signature_header.trim();
    let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
    let Ok(provided) = hex::decode(provided) else {
        return SignatureCheck::Invalid;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SignatureCheck::Invalid;
    };
    mac.update(payload);
    match mac.verify_slice(&provided) {
        Ok(()) => SignatureCheck::Valid,
        Err(_) => SignatureCheck::Invalid,
    }
}

/// Verify a webhook signature. An empty secret accepts everything and logs a warning.
pub fn verify_signature(secret: &str, payload: &[u8], signature_header: &str) -> bool {
    let check = check_signature(secret, payload, signature_header);
    match check {
        SignatureCheck::Bypassed => {
            log::warn!("webhook secret not configured, skipping signature verification");
        }
        SignatureCheck::Invalid => log::warn!("invalid webhook signature"),
        SignatureCheck::Valid => {}
    }
    check.is_accepted()
}
