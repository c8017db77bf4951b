//! Webhook signature verification.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex digest>` of the body.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Header naming the event kind.
pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Header carrying the delivery GUID.
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

/// Verify a GitHub webhook signature using HMAC-SHA256.
///
/// `signature` is the raw header value, `sha256=` followed by the hex digest.
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(signature_bytes) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.as_slice().ct_eq(&signature_bytes).into()
}

/// `sha256=<hex>` signature of `body` under `secret`, as GitHub sends it.
#[must_use]
pub fn sign(body: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check the delivery's signature header. An empty `secret` disables the check.
pub fn verify_request(headers: &HeaderMap, body: &[u8], secret: &str) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Ok(());
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    if verify_webhook_signature(body, signature, secret) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}
