//! Paystack webhook verification and parsing.
//!
//! Paystack signs each delivery with `x-paystack-signature`, the hex
//! HMAC-SHA512 of the raw request body keyed with the account secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";
pub const EVENT_CHARGE_SUCCESS: &str = "charge.success";

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing signature")]
    MissingSignature,
    #[error("signature mismatch")]
    BadSignature,
    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature against the body.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSignature)?;
    let expected = hex::decode(signature).map_err(|_| WebhookError::BadSignature)?;

    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::BadSignature)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| WebhookError::BadSignature)
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: ChargeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeEventData {
    #[serde(default)]
    pub status: String,
    pub reference: String,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))
    }

    /// A charge the customer actually paid.
    pub fn is_successful_charge(&self) -> bool {
        self.event == EVENT_CHARGE_SUCCESS && self.data.status == "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk_test_123";
    const BODY: &[u8] =
        br#"{"event":"charge.success","data":{"status":"success","reference":"job-42"}}"#;

    #[test]
    fn accepts_the_right_signature() {
        let sig = sign(SECRET, BODY);
        assert_eq!(sig.len(), 128);
        assert_eq!(verify_signature(SECRET, BODY, Some(&sig)), Ok(()));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let sig = sign(SECRET, BODY);
        let tampered = br#"{"event":"charge.success","data":{"status":"success","reference":"job-43"}}"#;
        assert_eq!(
            verify_signature(SECRET, tampered, Some(&sig)),
            Err(WebhookError::BadSignature)
        );
    }

    #[test]
    fn rejects_missing_or_garbage_signatures() {
        assert_eq!(verify_signature(SECRET, BODY, None), Err(WebhookError::MissingSignature));
        assert_eq!(verify_signature(SECRET, BODY, Some("  ")), Err(WebhookError::MissingSignature));
        assert_eq!(
            verify_signature(SECRET, BODY, Some("not-hex")),
            Err(WebhookError::BadSignature)
        );
        let other = sign("sk_test_other", BODY);
        assert_eq!(
            verify_signature(SECRET, BODY, Some(&other)),
            Err(WebhookError::BadSignature)
        );
    }

    #[test]
    fn recognises_successful_charges() {
        let ev = WebhookEvent::parse(BODY).unwrap();
        assert!(ev.is_successful_charge());
        assert_eq!(ev.data.reference, "job-42");

        let failed = br#"{"event":"charge.success","data":{"status":"failed","reference":"job-42"}}"#;
        assert!(!WebhookEvent::parse(failed).unwrap().is_successful_charge());

        let transfer = br#"{"event":"transfer.success","data":{"status":"success","reference":"x"}}"#;
        assert!(!WebhookEvent::parse(transfer).unwrap().is_successful_charge());

        assert!(WebhookEvent::parse(b"{}").is_err());
    }
}
