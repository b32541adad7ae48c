/// Stripe webhook signature verification
///
/// Stripe signs each delivery with the endpoint secret:
///
/// ```text
/// Stripe-Signature: t=1492774577,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
/// signed_payload  = "{t}.{raw request body}"
/// v1              = hex(HMAC-SHA256(secret, signed_payload))
/// ```
///
/// A header may carry several `v1` entries while a secret is being rolled;
/// any match is accepted. `v0` and unknown keys are ignored.
///
/// # Example
///
/// ```
/// use mealplan_shared::billing::signature::{sign_payload, WebhookVerifier};
/// use std::time::Duration;
///
/// let verifier = WebhookVerifier::new("whsec_test", Duration::from_secs(300));
/// let payload = br#"{"id":"evt_1"}"#;
/// let header = sign_payload("whsec_test", chrono::Utc::now().timestamp(), payload);
///
/// assert!(verifier.verify(payload, &header).is_ok());
/// ```

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signed timestamp and now
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Signature verification failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Header does not follow `t=...,v1=...`
    #[error("Malformed Stripe-Signature header: {0}")]
    MalformedHeader(String),

    /// Header has no `v1` signature
    #[error("No v1 signature in Stripe-Signature header")]
    NoSignatures,

    /// No `v1` signature matches the payload
    #[error("Signature does not match payload")]
    Mismatch,

    /// Signed timestamp is too far from the current time
    #[error("Timestamp outside tolerance ({age_seconds}s)")]
    TimestampOutsideTolerance { age_seconds: i64 },
}

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parses `t=<unix>,v1=<hex>[,v1=<hex>...]`
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| SignatureError::MalformedHeader(format!("bad element '{}'", part)))?;

            match key {
                "t" => {
                    let t = value.parse::<i64>().map_err(|_| {
                        SignatureError::MalformedHeader(format!("bad timestamp '{}'", value))
                    })?;
                    timestamp = Some(t);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".into()))?;

        if signatures.is_empty() {
            return Err(SignatureError::NoSignatures);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies webhook deliveries against one endpoint secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verifies `payload` against `header` using the current time
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<SignatureHeader, SignatureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verifies `payload` against `header` as of `now` (Unix seconds)
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<SignatureHeader, SignatureError> {
        let parsed = SignatureHeader::parse(header)?;

        let mac = signed_mac(&self.secret, parsed.timestamp, payload);
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if !matched {
            return Err(SignatureError::Mismatch);
        }

        let age_seconds = now - parsed.timestamp;
        if age_seconds.unsigned_abs() > self.tolerance.as_secs() {
            return Err(SignatureError::TimestampOutsideTolerance { age_seconds });
        }

        Ok(parsed)
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Produces a `Stripe-Signature` header value for `payload`
///
/// Mirrors what Stripe sends; used by tests and local replay tooling.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signature = hex::encode(signed_mac(secret, timestamp, payload).finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}
