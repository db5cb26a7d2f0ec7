//! Stripe webhook signature verification.
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{timestamp}.{payload}"`
//! and sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1492774577,v1=5257a869...,v1=...
//! ```
//!
//! Multiple `v1` entries appear while a signing secret is being rolled.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signed timestamp and local time.
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Reasons a webhook signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The header has no `t=` entry or it is not an integer.
    #[error("missing or malformed timestamp")]
    MalformedTimestamp,

    /// The header has no `v1=` entry.
    #[error("no v1 signature in header")]
    MissingSignature,

    /// No `v1` signature matches the payload.
    #[error("signature mismatch")]
    Mismatch,

    /// The signed timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance ({age_seconds}s)")]
    StaleTimestamp {
        /// Distance between the signed timestamp and now.
        age_seconds: u64,
    },
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    /// Signed timestamp (Unix seconds).
    pub timestamp: i64,
    /// Hex-encoded `v1` signatures.
    pub signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    /// Parse the header value. Unknown schemes (e.g. `v0`) are ignored.
    pub fn parse(header: &'a str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", ts)) => timestamp = ts.parse::<i64>().ok(),
                Some(("v1", sig)) => signatures.push(sig),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::MissingSignature);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Compute the hex `v1` signature Stripe would send for a payload.
#[must_use]
pub fn compute_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    hex::encode(signed_mac(secret, timestamp, payload).finalize().into_bytes())
}

/// Verify a delivery against `now` (Unix seconds).
pub fn verify_at(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = SignatureHeader::parse(header)?;

    let matched = parsed.signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| {
            // verify_slice compares in constant time.
            signed_mac(secret, parsed.timestamp, payload)
                .verify_slice(&bytes)
                .is_ok()
        })
    });
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    let age_seconds = now.abs_diff(parsed.timestamp);
    if tolerance_seconds > 0 && age_seconds > tolerance_seconds.unsigned_abs() {
        return Err(SignatureError::StaleTimestamp { age_seconds });
    }

    Ok(())
}

/// Verify a delivery against the current time.
pub fn verify(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
) -> Result<(), SignatureError> {
    verify_at(
        payload,
        header,
        secret,
        tolerance_seconds,
        chrono::Utc::now().timestamp(),
    )
}

fn signed_mac(secret: &str, timestamp: i64, payload: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key size"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac
}
