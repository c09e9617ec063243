//! Payment webhook signatures: `t=<unix>,v1=<hex hmac-sha256 of "t.body">`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::consts::WEBHOOK_TOLERANCE_SECS;
use crate::errors::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Payment(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify(header: &str, payload: &[u8], secret: &str, now: i64) -> Result<()> {
    let invalid = || Error::BadRequest("Invalid webhook signature".to_string());

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or_else(invalid)?;
    if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        tracing::warn!("Webhook timestamp outside tolerance: {timestamp}");
        return Err(invalid());
    }

    let expected = sign(secret, timestamp, payload)?;
    let matched = candidates
        .iter()
        .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));
    if matched { Ok(()) } else { Err(invalid()) }
}
