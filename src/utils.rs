use axum::http::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

// For signature verification
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies a GitHub `X-Hub-Signature-256` header against the raw request body.
///
/// `payload` must be the bytes exactly as received. The header is compared
/// byte for byte with `sha256=<lowercase hex>`, so padding or uppercase hex
/// is rejected. Fails closed: an empty body, a missing header or a key error
/// all yield `false`.
pub fn verify_github_signature(
    secret: &str,
    payload: &[u8],
    signature_header: Option<&str>,
) -> bool {
    let Some(signature_header) = signature_header else {
        debug!("No signature header supplied");
        return false;
    };
    if payload.is_empty() {
        debug!("Empty body cannot carry a valid signature");
        return false;
    }
    if !signature_header.starts_with(SIGNATURE_PREFIX) {
        debug!("Signature header lacks the sha256= prefix");
        return false;
    }

    let Some(expected) = sign_payload(secret, payload) else {
        return false;
    };

    // ct_eq on slices of different length returns false without leaking where they differ
    expected
        .as_bytes()
        .ct_eq(signature_header.as_bytes())
        .into()
}

fn hmac_digest(secret: &str, payload: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Computes the `sha256=<hex>` header value GitHub would send for `payload`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Option<String> {
    hmac_digest(secret, payload)
        .map(|digest| format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest)))
}

/// Looks a header up by name, returning it only when it is valid visible ASCII.
///
/// `HeaderMap` lookups are already case-insensitive, so `X-GitHub-Event` and
/// `x-github-event` resolve to the same entry.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Cuts `text` to at most `max_chars` characters, appending `...` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Reads a string field, treating null or any other JSON type as absent.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// Reads a non-negative count. Numeric strings are accepted, anything else is 0.
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
