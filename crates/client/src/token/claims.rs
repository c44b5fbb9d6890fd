//! Minimal JWT payload inspection
//!
//! Signatures are never checked here; the server does that. The client only
//! needs the `exp` claim to schedule refreshes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use storegate_core::{Error, Result};

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Expiry (epoch seconds) carried by `token`, if it has one
pub fn expiry(token: &str) -> Result<Option<i64>> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => return Err(Error::decode("token", "expected three dot-separated segments")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::decode("token payload", e.to_string()))?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::decode("token claims", e.to_string()))?;

    Ok(claims.exp)
}

#[cfg(test)]
pub(crate) fn encode_for_test(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
