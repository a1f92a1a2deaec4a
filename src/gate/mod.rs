//! Inbound request authentication
//!
//! Every webhook entry point passes its raw body and headers through
//! [`SignatureGate::verify`] before any payload is decoded.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Maximum age of a signed request, in seconds
pub const MAX_REQUEST_AGE_SECS: i64 = 300;

const SIGNATURE_VERSION: &str = "v0";

/// Verifies Slack request signatures
#[derive(Clone)]
pub struct SignatureGate {
    signing_secret: Option<String>,
}

impl SignatureGate {
    pub fn new(signing_secret: Option<String>) -> Self {
        Self {
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
        }
    }

    /// True when the request is signed by Slack and fresh
    pub fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> bool {
        self.verify_at(raw_body, headers, chrono::Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) against an explicit clock
    pub fn verify_at(&self, raw_body: &[u8], headers: &HeaderMap, now: i64) -> bool {
        let Some(secret) = self.signing_secret.as_deref() else {
            tracing::warn!("Rejecting request: no signing secret configured");
            return false;
        };

        let Some(timestamp) = header_str(headers, TIMESTAMP_HEADER) else {
            tracing::debug!("Rejecting request: missing timestamp header");
            return false;
        };

        let Ok(ts) = timestamp.parse::<i64>() else {
            tracing::debug!(timestamp, "Rejecting request: unparsable timestamp");
            return false;
        };

        // Future-dated requests are rejected the same as stale ones
        if now.abs_diff(ts) > MAX_REQUEST_AGE_SECS.unsigned_abs() {
            tracing::debug!(timestamp = ts, now, "Rejecting request: timestamp outside window");
            return false;
        }

        let Some(provided) = header_str(headers, SIGNATURE_HEADER) else {
            tracing::debug!("Rejecting request: missing signature header");
            return false;
        };

        let Some(expected) = compute_signature(secret, timestamp, raw_body) else {
            return false;
        };

        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

/// `v0=` + hex HMAC-SHA256 of `v0:{timestamp}:{body}`
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&command=%2Fweather";
    const NOW: i64 = 1_700_000_000;

    fn signed_headers(ts: i64, body: &[u8]) -> HeaderMap {
        let ts = ts.to_string();
        let sig = compute_signature(SECRET, &ts, body).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&ts).unwrap());
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&sig).unwrap());
        headers
    }

    #[test]
    fn test_valid_signature_accepted() {
        let gate = SignatureGate::new(Some(SECRET.to_string()));
        assert!(gate.verify_at(BODY, &signed_headers(NOW, BODY), NOW));
        assert!(gate.verify_at(BODY, &signed_headers(NOW - 299, BODY), NOW));
    }

    #[test]
    fn test_fails_closed_without_secret() {
        let gate = SignatureGate::new(None);
        assert!(!gate.verify_at(BODY, &signed_headers(NOW, BODY), NOW));

        let gate = SignatureGate::new(Some(String::new()));
        assert!(!gate.verify_at(BODY, &signed_headers(NOW, BODY), NOW));
    }

    #[test]
    fn test_stale_and_future_timestamps_rejected() {
        let gate = SignatureGate::new(Some(SECRET.to_string()));
        assert!(!gate.verify_at(BODY, &signed_headers(NOW - 301, BODY), NOW));
        assert!(!gate.verify_at(BODY, &signed_headers(NOW + 301, BODY), NOW));
    }

    #[test]
    fn test_altered_body_rejected() {
        let gate = SignatureGate::new(Some(SECRET.to_string()));
        let headers = signed_headers(NOW, BODY);
        assert!(!gate.verify_at(b"token=tampered", &headers, NOW));
    }

    #[test]
    fn test_missing_or_garbled_headers_rejected() {
        let gate = SignatureGate::new(Some(SECRET.to_string()));

        let mut headers = signed_headers(NOW, BODY);
        headers.remove(TIMESTAMP_HEADER);
        assert!(!gate.verify_at(BODY, &headers, NOW));

        let mut headers = signed_headers(NOW, BODY);
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static("yesterday"));
        assert!(!gate.verify_at(BODY, &headers, NOW));

        let mut headers = signed_headers(NOW, BODY);
        headers.remove(SIGNATURE_HEADER);
        assert!(!gate.verify_at(BODY, &headers, NOW));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let gate = SignatureGate::new(Some(SECRET.to_string()));
        for ts in [i64::MIN, i64::MAX, 0] {
            assert!(!gate.verify_at(BODY, &signed_headers(ts, BODY), NOW));
        }
    }

    #[test]
    fn test_single_character_altered_signature_rejected() {
        let gate = SignatureGate::new(Some(SECRET.to_string()));
        let ts = NOW.to_string();
        let sig = compute_signature(SECRET, &ts, BODY).unwrap();

        // Same length, so only the constant-time comparison can reject it
        for idx in [3, 20, sig.len() - 1] {
            let mut altered = sig.clone().into_bytes();
            altered[idx] = if altered[idx] == b'0' { b'1' } else { b'0' };
            let altered = String::from_utf8(altered).unwrap();
            assert_eq!(altered.len(), sig.len());

            let mut headers = signed_headers(NOW, BODY);
            headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&altered).unwrap());
            assert!(!gate.verify_at(BODY, &headers, NOW));
        }
    }

    #[test]
    fn test_signature_format() {
        let sig = compute_signature(SECRET, "1531420618", BODY).unwrap();
        assert!(sig.starts_with("v0="));
        assert_eq!(sig.len(), 3 + 64);
    }
}
