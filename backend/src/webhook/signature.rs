//! Svix webhook signature verification.
//!
//! Signed content is `{svix-id}.{svix-timestamp}.{body}`, HMAC-SHA256 keyed
//! with the base64-decoded part of a `whsec_` secret. The `svix-signature`
//! header carries space-separated `v1,<base64>` entries; any match is accepted.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Verifies inbound deliveries against a shared signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
    tolerance_secs: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str, tolerance_secs: u64) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|_| WebhookError::InvalidSecret)?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }

        Ok(Self { key, tolerance_secs })
    }

    /// Check the signature headers of a delivery against its raw body.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        self.verify_at(headers, body, Utc::now().timestamp())
    }

    fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), WebhookError> {
        let msg_id = header(headers, HEADER_ID)?;
        let timestamp = header(headers, HEADER_TIMESTAMP)?;
        let signatures = header(headers, HEADER_SIGNATURE)?;

        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;
        // Skew outside the i64 range counts as out of tolerance.
        match now.checked_sub(sent_at).map(i64::unsigned_abs) {
            Some(skew) if skew <= self.tolerance_secs => {}
            _ => return Err(WebhookError::TimestampOutOfTolerance),
        }

        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, sig)| BASE64.decode(sig).ok())
            .any(|sig| self.mac(msg_id, timestamp, body).verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }

    /// Compute the `v1,<base64>` signature entry for a payload.
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> String {
        let tag = self
            .mac(msg_id, &timestamp.to_string(), body)
            .finalize()
            .into_bytes();
        format!("{},{}", SIGNATURE_VERSION, BASE64.encode(tag))
    }

    fn mac(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .expect("HMAC can take key of any size");
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const BODY: &[u8] = br#"{"type":"user.deleted","data":{"id":"u1"}}"#;
    const NOW: i64 = 1_700_000_000;

    fn signed_headers(verifier: &WebhookVerifier, timestamp: i64, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, "msg_2KWPBgLlAfxdpx2AI54pPJ85f4W".parse().unwrap());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string().parse().unwrap());
        let signature = verifier.sign("msg_2KWPBgLlAfxdpx2AI54pPJ85f4W", timestamp, body);
        headers.insert(HEADER_SIGNATURE, signature.parse().unwrap());
        headers
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let headers = signed_headers(&verifier, NOW, BODY);
        assert!(verifier.verify_at(&headers, BODY, NOW + 10).is_ok());
    }

    #[test]
    fn test_secret_without_prefix_accepted() {
        let with_prefix = WebhookVerifier::new(SECRET, 300).unwrap();
        let without = WebhookVerifier::new(SECRET.trim_start_matches("whsec_"), 300).unwrap();
        assert_eq!(with_prefix.sign("m", NOW, BODY), without.sign("m", NOW, BODY));
    }

    #[test]
    fn test_invalid_secret_rejected() {
        assert!(matches!(WebhookVerifier::new("whsec_!!!", 300), Err(WebhookError::InvalidSecret)));
        assert!(matches!(WebhookVerifier::new("whsec_", 300), Err(WebhookError::InvalidSecret)));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let headers = signed_headers(&verifier, NOW, BODY);
        let tampered = br#"{"type":"user.deleted","data":{"id":"u2"}}"#;
        assert!(matches!(
            verifier.verify_at(&headers, tampered, NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let other = WebhookVerifier::new("whsec_c2VjcmV0LWtleS1vdGhlcg==", 300).unwrap();
        let headers = signed_headers(&other, NOW, BODY);
        assert!(matches!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let headers = signed_headers(&verifier, NOW - 301, BODY);
        assert!(matches!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(WebhookError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let headers = signed_headers(&verifier, NOW + 301, BODY);
        assert!(matches!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(WebhookError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        for extreme in [i64::MIN, i64::MAX] {
            let headers = signed_headers(&verifier, extreme, BODY);
            assert!(matches!(
                verifier.verify_at(&headers, BODY, NOW),
                Err(WebhookError::TimestampOutOfTolerance)
            ));
        }
    }

    #[test]
    fn test_extreme_timestamp_against_negative_clock_rejected() {
        let verifier = WebhookVerifier::new(SECRET, u64::MAX).unwrap();
        let headers = signed_headers(&verifier, i64::MAX, BODY);
        assert!(matches!(
            verifier.verify_at(&headers, BODY, -2),
            Err(WebhookError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_timestamp_at_tolerance_edge_accepted() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let headers = signed_headers(&verifier, NOW - 300, BODY);
        assert!(verifier.verify_at(&headers, BODY, NOW).is_ok());
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let mut headers = signed_headers(&verifier, NOW, BODY);
        headers.insert(HEADER_TIMESTAMP, "yesterday".parse().unwrap());
        assert!(matches!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    #[test]
    fn test_missing_header_rejected() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let mut headers = signed_headers(&verifier, NOW, BODY);
        headers.remove(HEADER_SIGNATURE);
        assert!(matches!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(WebhookError::MissingHeader(HEADER_SIGNATURE))
        ));
    }

    #[test]
    fn test_any_listed_signature_may_match() {
        let verifier = WebhookVerifier::new(SECRET, 300).unwrap();
        let mut headers = signed_headers(&verifier, NOW, BODY);
        let valid = headers.get(HEADER_SIGNATURE).unwrap().to_str().unwrap().to_string();
        let combined = format!("v1,bm90LWEtc2lnbmF0dXJl v2,ignored {}", valid);
        headers.insert(HEADER_SIGNATURE, combined.parse().unwrap());
        assert!(verifier.verify_at(&headers, BODY, NOW).is_ok());
    }
}
