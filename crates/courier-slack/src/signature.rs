use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Events older than this are treated as replays and rejected.
const FRESHNESS_WINDOW_SECS: i64 = 60 * 5;

/// Verify a signed Slack event request.
///
/// The signature header carries `v0=<hex hmac-sha256>` over
/// `"v0:{timestamp}:{raw body}"`, keyed by the shared signing secret. All
/// failure modes collapse into a single `false`: the caller must not reveal
/// which check failed.
pub fn verify(
    signing_secret: &str,
    timestamp_header: Option<&str>,
    signature_header: Option<&str>,
    body: &[u8],
    now_unix: i64,
) -> bool {
    let (Some(timestamp), Some(signature)) = (timestamp_header, signature_header) else {
        return false;
    };

    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if ts < now_unix - FRESHNESS_WINDOW_SECS {
        return false;
    }

    let Some(supplied_hex) = signature.strip_prefix("v0=") else {
        return false;
    };
    let Ok(supplied) = hex::decode(supplied_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    // verify_slice is a constant-time comparison
    mac.verify_slice(&supplied).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    fn sign(secret: &str, ts: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("v0:{ts}:").as_bytes());
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_fresh_correctly_signed_request() {
        let now = 1_700_000_000;
        let body = br#"{"type":"event_callback"}"#;
        let sig = sign(SECRET, now, body);
        assert!(verify(
            SECRET,
            Some(&now.to_string()),
            Some(&sig),
            body,
            now
        ));
    }

    #[test]
    fn rejects_missing_headers() {
        let body = b"{}";
        assert!(!verify(SECRET, None, Some("v0=00"), body, 0));
        assert!(!verify(SECRET, Some("100"), None, body, 100));
    }

    #[test]
    fn rejects_stale_timestamp_even_with_valid_digest() {
        let now = 1_700_000_000;
        let ts = now - 301;
        let body = b"{}";
        let sig = sign(SECRET, ts, body);
        assert!(!verify(SECRET, Some(&ts.to_string()), Some(&sig), body, now));
    }

    #[test]
    fn accepts_timestamp_at_window_edge() {
        let now = 1_700_000_000;
        let ts = now - 300;
        let body = b"{}";
        let sig = sign(SECRET, ts, body);
        assert!(verify(SECRET, Some(&ts.to_string()), Some(&sig), body, now));
    }

    #[test]
    fn rejects_tampered_body() {
        let now = 1_700_000_000;
        let sig = sign(SECRET, now, b"original");
        assert!(!verify(
            SECRET,
            Some(&now.to_string()),
            Some(&sig),
            b"tampered",
            now
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = 1_700_000_000;
        let body = b"{}";
        let sig = sign("other-secret", now, body);
        assert!(!verify(SECRET, Some(&now.to_string()), Some(&sig), body, now));
    }

    #[test]
    fn rejects_malformed_signature_header() {
        let now = 1_700_000_000;
        assert!(!verify(SECRET, Some(&now.to_string()), Some("v1=abcd"), b"{}", now));
        assert!(!verify(SECRET, Some(&now.to_string()), Some("v0=zz"), b"{}", now));
    }
}
