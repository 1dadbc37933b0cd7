// carelink-core/src/webhooks/signature.rs

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Computes the gateway's request signature: HMAC-SHA1 over the exact
/// request URL followed by every form key/value pair in lexicographic
/// key order with no separators, base64-encoded.
pub fn compute_signature(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> String {
    let mut canonical = String::from(url);
    for (key, value) in params {
        canonical.push_str(key);
        canonical.push_str(value);
    }

    // new_from_slice only fails on zero-length output sizes, which SHA-1
    // does not have.
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verifies the caller-supplied signature header in constant time.
///
/// A mismatch is a normal "unauthorized" outcome, never an error: the
/// function returns `false` for a wrong signature, undecodable base64,
/// or a truncated digest, and the caller answers 403.
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    provided: &str,
) -> bool {
    let expected = match BASE64.decode(provided.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut canonical = String::from(url);
    for (key, value) in params {
        canonical.push_str(key);
        canonical.push_str(value);
    }

    let mut mac = match HmacSha1::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(canonical.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("From".to_string(), "whatsapp:+15551234567".to_string());
        params.insert("Body".to_string(), "hello".to_string());
        params.insert("MessageSid".to_string(), "SM123".to_string());
        params
    }

    #[test]
    fn valid_signature_verifies() {
        let url = "https://clinic.example/webhook/whatsapp/inbound";
        let params = sample_params();
        let sig = compute_signature("secret-token", url, &params);
        assert!(verify_signature("secret-token", url, &params, &sig));
    }

    #[test]
    fn wrong_secret_fails() {
        let url = "https://clinic.example/webhook/whatsapp/inbound";
        let params = sample_params();
        let sig = compute_signature("secret-token", url, &params);
        assert!(!verify_signature("other-token", url, &params, &sig));
    }

    #[test]
    fn changed_param_fails() {
        let url = "https://clinic.example/webhook/whatsapp/inbound";
        let mut params = sample_params();
        let sig = compute_signature("secret-token", url, &params);
        params.insert("Body".to_string(), "tampered".to_string());
        assert!(!verify_signature("secret-token", url, &params, &sig));
    }

    #[test]
    fn garbage_header_fails_quietly() {
        let url = "https://clinic.example/webhook/whatsapp/inbound";
        let params = sample_params();
        assert!(!verify_signature("secret-token", url, &params, "%%% not base64 %%%"));
        assert!(!verify_signature("secret-token", url, &params, ""));
    }

    #[test]
    fn key_order_is_lexicographic() {
        // BTreeMap iteration already sorts; make sure the canonical string
        // reflects Body < From < MessageSid regardless of insert order.
        let url = "https://clinic.example/x";
        let mut a = BTreeMap::new();
        a.insert("Zeta".to_string(), "1".to_string());
        a.insert("Alpha".to_string(), "2".to_string());
        let mut b = BTreeMap::new();
        b.insert("Alpha".to_string(), "2".to_string());
        b.insert("Zeta".to_string(), "1".to_string());
        assert_eq!(
            compute_signature("t", url, &a),
            compute_signature("t", url, &b)
        );
    }
}
