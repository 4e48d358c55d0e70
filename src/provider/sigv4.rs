//! AWS Signature Version 4 — just enough to call bedrock-runtime.
//!
//! Signs POST requests with a JSON payload over the content-type, host,
//! x-amz-date (and x-amz-security-token when present) headers. The caller
//! supplies the canonical, percent-encoded request path and uses the same
//! string in the URL.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const CONTENT_TYPE: &str = "application/json";

pub struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers to attach to the outgoing request.
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
}

/// Percent-encode one path segment per RFC 3986 (unreserved characters kept).
/// Bedrock model ids contain ':' and must arrive as `%3A` in the canonical URI.
pub fn uri_encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Sign a POST request happening now.
pub fn sign_request(
    params: &SigningParams<'_>,
    host: &str,
    path: &str,
    payload: &[u8],
) -> SignedHeaders {
    let now = Utc::now();
    sign_request_at(
        params,
        host,
        path,
        payload,
        &now.format("%Y%m%dT%H%M%SZ").to_string(),
        &now.format("%Y%m%d").to_string(),
    )
}

/// Timestamp-injectable core of `sign_request`.
fn sign_request_at(
    params: &SigningParams<'_>,
    host: &str,
    path: &str,
    payload: &[u8],
    amz_date: &str,
    date_stamp: &str,
) -> SignedHeaders {
    // Canonical headers must be sorted by name; these already are.
    let mut canonical_headers = format!(
        "content-type:{CONTENT_TYPE}\nhost:{host}\nx-amz-date:{amz_date}\n"
    );
    let mut signed_header_names = String::from("content-type;host;x-amz-date");
    if let Some(token) = params.session_token {
        canonical_headers.push_str(&format!("x-amz-security-token:{token}\n"));
        signed_header_names.push_str(";x-amz-security-token");
    }

    let payload_hash = hex::encode(Sha256::digest(payload));
    let canonical_request = format!(
        "POST\n{path}\n\n{canonical_headers}\n{signed_header_names}\n{payload_hash}"
    );

    let credential_scope = format!(
        "{date_stamp}/{}/{}/aws4_request",
        params.region, params.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", params.secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, params.region.as_bytes());
    let k_service = hmac_sha256(&k_region, params.service.as_bytes());
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{credential_scope}, SignedHeaders={signed_header_names}, Signature={signature}",
        params.access_key_id
    );

    SignedHeaders {
        amz_date: amz_date.to_string(),
        authorization,
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(token: Option<&'a str>) -> SigningParams<'a> {
        SigningParams {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            session_token: token,
            region: "us-east-1",
            service: "bedrock",
        }
    }

    #[test]
    fn model_id_colon_is_encoded() {
        let encoded = uri_encode_segment("us.anthropic.claude-3-5-sonnet-20240620-v1:0");
        assert_eq!(encoded, "us.anthropic.claude-3-5-sonnet-20240620-v1%3A0");
    }

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(uri_encode_segment("abc-DEF_0.9~"), "abc-DEF_0.9~");
        assert_eq!(uri_encode_segment("a b"), "a%20b");
    }

    #[test]
    fn authorization_header_shape() {
        let signed = sign_request_at(
            &params(None),
            "bedrock-runtime.us-east-1.amazonaws.com",
            "/model/anthropic.claude-v2/invoke",
            b"{}",
            "20240101T000000Z",
            "20240101",
        );
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/us-east-1/bedrock/aws4_request, "
        ));
        assert!(signed
            .authorization
            .contains("SignedHeaders=content-type;host;x-amz-date, "));
        let signature = signed.authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signed.amz_date, "20240101T000000Z");
    }

    #[test]
    fn session_token_joins_signed_headers() {
        let signed = sign_request_at(
            &params(Some("FwoGZXIvYXdzEXAMPLE")),
            "bedrock-runtime.us-east-1.amazonaws.com",
            "/model/anthropic.claude-v2/invoke",
            b"{}",
            "20240101T000000Z",
            "20240101",
        );
        assert!(signed
            .authorization
            .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token, "));
    }

    #[test]
    fn signing_is_deterministic_and_payload_sensitive() {
        let a = sign_request_at(
            &params(None),
            "bedrock-runtime.us-east-1.amazonaws.com",
            "/model/m/invoke",
            b"{\"a\":1}",
            "20240101T000000Z",
            "20240101",
        );
        let b = sign_request_at(
            &params(None),
            "bedrock-runtime.us-east-1.amazonaws.com",
            "/model/m/invoke",
            b"{\"a\":1}",
            "20240101T000000Z",
            "20240101",
        );
        let c = sign_request_at(
            &params(None),
            "bedrock-runtime.us-east-1.amazonaws.com",
            "/model/m/invoke",
            b"{\"a\":2}",
            "20240101T000000Z",
            "20240101",
        );
        assert_eq!(a.authorization, b.authorization);
        assert_ne!(a.authorization, c.authorization);
    }
}
