//! AWS Signature Version 4 request signing.
//!
//! Produces the `Authorization`, `x-amz-date` and (for temporary
//! credentials) `x-amz-security-token` headers for a request. Signing is a
//! pure function of the request parts and a timestamp.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Hex SHA-256 of an empty body.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Credentials and scope for one signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// The parts of an HTTP request that go into the canonical request.
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// Absolute path, not yet percent-encoded.
    pub path: &'a str,
    pub query: &'a [(String, String)],
    /// Headers to sign; must include `host`.
    pub headers: &'a [(String, String)],
    /// Hex SHA-256 of the body.
    pub payload_hash: &'a str,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode per RFC 3986, leaving unreserved characters as-is.
/// With `keep_slash`, `/` passes through (for paths).
pub fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// `kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

impl CanonicalRequest<'_> {
    /// Lower-cased, sorted `name:value` headers and the `;`-joined names.
    fn canonical_headers(&self) -> (String, String) {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.split_whitespace().collect::<Vec<_>>().join(" ")))
            .collect();
        headers.sort();
        let canonical = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect::<String>();
        let signed = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        (canonical, signed)
    }

    fn canonical_query(&self) -> String {
        let mut pairs: Vec<(String, String)> = self
            .query
            .iter()
            .map(|(k, v)| (uri_encode(k, false), uri_encode(v, false)))
            .collect();
        pairs.sort();
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// The canonical request string and its signed-header list.
    pub fn render(&self) -> (String, String) {
        let (headers, signed) = self.canonical_headers();
        let path = if self.path.is_empty() { "/" } else { self.path };
        let text = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            uri_encode(path, true),
            self.canonical_query(),
            headers,
            signed,
            self.payload_hash
        );
        (text, signed)
    }
}

/// Headers to add to the request, including `Authorization`. `x-amz-date`
/// and the session token are signed along with the request's own headers.
pub fn sign(request: &CanonicalRequest<'_>, params: &SigningParams<'_>) -> Vec<(String, String)> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);

    let mut extra = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = params.session_token {
        extra.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    let mut headers = request.headers.to_vec();
    for (name, value) in &extra {
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
            headers.push((name.clone(), value.clone()));
        }
    }
    let full = CanonicalRequest {
        headers: &headers,
        ..*request
    };

    let (canonical, signed_headers) = full.render();
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        extra[0].1,
        sha256_hex(canonical.as_bytes())
    );
    let key = signing_key(params.secret_key, &date, params.region, params.service);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    let mut out = vec![(
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            params.access_key
        ),
    )];
    out.extend(extra);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn signing_key_matches_published_example() {
        let key = signing_key(SECRET, "20120215", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature() {
        let headers = vec![
            ("Host".to_string(), "example.amazonaws.com".to_string()),
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
        ];
        let request = CanonicalRequest {
            method: "GET",
            path: "/",
            query: &[],
            headers: &headers,
            payload_hash: EMPTY_PAYLOAD_SHA256,
        };
        let params = SigningParams {
            access_key: "AKIDEXAMPLE",
            secret_key: SECRET,
            session_token: None,
            region: "us-east-1",
            service: "service",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        };
        let signed = sign(&request, &params);
        assert_eq!(
            signed[0].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(signed[1], ("x-amz-date".to_string(), "20150830T123600Z".to_string()));
    }

    #[test]
    fn session_token_is_attached() {
        let headers = vec![("host".to_string(), "s3.amazonaws.com".to_string())];
        let request = CanonicalRequest {
            method: "GET",
            path: "/bucket/key",
            query: &[],
            headers: &headers,
            payload_hash: EMPTY_PAYLOAD_SHA256,
        };
        let params = SigningParams {
            access_key: "AK",
            secret_key: "SK",
            session_token: Some("TOKEN"),
            region: "us-east-1",
            service: "s3",
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let signed = sign(&request, &params);
        assert!(signed.contains(&("x-amz-security-token".to_string(), "TOKEN".to_string())));
        assert!(signed[0]
            .1
            .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn canonical_request_sorts_and_encodes() {
        let headers = vec![
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
            ("Host".to_string(), "example.amazonaws.com".to_string()),
        ];
        let query = vec![
            ("b".to_string(), "two words".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let request = CanonicalRequest {
            method: "GET",
            path: "/data/2024 report.csv",
            query: &query,
            headers: &headers,
            payload_hash: EMPTY_PAYLOAD_SHA256,
        };
        let (text, signed) = request.render();
        assert_eq!(signed, "host;x-amz-date");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "/data/2024%20report.csv");
        assert_eq!(lines[2], "a=1&b=two%20words");
        assert_eq!(lines[3], "host:example.amazonaws.com");
    }

    #[test]
    fn uri_encoding() {
        assert_eq!(uri_encode("a/b c~", true), "a/b%20c~");
        assert_eq!(uri_encode("a/b", false), "a%2Fb");
    }
}
