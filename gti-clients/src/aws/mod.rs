//! AWS services over signed REST calls: S3 objects and DynamoDB tables.

pub mod dynamodb;
pub mod s3;
pub mod sigv4;

pub use dynamodb::{AttributeValue, DynamoDbClient, Item};
pub use s3::S3Client;

use crate::http::HttpError;
use chrono::Utc;
use gti_core::config::AwsCredentials;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("AWS error {code}: {message}")]
    Service { code: String, message: String },

    #[error("cannot decode AWS response: {0}")]
    Decode(String),

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Headers (including `host`) for a signed request to `url`.
pub(crate) fn signed_headers(
    creds: &AwsCredentials,
    service: &str,
    method: &str,
    url: &Url,
    extra: &[(String, String)],
    payload_hash: &str,
) -> Result<Vec<(String, String)>, AwsError> {
    let host = url
        .host_str()
        .ok_or_else(|| AwsError::InvalidEndpoint(url.to_string()))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let mut headers = vec![("host".to_string(), host)];
    headers.extend_from_slice(extra);

    let query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    // `Url` keeps the path percent-encoded; sign the decoded form.
    let path = percent_decode(url.path());
    let request = sigv4::CanonicalRequest {
        method,
        path: &path,
        query: &query,
        headers: &headers,
        payload_hash,
    };
    let params = sigv4::SigningParams {
        access_key: &creds.access_key_id,
        secret_key: creds.secret_access_key.expose(),
        session_token: creds.session_token.as_ref().map(|t| t.expose()),
        region: &creds.region,
        service,
        time: Utc::now(),
    };
    let mut out = sigv4::sign(&request, &params);
    out.extend(headers.into_iter().filter(|(k, _)| k != "host"));
    Ok(out)
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(percent_decode("/b/2024%20report.csv"), "/b/2024 report.csv");
        assert_eq!(percent_decode("/plain"), "/plain");
        assert_eq!(percent_decode("/trailing%2"), "/trailing%2");
    }
}
