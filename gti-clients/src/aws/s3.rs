//! S3 object reads and writes.

use super::{signed_headers, sigv4, AwsError};
use crate::http::{self, HttpError};
use gti_core::config::AwsCredentials;
use reqwest::blocking::Client;
use reqwest::Url;

pub struct S3Client {
    creds: AwsCredentials,
    /// Path-style endpoint, e.g. a local MinIO. `None` means AWS virtual hosts.
    endpoint: Option<String>,
    http: Client,
}

impl S3Client {
    pub fn new(creds: AwsCredentials) -> Result<Self, AwsError> {
        Ok(Self {
            creds,
            endpoint: None,
            http: http::client()?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    pub fn region(&self) -> &str {
        &self.creds.region
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, AwsError> {
        let key = sigv4::uri_encode(key.trim_start_matches('/'), true);
        let raw = match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{bucket}/{key}"),
            None => format!("https://{bucket}.s3.{}.amazonaws.com/{key}", self.creds.region),
        };
        Url::parse(&raw).map_err(|_| AwsError::InvalidEndpoint(raw))
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AwsError> {
        let url = self.object_url(bucket, key)?;
        let headers = signed_headers(
            &self.creds,
            "s3",
            "GET",
            &url,
            &[(
                "x-amz-content-sha256".to_string(),
                sigv4::EMPTY_PAYLOAD_SHA256.to_string(),
            )],
            sigv4::EMPTY_PAYLOAD_SHA256,
        )?;
        let mut request = self.http.get(url.clone());
        for (k, v) in &headers {
            request = request.header(k.as_str(), v.as_str());
        }
        let bytes = http::send_bytes(request, url.as_str()).map_err(service_error)?;
        tracing::debug!(bucket, key, bytes = bytes.len(), "fetched S3 object");
        Ok(bytes)
    }

    pub fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), AwsError> {
        let url = self.object_url(bucket, key)?;
        let payload_hash = sigv4::sha256_hex(&body);
        let headers = signed_headers(
            &self.creds,
            "s3",
            "PUT",
            &url,
            &[("x-amz-content-sha256".to_string(), payload_hash.clone())],
            &payload_hash,
        )?;
        let size = body.len();
        let mut request = self.http.put(url.clone()).body(body);
        for (k, v) in &headers {
            request = request.header(k.as_str(), v.as_str());
        }
        http::send_empty(request, url.as_str()).map_err(service_error)?;
        tracing::info!(bucket, key, bytes = size, "wrote S3 object");
        Ok(())
    }
}

/// Lift the `<Code>`/`<Message>` of an S3 XML error body into `AwsError::Service`.
fn service_error(err: HttpError) -> AwsError {
    if let HttpError::Status { body, .. } = &err {
        if let Some(code) = xml_tag(body, "Code") {
            return AwsError::Service {
                code: code.to_string(),
                message: xml_tag(body, "Message").unwrap_or_default().to_string(),
            };
        }
    }
    AwsError::Http(err)
}

fn xml_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&format!("</{tag}>"))? + start;
    Some(&body[start..end])
}
