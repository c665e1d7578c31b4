//! Shared blocking HTTP plumbing for the vendor clients.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("gti/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl HttpError {
    /// HTTP status for non-2xx responses.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Blocking client with the crate-wide timeout and user agent.
pub fn client() -> Result<Client, HttpError> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(HttpError::Client)
}

/// Client that accepts self-signed certificates, for local gateways.
pub fn local_gateway_client() -> Result<Client, HttpError> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(HttpError::Client)
}

fn send(request: RequestBuilder, url: &str) -> Result<Response, HttpError> {
    tracing::debug!(url, "sending request");
    let response = request.send().map_err(|source| HttpError::Transport {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(HttpError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Send and decode a JSON body.
pub fn send_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T, HttpError> {
    let text = send(request, url)?
        .text()
        .map_err(|source| HttpError::Transport {
            url: url.to_string(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|e| HttpError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Send and return the raw body.
pub fn send_bytes(request: RequestBuilder, url: &str) -> Result<Vec<u8>, HttpError> {
    let bytes = send(request, url)?
        .bytes()
        .map_err(|source| HttpError::Transport {
            url: url.to_string(),
            source,
        })?;
    Ok(bytes.to_vec())
}

/// Send and discard the body.
pub fn send_empty(request: RequestBuilder, url: &str) -> Result<(), HttpError> {
    send(request, url).map(|_| ())
}
