//! Text generation through the OpenAI chat-completions API.

use crate::http::{self, HttpError};
use gti_core::config::{OpenAiCredentials, Secret};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 150;

#[derive(Debug, Error)]
pub enum GenAiError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("completion returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct GenAi {
    api_key: Secret,
    model: String,
    base_url: String,
    http: Client,
}

impl GenAi {
    pub fn new(creds: OpenAiCredentials) -> Result<Self, GenAiError> {
        Ok(Self {
            api_key: creds.api_key,
            model: creds.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: creds
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http: http::client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete `prompt` and return the first choice, trimmed.
    pub fn generate_text(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String, GenAiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };
        let request = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&body);
        let response: ChatResponse = http::send_json(request, &url)?;
        tracing::debug!(model = %self.model, choices = response.choices.len(), "chat completion");
        let first = response
            .choices
            .into_iter()
            .next()
            .ok_or(GenAiError::EmptyResponse)?;
        Ok(first.message.content.unwrap_or_default().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let ai = GenAi::new(OpenAiCredentials {
            api_key: Secret::new("sk-test"),
            model: None,
            base_url: Some("http://localhost:1234/v1/".into()),
        })
        .unwrap();
        assert_eq!(ai.model(), DEFAULT_MODEL);
        assert_eq!(ai.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [Message {
                role: "user",
                content: "hi",
            }],
            max_tokens: 150,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["max_tokens"], 150);
    }
}
