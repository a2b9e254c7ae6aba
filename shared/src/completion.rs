//! Chat-completion client.
//!
//! The model is an external capability: submit a system/user message pair, get text
//! back. [`CompletionClient`] is the seam the pipelines depend on; [`OpenAiClient`]
//! is the production implementation. One attempt per call, no retries.

use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{Config, Error, Result};

/// One part of a user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: Vec<ContentPart>,
    /// Ask the model for a JSON object rather than free text
    pub json_output: bool,
}

impl CompletionRequest {
    /// Text-only request expecting a JSON object back.
    pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: vec![ContentPart::Text { text: user.into() }],
            json_output: true,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.user.push(ContentPart::Text { text: text.into() });
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.user.push(ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        });
        self
    }

    /// Concatenated text parts, mostly for logging and tests.
    pub fn user_text(&self) -> String {
        self.user
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.user
            .iter()
            .filter(|part| matches!(part, ContentPart::ImageUrl { .. }))
            .count()
    }
}

/// Capability to obtain a completion from a language model.
pub trait CompletionClient: Send + Sync {
    /// Return the completion text. Transport failures, non-success statuses and
    /// malformed response bodies are all errors.
    fn complete(&self, request: &CompletionRequest) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(&'a [ContentPart]),
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: config.openai_base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(&request.user),
                },
            ],
            max_tokens: self.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        info!(
            "Requesting completion (model: {}, images: {})",
            self.model,
            request.image_count()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(request))
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                Error::Http(e)
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Completion API error: {} - {}", status, body);
            return Err(Error::Upstream { status, body });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            Error::Http(e)
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(Error::EmptyCompletion)
    }
}
