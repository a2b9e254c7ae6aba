//! Configuration management for Lambda functions.

use std::env;
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 900;
const DEFAULT_TIMEOUT_SECS: u64 = 25;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion API key, when provided directly
    pub openai_api_key: Option<String>,
    /// ARN of a Secrets Manager secret holding the API key
    pub openai_api_key_secret_arn: Option<String>,
    /// Base URL of the chat-completion API
    pub openai_base_url: String,
    /// Model used for every completion
    pub model: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Timeout for the single completion attempt
    pub request_timeout: Duration,
    /// Replacement for the built-in advice system prompt
    pub system_prompt: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_tokens = match non_empty("OPENAI_MAX_TOKENS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("OPENAI_MAX_TOKENS is not a number: {}", raw)))?,
            None => DEFAULT_MAX_TOKENS,
        };

        let timeout_secs = match non_empty("OPENAI_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("OPENAI_TIMEOUT_SECS is not a number: {}", raw)))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            openai_api_key: non_empty("OPENAI_API_KEY").map(|k| k.trim().to_string()),
            openai_api_key_secret_arn: non_empty("OPENAI_API_KEY_SECRET_ARN"),
            openai_base_url: non_empty("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_empty("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens,
            request_timeout: Duration::from_secs(timeout_secs),
            system_prompt: non_empty("ADVICE_SYSTEM_PROMPT"),
        })
    }
}
