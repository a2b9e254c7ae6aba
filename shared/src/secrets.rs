//! API key resolution, with AWS Secrets Manager as a fallback source.

use aws_sdk_secretsmanager::Client as SecretsClient;
use tracing::{info, warn};

use crate::{Config, Error, Result};

/// JSON keys a secret may store the API key under.
const KEY_FIELDS: &[&str] = &["OPENAI_API_KEY", "apiKey", "api_key"];

/// Get a secret value from Secrets Manager.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    response
        .secret_string()
        .map(str::to_string)
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))
}

/// Extract the API key from a secret string.
///
/// Secrets are stored either as the raw key or as a JSON object holding it.
pub fn parse_api_key_secret(secret: &str) -> Option<String> {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        return KEY_FIELDS
            .iter()
            .filter_map(|field| value.get(*field).and_then(|v| v.as_str()))
            .map(str::trim)
            .find(|key| !key.is_empty())
            .map(str::to_string);
    }

    Some(trimmed.to_string())
}

/// Resolve the completion API key once, at cold start.
///
/// Returns `Ok(None)` when no credential is configured at all; callers treat that as
/// the missing-configuration path rather than a startup failure.
pub async fn resolve_api_key(config: &Config) -> Result<Option<String>> {
    if let Some(key) = &config.openai_api_key {
        return Ok(Some(key.clone()));
    }

    let Some(arn) = &config.openai_api_key_secret_arn else {
        return Ok(None);
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = SecretsClient::new(&aws_config);
    let secret = get_secret(&client, arn).await?;

    let key = parse_api_key_secret(&secret);
    match &key {
        Some(k) => info!("Loaded API key from Secrets Manager (len: {})", k.len()),
        None => warn!("Secret {} does not contain an API key", arn),
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_secret() {
        assert_eq!(parse_api_key_secret("  sk-raw\n"), Some("sk-raw".to_string()));
    }

    #[test]
    fn test_json_secret() {
        let json = r#"{"OPENAI_API_KEY":"sk-json","other":"x"}"#;
        assert_eq!(parse_api_key_secret(json), Some("sk-json".to_string()));

        let camel = r#"{"apiKey":"sk-camel"}"#;
        assert_eq!(parse_api_key_secret(camel), Some("sk-camel".to_string()));
    }

    #[test]
    fn test_unusable_secret() {
        assert_eq!(parse_api_key_secret(""), None);
        assert_eq!(parse_api_key_secret(r#"{"username":"admin"}"#), None);
        assert_eq!(parse_api_key_secret(r#"{"apiKey":"  "}"#), None);
    }

    #[tokio::test]
    async fn test_direct_key_skips_secrets_manager() {
        let config = Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-direct".to_string()),
            "OPENAI_API_KEY_SECRET_ARN" => Some("arn:aws:secretsmanager:unused".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(resolve_api_key(&config).await.unwrap(), Some("sk-direct".to_string()));
    }

    #[tokio::test]
    async fn test_no_credential_configured() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(resolve_api_key(&config).await.unwrap(), None);
    }
}
