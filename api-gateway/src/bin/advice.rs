//! Advice Lambda - Handles /api/advice endpoint.
//!
//! Turns a conversation, member profile and cabinet listing into a validated
//! consultation. Completion failures never surface as errors: the client always
//! receives a 200 with a renderable reply and a `success` flag.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{error_response, guard_post, json_response};
use shared::{parse_body, resolve_api_key, AdviceRequest, AdviceService, Config, OpenAiClient, PromptConfig};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across requests.
struct AppState {
    service: AdviceService<OpenAiClient>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;

        let api_key = match resolve_api_key(&config).await {
            Ok(key) => key,
            Err(e) => {
                error!("Failed to resolve API key: {}", e);
                None
            }
        };
        info!(
            "API key visible: {}, len: {}",
            api_key.is_some(),
            api_key.as_deref().map_or(0, str::len)
        );

        let client = api_key
            .map(|key| OpenAiClient::new(key, &config))
            .transpose()?;

        Ok(Self {
            service: AdviceService::new(client, PromptConfig::with_system_prompt(config.system_prompt)),
        })
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if let Some(response) = guard_post(&event)? {
        return Ok(response);
    }

    let request: AdviceRequest = parse_body!(event.body());

    match state.service.advise(request).await {
        Ok(envelope) => json_response(200, &envelope),
        Err(e) => {
            warn!("Rejected advice request: {}", e);
            error_response(e.status_code(), e.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
