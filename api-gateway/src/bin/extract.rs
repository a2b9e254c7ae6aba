//! Extract Lambda - Handles /api/extract endpoint.
//!
//! Two request kinds share the endpoint: `{"type": "travel-pack", ...}` asks for travel
//! medicine suggestions, anything else is a medicine label to read from photos and
//! OCR text.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde_json::Value;
use shared::http::{error_response, guard_post, json_response};
use shared::{parse_body, resolve_api_key, Config, ExtractRequest, ExtractionService, OpenAiClient};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across requests.
struct AppState {
    service: ExtractionService<OpenAiClient>,
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
        info!("API key visible: {}", api_key.is_some());

        let client = api_key
            .map(|key| OpenAiClient::new(key, &config))
            .transpose()?;

        Ok(Self {
            service: ExtractionService::new(client),
        })
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if let Some(response) = guard_post(&event)? {
        return Ok(response);
    }

    let body: Value = parse_body!(event.body());

    let request = match ExtractRequest::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected extraction request: {}", e);
            return error_response(400, format!("Invalid request: {}", e));
        }
    };

    let response = state.service.extract(request).await;
    json_response(200, &response)
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
