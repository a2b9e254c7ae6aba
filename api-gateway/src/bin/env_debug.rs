//! Env Debug Lambda - Reports whether the completion API key is wired up.
//!
//! Never returns the key itself, only its presence and length.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Serialize;
use shared::http::json_response;
use shared::{resolve_api_key, Config};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatus {
    has_key: bool,
    length: usize,
}

impl KeyStatus {
    fn of(key: Option<&str>) -> Self {
        Self {
            has_key: key.is_some(),
            length: key.map_or(0, str::len),
        }
    }
}

async fn handler(status: Arc<KeyStatus>, _event: Request) -> Result<Response<Body>, Error> {
    json_response(200, status.as_ref())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    let api_key = match resolve_api_key(&config).await {
        Ok(key) => key,
        Err(e) => {
            error!("Failed to resolve API key: {}", e);
            None
        }
    };

    let status = Arc::new(KeyStatus::of(api_key.as_deref()));
    info!("Key status: has_key={}, length={}", status.has_key, status.length);

    run(service_fn(move |event| {
        let status = Arc::clone(&status);
        async move { handler(status, event).await }
    }))
    .await
}
