//! HTTP helpers for Lambda functions.
//!
//! Every response carries permissive CORS headers so the browser client can call the
//! endpoints directly.

use lambda_http::http::{response::Builder, Method};
use lambda_http::{Body, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error body returned for transport-level failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn cors_builder(status: u16) -> Builder {
    Response::builder()
        .status(status)
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-methods", "POST, OPTIONS")
        .header("access-control-allow-headers", "Content-Type, Authorization")
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(cors_builder(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Create an error response with the given status code and message.
pub fn error_response(status: u16, message: impl Into<String>) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ErrorBody { error: message.into() })
}

/// Empty 200 answer to a CORS pre-flight request.
pub fn preflight_response() -> Result<Response<Body>, lambda_http::Error> {
    Ok(cors_builder(200).body(Body::Empty)?)
}

/// Gate a POST-only endpoint.
///
/// Returns the response to send immediately for pre-flight and non-POST requests, or
/// `None` when the handler should go on to process the request.
pub fn guard_post(event: &Request) -> Result<Option<Response<Body>>, lambda_http::Error> {
    match *event.method() {
        Method::OPTIONS => Ok(Some(preflight_response()?)),
        Method::POST => Ok(None),
        _ => Ok(Some(error_response(405, "Method not allowed")?)),
    }
}

/// Parse request body as JSON, returning a 400 response on failure.
///
/// An empty body parses as `{}`. Returns `Ok(Ok(T))` on successful parse,
/// `Ok(Err(Response))` on parse error (400), or `Err(lambda_http::Error)` on
/// serialization failure.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<Result<T, Response<Body>>, lambda_http::Error> {
    let bytes: &[u8] = body.as_ref();
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { bytes };

    match serde_json::from_slice(bytes) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => {
            let response = error_response(400, format!("Invalid request body: {}", e))?;
            Ok(Err(response))
        }
    }
}

/// Macro to parse request body, returning early with 400 on parse error.
///
/// Usage:
/// ```ignore
/// let request: MyRequest = parse_body!(event.body());
/// ```
#[macro_export]
macro_rules! parse_body {
    ($body:expr) => {
        match shared::http::parse_json_body($body)? {
            Ok(parsed) => parsed,
            Err(response) => return Ok(response),
        }
    };
}
