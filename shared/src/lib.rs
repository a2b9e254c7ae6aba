//! Shared library for the medicine cabinet Lambda functions.
//!
//! This crate holds the advice and extraction pipelines, the completion client, and the
//! HTTP, configuration and error plumbing used by every Lambda binary.

pub mod advice;
pub mod cabinet;
pub mod candidate;
pub mod completion;
pub mod config;
pub mod consultation;
pub mod error;
pub mod extraction;
pub mod http;
pub mod models;
pub mod prompts;
pub mod request;
pub mod secrets;

pub use advice::AdviceService;
pub use cabinet::{CabinetEntry, CabinetWhitelist};
pub use completion::{CompletionClient, CompletionRequest, OpenAiClient};
pub use config::Config;
pub use consultation::{ResponseNormalizer, TurnState};
pub use error::{Error, Result};
pub use extraction::{ExtractRequest, ExtractResponse, ExtractionService};
pub use models::{AdviceEnvelope, ConsultationResponse, RecommendationItem};
pub use prompts::PromptConfig;
pub use request::{AdviceRequest, ConversationTurn, MemberProfile, Role};
pub use secrets::resolve_api_key;
