//! Advice pipeline: normalize request, parse cabinet, request completion, validate.

use tracing::{info, warn};

use crate::cabinet::{parse_entries, CabinetWhitelist};
use crate::completion::CompletionClient;
use crate::consultation::ResponseNormalizer;
use crate::models::AdviceEnvelope;
use crate::prompts::PromptConfig;
use crate::request::AdviceRequest;
use crate::Result;

/// Error reported alongside the advisory reply when no credential is configured.
pub const MISSING_KEY_ERROR: &str = "Missing OPENAI_API_KEY";

/// Stateless advice service. The client is `None` when no API key is configured.
pub struct AdviceService<C> {
    client: Option<C>,
    prompts: PromptConfig,
}

impl<C: CompletionClient> AdviceService<C> {
    pub fn new(client: Option<C>, prompts: PromptConfig) -> Self {
        Self { client, prompts }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Run one consultation.
    ///
    /// Only a malformed request is an error; every completion outcome becomes a
    /// renderable envelope.
    pub async fn advise(&self, request: AdviceRequest) -> Result<AdviceEnvelope> {
        let input = request.normalize()?;
        let entries = parse_entries(&input.cabinet);
        let whitelist = CabinetWhitelist::from_entries(&entries);
        let turn_count = input.turn_count();
        let normalizer = ResponseNormalizer::new(&whitelist, turn_count, input.member_name());

        info!(
            "Advice request: {} turns ({} from user), {} cabinet entries, {} suitable",
            input.turns.len(),
            turn_count,
            entries.len(),
            whitelist.len()
        );

        let Some(client) = &self.client else {
            warn!("No API key configured; returning advisory response");
            return Ok(AdviceEnvelope {
                reply: normalizer.advisory(),
                success: false,
                error: Some(MISSING_KEY_ERROR.to_string()),
            });
        };

        let prompt = self.prompts.advice(&input, &entries, &whitelist);
        let completion = match client.complete(&prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Completion failed, returning fallback: {}", e);
                None
            }
        };

        let envelope = normalizer.normalize(completion.as_deref());
        info!(
            "Advice ready (success: {}, cabinet recommendations: {})",
            envelope.success,
            envelope.reply.cabinet_recommendations.len()
        );
        Ok(envelope)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StubCompletion;
    use super::*;
    use crate::Error;

    fn request(json: &str) -> AdviceRequest {
        serde_json::from_str(json).unwrap()
    }

    fn service(stub: StubCompletion) -> AdviceService<StubCompletion> {
        AdviceService::new(Some(stub), PromptConfig::default())
    }

    const CABINET: &str = "Nurofen 400 - ✅ SUITABLE\nAspirin - ❌ NOT SUITABLE: age";

    #[tokio::test]
    async fn test_successful_consultation() {
        let completion = r#"{
            "greeting": "Hi Sam",
            "assessment": "Likely a cold.",
            "need_more_info": false,
            "cabinet_recommendations": [{"name": "Nurofen 400", "reason": "aches"}, {"name": "Aspirin", "reason": "aches"}],
            "disclaimer": "Not medical advice."
        }"#;
        let service = service(StubCompletion::answering(completion));
        let envelope = service
            .advise(request(&format!(
                r#"{{"messages":[{{"role":"user","text":"I have a cold"}}],"member":{{"name":"Sam"}},"cabinet":{}}}"#,
                serde_json::to_string(CABINET).unwrap()
            )))
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.reply.greeting, "Hi Sam");
        assert_eq!(envelope.reply.cabinet_recommendations.len(), 1);
        assert_eq!(envelope.reply.cabinet_recommendations[0].name, "Nurofen 400");

        let client = service.client.as_ref().unwrap();
        assert_eq!(client.calls(), 1);
        let prompt = client.requests.lock().unwrap()[0].user_text();
        assert!(prompt.contains("Cabinet medicines you may recommend: nurofen 400"));
    }

    #[tokio::test]
    async fn test_completion_failure_returns_fallback() {
        let service = service(StubCompletion::failing());
        let envelope = service
            .advise(request(r#"{"messages":[{"role":"user","text":"help"}]}"#))
            .await
            .unwrap();
        assert!(!envelope.success);
        assert!(!envelope.reply.disclaimer.is_empty());
        assert!(envelope.error.is_none());
        assert_eq!(service.client.as_ref().unwrap().calls(), 1);
    }

    #[tokio::test]
    async fn test_not_json_completion_returns_fallback() {
        let failing = service(StubCompletion::failing())
            .advise(request("{}"))
            .await
            .unwrap();
        let not_json = service(StubCompletion::answering("not json"))
            .advise(request("{}"))
            .await
            .unwrap();
        assert_eq!(failing, not_json);
    }

    #[tokio::test]
    async fn test_follow_up_turn_greeting_cleared() {
        let service = service(StubCompletion::answering(r#"{"greeting":"Hello again!"}"#));
        let envelope = service
            .advise(request(
                r#"{"messages":[{"role":"user","text":"a"},{"role":"assistant","text":"b"},{"role":"user","text":"c"}]}"#,
            ))
            .await
            .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.reply.greeting, "");
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        let service: AdviceService<StubCompletion> = AdviceService::new(None, PromptConfig::default());
        assert!(!service.has_client());
        let envelope = service.advise(request("{}")).await.unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some(MISSING_KEY_ERROR));
        assert!(!envelope.reply.disclaimer.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_is_error() {
        let stub = StubCompletion::answering("{}");
        let service = service(stub);
        let oversized = AdviceRequest {
            cabinet: Some("x".repeat(20_001)),
            ..Default::default()
        };
        let result = service.advise(oversized).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(service.client.as_ref().unwrap().calls(), 0);
    }
}
