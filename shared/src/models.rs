//! Shared data models.

use serde::{Deserialize, Serialize};

/// A recommended medicine or product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub name: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suitable: Option<bool>,
}

impl RecommendationItem {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
            suitable: None,
        }
    }
}

/// Advice returned to the client application. Every field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationResponse {
    pub greeting: String,
    pub assessment: String,
    pub need_more_info: bool,
    pub follow_up_questions: Vec<String>,
    pub cabinet_recommendations: Vec<RecommendationItem>,
    pub shopping_recommendations: Vec<RecommendationItem>,
    pub self_care: Vec<String>,
    pub red_flags: Vec<String>,
    pub disclaimer: String,
}

/// Envelope for the advice endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdviceEnvelope {
    pub reply: ConsultationResponse,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdviceEnvelope {
    pub fn success(reply: ConsultationResponse) -> Self {
        Self {
            reply,
            success: true,
            error: None,
        }
    }

    pub fn fallback(reply: ConsultationResponse) -> Self {
        Self {
            reply,
            success: false,
            error: None,
        }
    }
}
