//! Validation and normalization of model-generated consultations.
//!
//! The model's output is untrusted. [`ResponseNormalizer::normalize`] turns it (or the
//! absence of it) into a [`ConsultationResponse`] that always has every field, only
//! recommends cabinet medicines that are on the whitelist, and follows the turn rules:
//!
//! - first turn: non-empty greeting, and never `need_more_info` without a question
//! - follow-up turns: no greeting

use tracing::{info, warn};

use crate::cabinet::CabinetWhitelist;
use crate::candidate::Candidate;
use crate::models::{AdviceEnvelope, ConsultationResponse, RecommendationItem};

/// Placeholder for scalar text fields the model left out.
pub const UNAVAILABLE: &str = "Information not available.";

pub const DISCLAIMER: &str = "This information is for general guidance only and is not a \
substitute for professional medical advice. Always read the label, and speak to a \
pharmacist or doctor if you are unsure or your symptoms get worse.";

pub const GENERIC_QUESTION: &str =
    "Could you tell me more about your symptoms, such as when they started and how severe they are?";

const FALLBACK_ASSESSMENT: &str = "Sorry, I couldn't put together advice right now. \
Please try again in a moment, or speak to a pharmacist if you need help sooner.";

const ADVISORY_ASSESSMENT: &str = "Advice is not available at the moment because the \
service is not fully configured. Please try again later.";

const FALLBACK_SELF_CARE: [&str; 3] = [
    "Rest and keep hydrated.",
    "Follow the dosing instructions on any medicine you already take.",
    "Keep a note of your symptoms and how they change.",
];

const FALLBACK_RED_FLAGS: [&str; 3] = [
    "Difficulty breathing or chest pain.",
    "A high fever that does not come down.",
    "Symptoms that get suddenly worse or do not improve after a few days.",
];

/// Which normalization rules apply, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    FirstTurn,
    FollowUpTurn,
}

impl TurnState {
    /// A request with no user message yet is treated as the first turn.
    pub fn from_turn_count(turn_count: usize) -> Self {
        if turn_count > 1 {
            TurnState::FollowUpTurn
        } else {
            TurnState::FirstTurn
        }
    }
}

/// Fields as read from the candidate, before defaults are applied.
#[derive(Debug, Default)]
struct Draft {
    greeting: Option<String>,
    assessment: Option<String>,
    need_more_info: Option<bool>,
    follow_up_questions: Vec<String>,
    cabinet_recommendations: Vec<RecommendationItem>,
    shopping_recommendations: Vec<RecommendationItem>,
    self_care: Vec<String>,
    red_flags: Vec<String>,
    disclaimer: Option<String>,
}

impl Draft {
    fn read(candidate: &Candidate) -> Self {
        Self {
            greeting: candidate.text("greeting"),
            assessment: candidate.text("assessment"),
            need_more_info: candidate.flag("need_more_info"),
            follow_up_questions: candidate.strings("follow_up_questions"),
            cabinet_recommendations: read_items(candidate, "cabinet_recommendations"),
            shopping_recommendations: read_items(candidate, "shopping_recommendations"),
            self_care: candidate.strings("self_care"),
            red_flags: candidate.strings("red_flags"),
            disclaimer: candidate.text("disclaimer"),
        }
    }
}

fn read_items(candidate: &Candidate, key: &str) -> Vec<RecommendationItem> {
    candidate
        .items(key)
        .iter()
        .filter_map(|item| {
            Some(RecommendationItem {
                name: item.text("name")?,
                reason: item.text("reason").unwrap_or_else(|| UNAVAILABLE.to_string()),
                suitable: item.flag("suitable"),
            })
        })
        .collect()
}

/// Per-request normalizer.
#[derive(Debug, Clone, Copy)]
pub struct ResponseNormalizer<'a> {
    whitelist: &'a CabinetWhitelist,
    turn: TurnState,
    member_name: Option<&'a str>,
}

impl<'a> ResponseNormalizer<'a> {
    pub fn new(whitelist: &'a CabinetWhitelist, turn_count: usize, member_name: Option<&'a str>) -> Self {
        Self {
            whitelist,
            turn: TurnState::from_turn_count(turn_count),
            member_name,
        }
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    /// Normalize a completion; `None` means the completion call failed.
    pub fn normalize(&self, completion: Option<&str>) -> AdviceEnvelope {
        let Some(text) = completion else {
            return AdviceEnvelope::fallback(self.fallback());
        };

        let candidate = match Candidate::parse(text) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Unusable completion, returning fallback: {}", e);
                return AdviceEnvelope::fallback(self.fallback());
            }
        };

        let mut draft = Draft::read(&candidate);
        self.filter_cabinet(&mut draft);
        self.apply_turn_rule(&mut draft);
        let mut response = fill_defaults(draft);
        self.complete_first_turn(&mut response);

        AdviceEnvelope::success(response)
    }

    fn filter_cabinet(&self, draft: &mut Draft) {
        let whitelist = self.whitelist;
        draft.cabinet_recommendations.retain(|item| {
            let allowed = whitelist.matches(&item.name);
            if !allowed {
                warn!("Dropping cabinet recommendation not in whitelist: {}", item.name);
            }
            allowed
        });
    }

    fn apply_turn_rule(&self, draft: &mut Draft) {
        if self.turn != TurnState::FollowUpTurn {
            return;
        }
        draft.greeting = None;
        if draft.follow_up_questions.is_empty() {
            draft.need_more_info = Some(false);
        }
    }

    fn complete_first_turn(&self, response: &mut ConsultationResponse) {
        if self.turn != TurnState::FirstTurn {
            return;
        }
        if response.greeting.is_empty() {
            response.greeting = self.generic_greeting();
        }
        if response.need_more_info && response.follow_up_questions.is_empty() {
            info!("Model asked for more information without a question; adding a generic one");
            response.follow_up_questions.push(GENERIC_QUESTION.to_string());
        }
    }

    fn generic_greeting(&self) -> String {
        match self.member_name {
            Some(name) => format!("Hi {}, I'm sorry you're not feeling well.", name),
            None => "Hi, I'm sorry you're not feeling well.".to_string(),
        }
    }

    fn greeting_for_turn(&self) -> String {
        match self.turn {
            TurnState::FirstTurn => self.generic_greeting(),
            TurnState::FollowUpTurn => String::new(),
        }
    }

    /// Fixed safe response used when no usable completion exists.
    pub fn fallback(&self) -> ConsultationResponse {
        ConsultationResponse {
            greeting: self.greeting_for_turn(),
            assessment: FALLBACK_ASSESSMENT.to_string(),
            need_more_info: false,
            follow_up_questions: Vec::new(),
            cabinet_recommendations: Vec::new(),
            shopping_recommendations: vec![RecommendationItem::new(
                "Consult a healthcare professional",
                "A pharmacist or doctor can assess your symptoms and recommend a suitable treatment.",
            )],
            self_care: FALLBACK_SELF_CARE.iter().map(|s| s.to_string()).collect(),
            red_flags: FALLBACK_RED_FLAGS.iter().map(|s| s.to_string()).collect(),
            disclaimer: DISCLAIMER.to_string(),
        }
    }

    /// Response used when the completion API is not configured.
    pub fn advisory(&self) -> ConsultationResponse {
        ConsultationResponse {
            assessment: ADVISORY_ASSESSMENT.to_string(),
            ..self.fallback()
        }
    }
}

fn fill_defaults(draft: Draft) -> ConsultationResponse {
    ConsultationResponse {
        greeting: draft.greeting.unwrap_or_default(),
        assessment: draft.assessment.unwrap_or_else(|| UNAVAILABLE.to_string()),
        need_more_info: draft.need_more_info.unwrap_or(false),
        follow_up_questions: draft.follow_up_questions,
        cabinet_recommendations: draft.cabinet_recommendations,
        shopping_recommendations: draft.shopping_recommendations,
        self_care: draft.self_care,
        red_flags: draft.red_flags,
        disclaimer: draft.disclaimer.unwrap_or_else(|| UNAVAILABLE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const FIELDS: [&str; 9] = [
        "greeting",
        "assessment",
        "need_more_info",
        "follow_up_questions",
        "cabinet_recommendations",
        "shopping_recommendations",
        "self_care",
        "red_flags",
        "disclaimer",
    ];

    fn whitelist() -> CabinetWhitelist {
        CabinetWhitelist::parse("Nurofen 400 - ✅ SUITABLE\nAspirin - ❌ NOT SUITABLE: age")
    }

    fn full_completion() -> String {
        serde_json::json!({
            "greeting": "Hello Sam!",
            "assessment": "Sounds like a tension headache.",
            "need_more_info": false,
            "follow_up_questions": [],
            "cabinet_recommendations": [
                {"name": "Nurofen", "reason": "pain relief", "suitable": true},
                {"name": "Aspirin", "reason": "pain"}
            ],
            "shopping_recommendations": [{"name": "Cold compress", "reason": "soothing"}],
            "self_care": ["Drink water"],
            "red_flags": ["Stiff neck"],
            "disclaimer": "Not medical advice."
        })
        .to_string()
    }

    #[test]
    fn test_aspirin_filtered_against_nurofen_whitelist() {
        let whitelist = whitelist();
        let normalizer = ResponseNormalizer::new(&whitelist, 1, None);
        let completion = r#"{"cabinet_recommendations":[{"name":"Aspirin","reason":"pain"}]}"#;
        let envelope = normalizer.normalize(Some(completion));
        assert!(envelope.success);
        assert!(envelope.reply.cabinet_recommendations.is_empty());
    }

    #[test]
    fn test_whitelisted_items_kept() {
        let whitelist = whitelist();
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(&full_completion()));
        let names: Vec<_> = envelope
            .reply
            .cabinet_recommendations
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["Nurofen"]);
        assert_eq!(envelope.reply.cabinet_recommendations[0].suitable, Some(true));
        assert_eq!(envelope.reply.shopping_recommendations.len(), 1);
    }

    #[test]
    fn test_empty_whitelist_drops_everything() {
        let whitelist = CabinetWhitelist::default();
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(&full_completion()));
        assert!(envelope.reply.cabinet_recommendations.is_empty());
        assert_eq!(envelope.reply.shopping_recommendations.len(), 1);
    }

    #[test]
    fn test_adversarial_names() {
        let whitelist = CabinetWhitelist::parse("Ibuprofen Gel - ✅ SUITABLE");
        let completion = serde_json::json!({
            "cabinet_recommendations": [
                {"name": "Ibuprofen", "reason": "a"},
                {"name": "IBUPROFEN GEL 5%", "reason": "b"},
                {"name": "Ibuprofen Tablets", "reason": "c"},
                {"name": "", "reason": "d"},
                {"reason": "e"}
            ]
        })
        .to_string();
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(&completion));
        let names: Vec<_> = envelope
            .reply
            .cabinet_recommendations
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ibuprofen", "IBUPROFEN GEL 5%"]);
    }

    #[test]
    fn test_hyphenated_cabinet_name_does_not_widen_whitelist() {
        let whitelist = CabinetWhitelist::parse(
            "Co-codamol - ✅ SUITABLE\nLemsip Cold & Flu - ❌ NOT SUITABLE: contains paracetamol",
        );
        let completion = serde_json::json!({
            "cabinet_recommendations": [
                {"name": "Co-codamol", "reason": "a"},
                {"name": "Lemsip Cold & Flu", "reason": "b"},
                {"name": "Covonia Cough Syrup", "reason": "c"}
            ]
        })
        .to_string();
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(&completion));
        let names: Vec<_> = envelope
            .reply
            .cabinet_recommendations
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["Co-codamol"]);
    }

    #[test]
    fn test_follow_up_turn_clears_greeting() {
        let whitelist = whitelist();
        let envelope = ResponseNormalizer::new(&whitelist, 2, Some("Sam")).normalize(Some(&full_completion()));
        assert!(envelope.success);
        assert_eq!(envelope.reply.greeting, "");
    }

    #[test]
    fn test_follow_up_turn_need_more_info_requires_questions() {
        let whitelist = whitelist();
        let normalizer = ResponseNormalizer::new(&whitelist, 3, None);

        let without = normalizer.normalize(Some(r#"{"need_more_info":true}"#));
        assert!(!without.reply.need_more_info);
        assert!(without.reply.follow_up_questions.is_empty());

        let with = normalizer
            .normalize(Some(r#"{"need_more_info":true,"follow_up_questions":["Any fever?"]}"#));
        assert!(with.reply.need_more_info);
        assert_eq!(with.reply.follow_up_questions, vec!["Any fever?"]);
    }

    #[test]
    fn test_missing_completion_falls_back() {
        let whitelist = whitelist();
        let envelope = ResponseNormalizer::new(&whitelist, 1, Some("Sam")).normalize(None);
        assert!(!envelope.success);
        assert!(!envelope.reply.disclaimer.is_empty());
        assert_eq!(envelope.reply.greeting, "Hi Sam, I'm sorry you're not feeling well.");
        assert!(!envelope.reply.need_more_info);
        assert!(envelope.reply.follow_up_questions.is_empty());
        assert!(envelope.reply.cabinet_recommendations.is_empty());
        assert_eq!(envelope.reply.shopping_recommendations.len(), 1);
        assert_eq!(envelope.reply.self_care.len(), 3);
        assert_eq!(envelope.reply.red_flags.len(), 3);
    }

    #[test]
    fn test_not_json_matches_call_failure() {
        let whitelist = whitelist();
        let normalizer = ResponseNormalizer::new(&whitelist, 1, None);
        assert_eq!(normalizer.normalize(Some("not json")), normalizer.normalize(None));
        assert_eq!(normalizer.normalize(Some("[]")), normalizer.normalize(None));
    }

    #[test]
    fn test_fallback_on_follow_up_has_no_greeting() {
        let whitelist = whitelist();
        let envelope = ResponseNormalizer::new(&whitelist, 4, Some("Sam")).normalize(None);
        assert!(!envelope.success);
        assert_eq!(envelope.reply.greeting, "");
    }

    #[test]
    fn test_first_turn_without_questions_left_alone() {
        let whitelist = whitelist();
        let completion = r#"{"greeting":"Hi!","need_more_info":false}"#;
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(completion));
        assert!(!envelope.reply.need_more_info);
        assert!(envelope.reply.follow_up_questions.is_empty());
        assert_eq!(envelope.reply.greeting, "Hi!");
    }

    #[test]
    fn test_first_turn_need_more_info_gets_question() {
        let whitelist = whitelist();
        let completion = r#"{"greeting":"Hi!","need_more_info":true,"follow_up_questions":[" "]}"#;
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(completion));
        assert!(envelope.reply.need_more_info);
        assert_eq!(envelope.reply.follow_up_questions, vec![GENERIC_QUESTION]);
    }

    #[test]
    fn test_first_turn_empty_greeting_replaced() {
        let whitelist = whitelist();
        let envelope = ResponseNormalizer::new(&whitelist, 0, Some("Ava")).normalize(Some("{}"));
        assert_eq!(envelope.reply.greeting, "Hi Ava, I'm sorry you're not feeling well.");
    }

    #[test]
    fn test_defaults_filled() {
        let whitelist = whitelist();
        let completion = r#"{"assessment":"","disclaimer":null,"self_care":"Rest","red_flags":7}"#;
        let envelope = ResponseNormalizer::new(&whitelist, 2, None).normalize(Some(completion));
        assert!(envelope.success);
        let reply = envelope.reply;
        assert_eq!(reply.assessment, UNAVAILABLE);
        assert_eq!(reply.disclaimer, UNAVAILABLE);
        assert_eq!(reply.self_care, vec!["Rest"]);
        assert!(reply.red_flags.is_empty());
        assert!(!reply.need_more_info);
    }

    #[test]
    fn test_missing_reason_gets_placeholder() {
        let whitelist = whitelist();
        let completion = r#"{"shopping_recommendations":["Plasters"]}"#;
        let envelope = ResponseNormalizer::new(&whitelist, 1, None).normalize(Some(completion));
        assert_eq!(
            envelope.reply.shopping_recommendations,
            vec![RecommendationItem::new("Plasters", UNAVAILABLE)]
        );
    }

    #[test]
    fn test_all_fields_always_serialized() {
        let whitelist = whitelist();
        let inputs = [None, Some("{}"), Some("oops"), Some(r#"{"greeting":null}"#)];
        for turn_count in 0..4 {
            let normalizer = ResponseNormalizer::new(&whitelist, turn_count, None);
            for input in inputs {
                let value = serde_json::to_value(normalizer.normalize(input)).unwrap();
                let reply = value["reply"].as_object().unwrap();
                for field in FIELDS {
                    assert!(
                        reply.get(field).is_some_and(|v| !v.is_null()),
                        "{field} missing for {input:?} at turn {turn_count}"
                    );
                }
                if turn_count > 1 {
                    assert_eq!(reply["greeting"], Value::String(String::new()));
                }
            }
        }
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let whitelist = whitelist();
        let normalizer = ResponseNormalizer::new(&whitelist, 1, Some("Sam"));
        let first = serde_json::to_string(&normalizer.normalize(Some(&full_completion()))).unwrap();
        let second = serde_json::to_string(&normalizer.normalize(Some(&full_completion()))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_advisory_response() {
        let whitelist = whitelist();
        let normalizer = ResponseNormalizer::new(&whitelist, 1, None);
        let advisory = normalizer.advisory();
        assert_ne!(advisory.assessment, normalizer.fallback().assessment);
        assert_eq!(advisory.disclaimer, DISCLAIMER);
    }
}
