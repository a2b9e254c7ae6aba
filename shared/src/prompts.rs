//! Prompt construction for the completion API.
//!
//! Wording lives here as plain constants; the advice system prompt can be replaced
//! through configuration without touching the normalization rules.

use crate::cabinet::{CabinetEntry, CabinetWhitelist};
use crate::completion::CompletionRequest;
use crate::consultation::TurnState;
use crate::request::{ConsultationInput, MemberProfile};

pub const ADVICE_SYSTEM_PROMPT: &str = "You are a careful, non-diagnostic health assistant \
for a family medicine cabinet app. Offer short, safe, informational guidance. Do not \
prescribe. Suggest over-the-counter options only when appropriate and mention common \
contraindications briefly. Only recommend medicines from the cabinet when they appear \
in the list of suitable cabinet medicines. Reply with a single JSON object and nothing else.";

const ADVICE_RESPONSE_SHAPE: &str = r#"{
  "greeting": string,
  "assessment": string,
  "need_more_info": boolean,
  "follow_up_questions": [string],
  "cabinet_recommendations": [{"name": string, "reason": string, "suitable": boolean}],
  "shopping_recommendations": [{"name": string, "reason": string}],
  "self_care": [string],
  "red_flags": [string],
  "disclaimer": string
}"#;

pub const TRAVEL_PACK_SYSTEM_PROMPT: &str =
    "You are a pharmacist generating travel medicine suggestions as strict JSON.";

pub const LABEL_SYSTEM_PROMPT: &str = "You extract medicine label data as strict JSON.";

const LABEL_INSTRUCTIONS: &str = "Extract medicine fields from the label: name, dosage, \
type, illness, expiryDate (YYYY-MM-DD). If a field is unknown, omit it. Return JSON only.";

/// Prompt settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub advice_system_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            advice_system_prompt: ADVICE_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn with_system_prompt(system_prompt: Option<String>) -> Self {
        system_prompt
            .map(|advice_system_prompt| Self { advice_system_prompt })
            .unwrap_or_default()
    }

    /// Build the advice prompt for one consultation.
    pub fn advice(
        &self,
        input: &ConsultationInput,
        entries: &[CabinetEntry],
        whitelist: &CabinetWhitelist,
    ) -> CompletionRequest {
        let turn_count = input.turn_count();
        let mut user = String::new();

        user.push_str("Member profile:\n");
        match &input.member {
            Some(member) => {
                for line in member_lines(member) {
                    user.push_str(&line);
                    user.push('\n');
                }
            }
            None => user.push_str("- not provided\n"),
        }

        user.push_str("\nMedicine cabinet:\n");
        if entries.is_empty() {
            user.push_str("- empty\n");
        }
        for entry in entries {
            let status = match (entry.suitable, &entry.reason) {
                (true, _) => "suitable".to_string(),
                (false, Some(reason)) => format!("NOT suitable ({})", reason),
                (false, None) => "NOT suitable".to_string(),
            };
            user.push_str(&format!("- {}: {}\n", entry.name, status));
        }

        let allowed = whitelist.iter().collect::<Vec<_>>().join(", ");
        user.push_str(&format!(
            "\nCabinet medicines you may recommend: {}\n",
            if allowed.is_empty() { "none" } else { allowed.as_str() }
        ));
        user.push_str(
            "Never put anything else in cabinet_recommendations; suggest other products \
             in shopping_recommendations instead.\n",
        );

        user.push_str(&format!(
            "\nThis is user message number {}.\n",
            turn_count.max(1)
        ));
        match TurnState::from_turn_count(turn_count) {
            TurnState::FirstTurn => user.push_str(
                "Start with a short, warm greeting. If you need more information, set \
                 need_more_info to true and ask specific follow_up_questions.\n",
            ),
            TurnState::FollowUpTurn => user.push_str(
                "Do not greet again: set greeting to an empty string. Only set \
                 need_more_info to true if you ask follow_up_questions.\n",
            ),
        }

        user.push_str(&format!(
            "\nConversation:\n{}\n\nRespond with JSON of this shape:\n{}",
            input.transcript(),
            ADVICE_RESPONSE_SHAPE
        ));

        CompletionRequest::json(&self.advice_system_prompt, user)
    }
}

/// Profile facts as `- key: value` lines, skipping anything not provided.
fn member_lines(member: &MemberProfile) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(name) = member.display_name() {
        lines.push(format!("- name: {}", name));
    }
    if let Some(age) = member.age_years {
        lines.push(format!("- age: {} years", age));
    }
    if let Some(weight) = member.weight_kg {
        lines.push(format!("- weight: {} kg", weight));
    }
    if let Some(location) = member.location.as_deref().filter(|l| !l.trim().is_empty()) {
        lines.push(format!("- location: {}", location.trim()));
    }
    if !member.allergies.is_empty() {
        lines.push(format!("- allergies: {}", member.allergies.join(", ")));
    }
    if !member.conditions.is_empty() {
        lines.push(format!("- conditions: {}", member.conditions.join(", ")));
    }
    lines
}

/// Prompt for travel pack suggestions.
pub fn travel_pack(
    members: &[String],
    city: &str,
    start_date: &str,
    duration_days: u32,
    whitelist: &CabinetWhitelist,
) -> CompletionRequest {
    let allowed = whitelist.iter().collect::<Vec<_>>().join(", ");
    let user = format!(
        "Plan a travel medicine pack.\n\
         Destination city: {city}\n\
         Start date: {start_date}\n\
         Duration (days): {duration_days}\n\
         Travelers: {travelers}\n\
         Medicines already in the cabinet: {cabinet}\n\n\
         Return JSON with keys \"fromCabinet\" and \"toBuy\" (arrays of items with name, \
         reason, and optional qty). Only list cabinet medicines under fromCabinet. \
         Do not include any text outside JSON.",
        travelers = members.join(", "),
        cabinet = if allowed.is_empty() { "none" } else { allowed.as_str() },
    );
    CompletionRequest::json(TRAVEL_PACK_SYSTEM_PROMPT, user)
}

/// Prompt for reading a medicine label from photos and OCR text.
pub fn label_extraction(images: &[&str], ocr_text: &str) -> CompletionRequest {
    let mut request = CompletionRequest::json(LABEL_SYSTEM_PROMPT, LABEL_INSTRUCTIONS);
    for image in images {
        request = request.with_image(*image);
    }
    if !ocr_text.trim().is_empty() {
        request = request.with_text(format!("OCR/Text: {}", ocr_text.trim()));
    }
    request
}
