//! Inbound advice request parsing and normalization.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::{Error, Result};

/// Upper bound on conversation history accepted per request.
pub const MAX_MESSAGES: u64 = 100;
/// Upper bound on cabinet listing size, in characters.
pub const MAX_CABINET_CHARS: u64 = 20_000;

/// Advice request payload, as sent by the client application.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub messages: Option<Vec<IncomingMessage>>,
    #[serde(default)]
    pub member: Option<MemberProfile>,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub cabinet: Option<String>,
}

/// A message as it arrives on the wire; `content` is accepted in place of `text`.
///
/// `Serialize` is needed by the length check on `messages`, which records the value.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Map a wire role label. A missing label means the user; unknown labels map to `None`.
    pub fn from_label(label: Option<&str>) -> Option<Self> {
        match label.map(str::trim) {
            None | Some("") => Some(Role::User),
            Some(l) if l.eq_ignore_ascii_case("user") => Some(Role::User),
            Some(l) if l.eq_ignore_ascii_case("assistant") => Some(Role::Assistant),
            Some(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One exchange in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

/// Profile of the person the advice is for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age_years: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub allergies: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub conditions: Vec<String>,
}

impl MemberProfile {
    /// The member's name, if one was given.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Accepts `"a, b"`, `["a", "b"]` or `null`.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    let items = match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::One(s)) => s.split(',').map(str::to_string).collect(),
        Some(Raw::Many(v)) => v,
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Canonical, validated form of an advice request.
#[derive(Debug, Clone, Default)]
pub struct ConsultationInput {
    pub turns: Vec<ConversationTurn>,
    pub member: Option<MemberProfile>,
    pub cabinet: String,
}

impl AdviceRequest {
    /// Validate size limits and convert into the canonical form.
    pub fn normalize(self) -> Result<ConsultationInput> {
        self.validate()
            .map_err(|e| Error::Validation(e.to_string()))?;

        let turns = self
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let role = Role::from_label(m.role.as_deref())?;
                let text = m.text.or(m.content).unwrap_or_default();
                Some(ConversationTurn {
                    role,
                    text: text.trim().to_string(),
                })
            })
            .collect();

        Ok(ConsultationInput {
            turns,
            member: self.member,
            cabinet: self.cabinet.unwrap_or_default(),
        })
    }
}

impl ConsultationInput {
    /// Number of user-authored turns.
    pub fn turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member.as_ref().and_then(MemberProfile::display_name)
    }

    /// Render the history as `role: text` lines.
    pub fn transcript(&self) -> String {
        if self.turns.is_empty() {
            return "user: hello".to_string();
        }
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
