//! Extraction endpoint: travel pack suggestions and medicine label reading.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::cabinet::CabinetWhitelist;
use crate::candidate::Candidate;
use crate::completion::CompletionClient;
use crate::prompts;
use crate::{Error, Result};

/// Images beyond this count are ignored.
pub const MAX_IMAGES: usize = 4;

const TRAVEL_PACK_KIND: &str = "travel-pack";

/// Travel pack suggestion request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TravelPackRequest {
    #[serde(default, deserialize_with = "ids")]
    pub members: Vec<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    #[validate(range(max = 365))]
    pub duration_days: u32,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub cabinet: Option<String>,
}

/// Medicine label extraction request.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LabelRequest {
    #[serde(default)]
    #[validate(length(max = 20))]
    pub images: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub text: String,
}

/// Either kind of extraction, selected by the `type` field.
#[derive(Debug)]
pub enum ExtractRequest {
    TravelPack(TravelPackRequest),
    Label(LabelRequest),
}

impl ExtractRequest {
    pub fn from_value(value: Value) -> Result<Self> {
        let is_travel_pack = value.get("type").and_then(Value::as_str) == Some(TRAVEL_PACK_KIND);
        let request = if is_travel_pack {
            let request: TravelPackRequest = serde_json::from_value(value)?;
            request.validate().map_err(|e| Error::Validation(e.to_string()))?;
            ExtractRequest::TravelPack(request)
        } else {
            let request: LabelRequest = serde_json::from_value(value)?;
            request.validate().map_err(|e| Error::Validation(e.to_string()))?;
            ExtractRequest::Label(request)
        };
        Ok(request)
    }
}

/// Member ids arrive as strings or numbers.
fn ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackItem {
    pub name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelPack {
    pub from_cabinet: Vec<PackItem>,
    pub to_buy: Vec<PackItem>,
}

impl TravelPack {
    /// Static suggestions used when no API key is configured.
    pub fn fallback() -> Self {
        Self {
            from_cabinet: Vec::new(),
            to_buy: vec![
                PackItem {
                    name: "Pain reliever (Paracetamol/Ibuprofen)".to_string(),
                    reason: "General pain/fever".to_string(),
                    qty: None,
                },
                PackItem {
                    name: "Antihistamines".to_string(),
                    reason: "Allergy relief".to_string(),
                    qty: None,
                },
            ],
        }
    }

    /// Read a completion, keeping only whitelisted cabinet items.
    fn from_completion(text: &str, whitelist: &CabinetWhitelist) -> Result<Self> {
        let candidate = Candidate::parse(text)?;
        let mut from_cabinet = read_pack_items(&candidate, "fromCabinet");
        from_cabinet.retain(|item| {
            let allowed = whitelist.matches(&item.name);
            if !allowed {
                warn!("Dropping travel pack cabinet item not in whitelist: {}", item.name);
            }
            allowed
        });
        Ok(Self {
            from_cabinet,
            to_buy: read_pack_items(&candidate, "toBuy"),
        })
    }
}

fn read_pack_items(candidate: &Candidate, key: &str) -> Vec<PackItem> {
    candidate
        .items(key)
        .iter()
        .filter_map(|item| {
            Some(PackItem {
                name: item.text("name")?,
                reason: item.text("reason").unwrap_or_default(),
                qty: item.count("qty"),
            })
        })
        .collect()
}

/// Fields read from a medicine label. Unknown fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLabel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub medicine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub illness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
}

impl ExtractedLabel {
    fn from_completion(text: &str) -> Result<Self> {
        let candidate = Candidate::parse(text)?;
        Ok(Self {
            name: candidate.text("name"),
            dosage: candidate.text("dosage"),
            medicine_type: candidate.text("type"),
            illness: candidate.text("illness"),
            expiry_date: candidate
                .text("expiryDate")
                .map(|raw| normalize_expiry(&raw).unwrap_or(raw)),
        })
    }
}

/// Normalize a printed expiry date to `YYYY-MM-DD`.
///
/// Month-only dates (`03/2027`) resolve to the last day of that month.
pub fn normalize_expiry(raw: &str) -> Option<String> {
    const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d", "%d-%m-%Y"];
    const MONTH_FORMATS: &[&str] = &["%m/%Y", "%m/%y", "%m-%Y", "%Y-%m", "%m.%Y"];

    let upper = raw.trim().to_ascii_uppercase();
    let value = upper
        .strip_prefix("EXP")
        .map(|rest| rest.trim_start_matches(|c: char| c == ':' || c == '.' || c.is_whitespace()))
        .unwrap_or(&upper);

    if let Some(date) = DAY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    {
        return Some(date.format("%Y-%m-%d").to_string());
    }

    MONTH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&format!("01 {}", value), &format!("%d {}", fmt)).ok())
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.checked_sub_days(Days::new(1)))
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Keep only decodable `data:image/*;base64,` URLs, up to [`MAX_IMAGES`].
pub fn usable_images(images: &[String]) -> Vec<&str> {
    images
        .iter()
        .map(|url| url.trim())
        .filter(|url| {
            let usable = is_image_data_url(url);
            if !usable {
                warn!("Skipping image that is not a base64 image data URL");
            }
            usable
        })
        .take(MAX_IMAGES)
        .collect()
}

fn is_image_data_url(url: &str) -> bool {
    let Some(rest) = url.strip_prefix("data:image/") else {
        return false;
    };
    let Some((_, payload)) = rest.split_once(";base64,") else {
        return false;
    };
    !payload.is_empty() && STANDARD.decode(payload).is_ok()
}

/// Response body of the extraction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractResponse {
    TravelPack(TravelPack),
    Label(ExtractedLabel),
}

/// Stateless extraction service. The client is `None` when no API key is configured.
pub struct ExtractionService<C> {
    client: Option<C>,
}

impl<C: CompletionClient> ExtractionService<C> {
    pub fn new(client: Option<C>) -> Self {
        Self { client }
    }

    pub async fn extract(&self, request: ExtractRequest) -> ExtractResponse {
        match request {
            ExtractRequest::TravelPack(r) => ExtractResponse::TravelPack(self.travel_pack(r).await),
            ExtractRequest::Label(r) => ExtractResponse::Label(self.label(r).await),
        }
    }

    pub async fn travel_pack(&self, request: TravelPackRequest) -> TravelPack {
        let Some(client) = &self.client else {
            warn!("No API key configured; returning static travel pack");
            return TravelPack::fallback();
        };

        let whitelist = CabinetWhitelist::parse(request.cabinet.as_deref().unwrap_or_default());
        let prompt = prompts::travel_pack(
            &request.members,
            &request.city,
            &request.start_date,
            request.duration_days,
            &whitelist,
        );

        match client.complete(&prompt).await {
            Ok(text) => TravelPack::from_completion(&text, &whitelist).unwrap_or_else(|e| {
                warn!("Unusable travel pack completion: {}", e);
                TravelPack::default()
            }),
            Err(e) => {
                warn!("Travel pack completion failed: {}", e);
                TravelPack::default()
            }
        }
    }

    pub async fn label(&self, request: LabelRequest) -> ExtractedLabel {
        let Some(client) = &self.client else {
            warn!("No API key configured; returning empty label");
            return ExtractedLabel::default();
        };

        let images = usable_images(&request.images);
        info!("Label extraction with {} images", images.len());
        let prompt = prompts::label_extraction(&images, &request.text);

        match client.complete(&prompt).await {
            Ok(text) => ExtractedLabel::from_completion(&text).unwrap_or_else(|e| {
                warn!("Unusable label completion: {}", e);
                ExtractedLabel::default()
            }),
            Err(e) => {
                warn!("Label completion failed: {}", e);
                ExtractedLabel::default()
            }
        }
    }
}
