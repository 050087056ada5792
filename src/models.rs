use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use serde_with::{DefaultOnNull, serde_as};
use std::collections::BTreeMap;

/// Body of a push delivery: `{ "message": { "data": "<base64>", ... }, "subscription": "..." }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: Option<PushMessage>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default, alias = "publish_time")]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

/// Decoded platform notification. Missing or null fields decode to empty values so the gates,
/// not the parser, decide whether the message is worth processing.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub id: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub notification_type: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, rename = "type")]
    pub event_type: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub resource: NotificationResource,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResource {
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Notification {
    pub fn product_id(&self) -> Option<&str> {
        self.resource
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Localized text keyed by locale, in the order the store returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedString(pub Map<String, Value>);

impl LocalizedString {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(locale, text)| (locale.to_string(), Value::String(text.to_string())))
                .collect(),
        )
    }

    /// Resolves a display value: `en`, then `en-US`, then the first entry.
    pub fn resolve(&self) -> Option<&str> {
        self.non_empty("en")
            .or_else(|| self.non_empty("en-US"))
            .or_else(|| {
                self.0
                    .values()
                    .next()
                    .and_then(Value::as_str)
                    .filter(|text| !text.trim().is_empty())
            })
    }

    fn non_empty(&self, locale: &str) -> Option<&str> {
        self.0
            .get(locale)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl ProductAttribute {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn is_enabled(&self) -> bool {
        is_truthy(&self.value)
    }
}

/// Read-only view of a product as fetched from the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSnapshot {
    pub id: String,
    pub product_type_id: Option<String>,
    pub name: LocalizedString,
    pub image_url: Option<String>,
    pub staged_attributes: Vec<ProductAttribute>,
}

impl ProductSnapshot {
    pub fn product_name(&self) -> Option<&str> {
        self.name.resolve()
    }

    pub fn product_type_id(&self) -> Option<&str> {
        self.product_type_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    pub fn attribute(&self, name: &str) -> Option<&ProductAttribute> {
        self.staged_attributes.iter().find(|attr| attr.name == name)
    }
}

/// Outcome of a single gate. `is_valid == false` always implies `should_continue == false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub should_continue: bool,
}

impl ValidationVerdict {
    pub const fn proceed() -> Self {
        Self {
            is_valid: true,
            should_continue: true,
        }
    }

    /// Valid input that is intentionally not processed.
    pub const fn skip() -> Self {
        Self {
            is_valid: true,
            should_continue: false,
        }
    }

    pub const fn reject() -> Self {
        Self {
            is_valid: false,
            should_continue: false,
        }
    }
}

/// Facets extracted from the product image, already rendered as prompt-ready text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub labels: String,
    pub objects: String,
    pub colors: Vec<String>,
    pub detected_text: String,
    pub web_entities: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedDescription {
    pub source_text: String,
    pub translations: BTreeMap<String, String>,
}

/// Record written before generation finishes so readers can see the work is in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderRecord {
    pub product_id: String,
    pub image_url: String,
    pub product_type_key: String,
    pub product_name: String,
    pub languages: Vec<String>,
}

impl PlaceholderRecord {
    pub fn value(&self) -> Value {
        let mut value = Map::new();
        for language in &self.languages {
            value.insert(language.clone(), Value::Null);
        }
        value.insert("imageUrl".into(), json!(self.image_url));
        value.insert("productType".into(), json!(self.product_type_key));
        value.insert("productName".into(), json!(self.product_name));
        Value::Object(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionRecord {
    pub product_id: String,
    pub image_url: String,
    pub product_type_key: String,
    pub product_name: String,
    pub translations: BTreeMap<String, String>,
    pub generated_at: DateTime<Utc>,
}

impl DescriptionRecord {
    pub fn value(&self) -> Value {
        let mut value = Map::new();
        for (language, text) in &self.translations {
            value.insert(language.clone(), json!(text));
        }
        value.insert("imageUrl".into(), json!(self.image_url));
        value.insert("productType".into(), json!(self.product_type_key));
        value.insert("productName".into(), json!(self.product_name));
        value.insert("generatedAt".into(), json!(self.generated_at.to_rfc3339()));
        Value::Object(value)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentReport {
    pub product_id: String,
    pub description: EnrichedDescription,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Loose truthiness used for opt-in attributes: `false`, `0`, `""` and `null` are off.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
