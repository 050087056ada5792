use super::{CommercetoolsClient, StoreError};
use crate::{
    correlation::CorrelationContext,
    models::{DescriptionRecord, PlaceholderRecord},
    providers::{DescriptionRecords, LanguageSelection},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

pub const CUSTOM_OBJECT_CONTAINER: &str = "temporaryDescription";
pub const SELECTED_LANGUAGES_CONTAINER: &str = "selectedLanguages";
pub const SELECTED_LANGUAGES_KEY: &str = "pixelphraser";

#[derive(Debug, Deserialize)]
struct CustomObject {
    version: i64,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Serialize)]
struct CustomObjectDraft<'a> {
    container: &'a str,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
    value: Value,
}

/// Accepts `["de", "fr"]` or `{ "de": "de", "fr": "fr" }`; anything else yields no languages.
pub fn normalize_languages(value: &Value) -> Vec<String> {
    let codes: Box<dyn Iterator<Item = &Value>> = match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => return Vec::new(),
    };
    codes
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

impl CommercetoolsClient {
    async fn fetch_custom_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<CustomObject, StoreError> {
        let path = format!(
            "custom-objects/{}/{}",
            urlencoding::encode(container),
            urlencoding::encode(key)
        );
        self.get_json::<CustomObject>(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                resource: format!("custom object in `{container}`"),
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl LanguageSelection for CommercetoolsClient {
    async fn fetch_selected_languages(
        &self,
        ctx: &CorrelationContext,
    ) -> Result<Vec<String>, StoreError> {
        info!(
            target = "pixelphraser.store",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            "fetching languages for translation",
        );
        match self
            .fetch_custom_object(SELECTED_LANGUAGES_CONTAINER, SELECTED_LANGUAGES_KEY)
            .await
        {
            Ok(object) => {
                let languages = normalize_languages(&object.value);
                info!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    languages = ?languages,
                    "languages fetched",
                );
                Ok(languages)
            }
            Err(err) => {
                error!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    error = %err,
                    "failed to fetch languages",
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl DescriptionRecords for CommercetoolsClient {
    async fn create_placeholder_record(
        &self,
        record: &PlaceholderRecord,
        ctx: &CorrelationContext,
    ) -> Result<(), StoreError> {
        info!(
            target = "pixelphraser.store",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            key = %record.product_id,
            "creating custom object",
        );
        let draft = CustomObjectDraft {
            container: CUSTOM_OBJECT_CONTAINER,
            key: &record.product_id,
            version: None,
            value: record.value(),
        };
        match self.post_json("custom-objects", &draft).await {
            Ok(()) => {
                info!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    key = %record.product_id,
                    "custom object created",
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    key = %record.product_id,
                    error = %err,
                    "failed to create custom object",
                );
                Err(err)
            }
        }
    }

    async fn update_record_with_translations(
        &self,
        record: &DescriptionRecord,
        ctx: &CorrelationContext,
    ) -> Result<(), StoreError> {
        info!(
            target = "pixelphraser.store",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            key = %record.product_id,
            "updating custom object",
        );
        let result = async {
            let existing = self
                .fetch_custom_object(CUSTOM_OBJECT_CONTAINER, &record.product_id)
                .await?;
            let draft = CustomObjectDraft {
                container: CUSTOM_OBJECT_CONTAINER,
                key: &record.product_id,
                version: Some(existing.version),
                value: record.value(),
            };
            self.post_json("custom-objects", &draft).await
        }
        .await;

        match result {
            Ok(()) => {
                info!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    key = %record.product_id,
                    "custom object updated",
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    key = %record.product_id,
                    error = %err,
                    "failed to update custom object",
                );
                Err(err)
            }
        }
    }
}
