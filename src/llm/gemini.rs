use super::{LlmError, prompts};
use crate::{
    config::{GoogleSettings, HttpSettings},
    correlation::CorrelationContext,
    http::build_client,
    models::ImageAnalysis,
    providers::{DescriptionWriter, Translator},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl From<&GoogleSettings> for GeminiConfig {
    fn from(settings: &GoogleSettings) -> Self {
        Self {
            base_url: settings.generative_url.clone(),
            api_key: settings.generative_api_key.clone(),
            model: settings.gemini_model.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, http: &HttpSettings) -> Self {
        Self {
            http: build_client(http),
            config,
        }
    }

    /// Sends a single-turn prompt and returns the concatenated text parts of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.config.api_key.trim();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.config.base_url.trim_end_matches('/'),
                self.config.model
            ))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Http(err.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!("HTTP {}", response.status())));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| LlmError::InvalidResponse(err.without_url().to_string()))?;

        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("missing text".into()))?;

        Ok(text)
    }
}

#[async_trait]
impl DescriptionWriter for GeminiClient {
    async fn generate_description(
        &self,
        analysis: &ImageAnalysis,
        product_name: &str,
        product_type_key: &str,
        ctx: &CorrelationContext,
    ) -> Result<String, LlmError> {
        info!(
            target = "pixelphraser.llm",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            model = %self.config.model,
            "generating description",
        );
        let prompt = prompts::description_prompt(analysis, product_name, product_type_key);
        self.generate(&prompt).await.inspect_err(|err| {
            error!(
                target = "pixelphraser.llm",
                process_id = %ctx.process_id,
                message_id = %ctx.message_id,
                error = %err,
                "description generation failed",
            );
        })
    }
}

#[async_trait]
impl Translator for GeminiClient {
    async fn translate(
        &self,
        text: &str,
        languages: &[String],
        ctx: &CorrelationContext,
    ) -> Result<BTreeMap<String, String>, LlmError> {
        let mut translations = BTreeMap::new();
        for language in languages {
            info!(
                target = "pixelphraser.llm",
                process_id = %ctx.process_id,
                message_id = %ctx.message_id,
                language = %language,
                "translating description",
            );
            let translated = self
                .generate(&prompts::translation_prompt(text, language))
                .await
                .inspect_err(|err| {
                    error!(
                        target = "pixelphraser.llm",
                        process_id = %ctx.process_id,
                        message_id = %ctx.message_id,
                        language = %language,
                        error = %err,
                        "translation failed",
                    );
                })?;
            translations.insert(language.clone(), translated);
        }
        Ok(translations)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
