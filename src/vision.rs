//! Image analysis against the Cloud Vision `images:annotate` endpoint.

use crate::{
    config::{GoogleSettings, HttpSettings},
    correlation::CorrelationContext,
    http::build_client,
    models::ImageAnalysis,
    providers::ImageAnalyzer,
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const FEATURES: [&str; 6] = [
    "LABEL_DETECTION",
    "OBJECT_LOCALIZATION",
    "IMAGE_PROPERTIES",
    "TEXT_DETECTION",
    "SAFE_SEARCH_DETECTION",
    "WEB_DETECTION",
];

const NO_LABELS: &str = "No labels detected";
const NO_OBJECTS: &str = "No objects detected";
const NO_COLORS: &str = "No colors detected";
const NO_TEXT: &str = "No text detected";
const NO_WEB_ENTITIES: &str = "No web entities detected";

const MAX_COLORS: usize = 3;
const MAX_WEB_ENTITIES: usize = 5;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("service account unusable: {0}")]
    Credentials(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// Source of the bearer token sent with every annotate call.
#[async_trait]
pub trait AccessToken: Send + Sync {
    async fn access_token(&self) -> Result<String, VisionError>;
}

struct ServiceAccountToken(CustomServiceAccount);

#[async_trait]
impl AccessToken for ServiceAccountToken {
    async fn access_token(&self) -> Result<String, VisionError> {
        self.0
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map(|token| token.as_str().to_string())
            .map_err(|err| VisionError::Credentials(err.to_string()))
    }
}

#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn AccessToken>,
}

impl VisionClient {
    /// Builds a client from the base64-encoded service-account JSON in `settings`.
    pub fn new(settings: &GoogleSettings, http: &HttpSettings) -> Result<Self, VisionError> {
        let decoded = STANDARD
            .decode(settings.service_account_base64.trim())
            .map_err(|err| VisionError::Credentials(format!("invalid base64: {err}")))?;
        let json = String::from_utf8(decoded)
            .map_err(|err| VisionError::Credentials(format!("invalid utf-8: {err}")))?;
        let account = CustomServiceAccount::from_json(&json)
            .map_err(|err| VisionError::Credentials(err.to_string()))?;

        Ok(Self::with_token_source(
            &settings.vision_url,
            http,
            Arc::new(ServiceAccountToken(account)),
        ))
    }

    pub fn with_token_source(
        base_url: &str,
        http: &HttpSettings,
        tokens: Arc<dyn AccessToken>,
    ) -> Self {
        Self {
            http: build_client(http),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    async fn annotate(&self, image_url: &str) -> Result<AnnotateImageResponse, VisionError> {
        let token = self.tokens.access_token().await?;
        let body = BatchAnnotateRequest {
            requests: [AnnotateImageRequest {
                image: ImageRef {
                    source: ImageSource { image_uri: image_url },
                },
                features: FEATURES.map(|kind| Feature { kind }),
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/images:annotate", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| VisionError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(VisionError::Request(format!("HTTP {}", response.status())));
        }

        let payload: BatchAnnotateResponse = response
            .json()
            .await
            .map_err(|err| VisionError::Deserialize(err.to_string()))?;

        payload
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::Provider("empty annotation response".into()))
    }
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn analyze_image(
        &self,
        image_url: &str,
        ctx: &CorrelationContext,
    ) -> Result<ImageAnalysis, VisionError> {
        info!(
            target = "pixelphraser.vision",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            image_url,
            "sending image for analysis",
        );
        match self.annotate(image_url).await.and_then(summarize) {
            Ok(analysis) => {
                info!(
                    target = "pixelphraser.vision",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    "image analysis completed",
                );
                Ok(analysis)
            }
            Err(err) => {
                error!(
                    target = "pixelphraser.vision",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    error = %err,
                    "image analysis failed",
                );
                Err(err)
            }
        }
    }
}

/// Collapses one annotate response into the facets the description prompt uses.
pub fn summarize(response: AnnotateImageResponse) -> Result<ImageAnalysis, VisionError> {
    if let Some(status) = response.error {
        return Err(VisionError::Provider(format!(
            "{} (code {})",
            status.message, status.code
        )));
    }

    let labels = join_or(
        response.label_annotations.into_iter().map(|a| a.description),
        NO_LABELS,
    );
    let objects = join_or(
        response.localized_object_annotations.into_iter().map(|o| o.name),
        NO_OBJECTS,
    );

    let mut colors: Vec<String> = response
        .image_properties_annotation
        .and_then(|props| props.dominant_colors)
        .map(|dominant| dominant.colors)
        .unwrap_or_default()
        .into_iter()
        .take(MAX_COLORS)
        .map(|info| {
            let rgb = info.color;
            format!(
                "{}, {}, {}",
                rgb.red.round() as i64,
                rgb.green.round() as i64,
                rgb.blue.round() as i64
            )
        })
        .collect();
    if colors.is_empty() {
        colors.push(NO_COLORS.to_string());
    }

    let detected_text = response
        .text_annotations
        .into_iter()
        .next()
        .map(|a| a.description)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_TEXT.to_string());

    let web_entities = join_or(
        response
            .web_detection
            .map(|web| web.web_entities)
            .unwrap_or_default()
            .into_iter()
            .take(MAX_WEB_ENTITIES)
            .map(|entity| entity.description),
        NO_WEB_ENTITIES,
    );

    Ok(ImageAnalysis {
        labels,
        objects,
        colors,
        detected_text,
        web_entities,
    })
}

fn join_or(values: impl Iterator<Item = String>, placeholder: &str) -> String {
    let joined = values.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        placeholder.to_string()
    } else {
        joined
    }
}

#[derive(Serialize)]
struct BatchAnnotateRequest<'a> {
    requests: [AnnotateImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageRef<'a>,
    features: [Feature; 6],
}

#[derive(Serialize)]
struct ImageRef<'a> {
    source: ImageSource<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource<'a> {
    image_uri: &'a str,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    localized_object_annotations: Vec<LocalizedObject>,
    #[serde(default)]
    image_properties_annotation: Option<ImageProperties>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    web_detection: Option<WebDetection>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct LocalizedObject {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageProperties {
    #[serde(default)]
    dominant_colors: Option<DominantColors>,
}

#[derive(Debug, Deserialize)]
struct DominantColors {
    #[serde(default)]
    colors: Vec<ColorInfo>,
}

#[derive(Debug, Deserialize)]
struct ColorInfo {
    #[serde(default)]
    color: Rgb,
}

// Zero channels are omitted from the wire format.
#[derive(Debug, Default, Deserialize)]
struct Rgb {
    #[serde(default)]
    red: f64,
    #[serde(default)]
    green: f64,
    #[serde(default)]
    blue: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebDetection {
    #[serde(default)]
    web_entities: Vec<WebEntity>,
}

#[derive(Debug, Deserialize)]
struct WebEntity {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    struct StaticToken;

    #[async_trait]
    impl AccessToken for StaticToken {
        async fn access_token(&self) -> Result<String, VisionError> {
            Ok("vision-token".into())
        }
    }

    fn response(value: serde_json::Value) -> AnnotateImageResponse {
        serde_json::from_value(value).expect("annotate response")
    }

    #[test]
    fn empty_response_uses_placeholders() {
        let analysis = summarize(AnnotateImageResponse::default()).unwrap();
        assert_eq!(analysis.labels, "No labels detected");
        assert_eq!(analysis.objects, "No objects detected");
        assert_eq!(analysis.colors, vec!["No colors detected"]);
        assert_eq!(analysis.detected_text, "No text detected");
        assert_eq!(analysis.web_entities, "No web entities detected");
    }

    #[test]
    fn facets_are_trimmed_and_rounded() {
        let analysis = summarize(response(json!({
            "labelAnnotations": [{ "description": "Shirt" }, { "description": "Sleeve" }],
            "localizedObjectAnnotations": [{ "name": "Top" }],
            "imagePropertiesAnnotation": { "dominantColors": { "colors": [
                { "color": { "red": 240.4, "green": 239.6, "blue": 235 }, "score": 0.5 },
                { "color": { "red": 12 }, "score": 0.2 },
                { "color": { "red": 1, "green": 2, "blue": 3 } },
                { "color": { "red": 9, "green": 9, "blue": 9 } }
            ]}},
            "textAnnotations": [{ "description": "LINEN" }, { "description": "ignored" }],
            "webDetection": { "webEntities": [
                { "description": "a" }, { "description": "b" }, { "description": "c" },
                { "description": "d" }, { "description": "e" }, { "description": "f" }
            ]}
        })))
        .unwrap();

        assert_eq!(analysis.labels, "Shirt, Sleeve");
        assert_eq!(analysis.objects, "Top");
        assert_eq!(analysis.colors, vec!["240, 240, 235", "12, 0, 0", "1, 2, 3"]);
        assert_eq!(analysis.detected_text, "LINEN");
        assert_eq!(analysis.web_entities, "a, b, c, d, e");
    }

    #[test]
    fn provider_error_is_surfaced() {
        let err = summarize(response(json!({
            "error": { "code": 7, "message": "permission denied" }
        })))
        .expect_err("provider error");
        assert!(matches!(err, VisionError::Provider(ref msg) if msg.contains("permission denied")));
    }

    #[test]
    fn unusable_service_account_is_rejected() {
        let settings = GoogleSettings {
            service_account_base64: "not base64!".into(),
            generative_api_key: "key".into(),
            gemini_model: "model".into(),
            vision_url: "http://localhost".into(),
            generative_url: "http://localhost".into(),
        };
        let err = VisionClient::new(&settings, &HttpSettings::default())
            .err()
            .expect("invalid credentials");
        assert!(matches!(err, VisionError::Credentials(_)));
    }

    #[tokio::test]
    async fn annotates_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .and(header("authorization", "Bearer vision-token"))
            .and(body_partial_json(json!({
                "requests": [{ "image": { "source": { "imageUri": "https://img/1.jpg" } } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{ "labelAnnotations": [{ "description": "Shirt" }] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = VisionClient::with_token_source(
            &server.uri(),
            &HttpSettings::default(),
            Arc::new(StaticToken),
        );
        let analysis = client
            .analyze_image("https://img/1.jpg", &CorrelationContext::new())
            .await
            .expect("analysis");
        assert_eq!(analysis.labels, "Shirt");
        assert_eq!(analysis.objects, "No objects detected");
    }

    #[tokio::test]
    async fn http_failure_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = VisionClient::with_token_source(
            &server.uri(),
            &HttpSettings::default(),
            Arc::new(StaticToken),
        );
        let err = client
            .analyze_image("https://img/1.jpg", &CorrelationContext::new())
            .await
            .expect_err("forbidden");
        assert!(matches!(err, VisionError::Request(_)));
    }
}
