use crate::{
    correlation::CorrelationContext,
    models::{EnrichedDescription, EnrichmentReport, ProductSnapshot, StageReport},
    providers::Providers,
};
use serde_json::Value;
use std::{future::Future, time::Instant};
use thiserror::Error;

/// Sequential enrichment: product type → vision → description → languages → translation →
/// placeholder record → final record. Each stage feeds the next; the first failure aborts the
/// rest and nothing already written is rolled back.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    providers: Providers,
}

/// The product fields the pipeline needs, extracted once the gates have passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub product_id: String,
    pub product_type_id: String,
    pub product_name: String,
    pub image_url: String,
}

impl EnrichmentRequest {
    pub fn from_snapshot(product: &ProductSnapshot) -> Result<Self, PipelineError> {
        let missing = |field: &str| PipelineError::invalid_input("product_data", format!("missing_{field}"));
        Ok(Self {
            product_id: product.id.clone(),
            product_type_id: product
                .product_type_id()
                .ok_or_else(|| missing("product_type"))?
                .to_string(),
            product_name: product
                .product_name()
                .ok_or_else(|| missing("product_name"))?
                .to_string(),
            image_url: product
                .image_url()
                .ok_or_else(|| missing("image_url"))?
                .to_string(),
        })
    }
}

impl EnrichmentPipeline {
    pub fn new(providers: Providers) -> Self {
        Self { providers }
    }

    pub async fn run(
        &self,
        request: &EnrichmentRequest,
        ctx: &CorrelationContext,
    ) -> Result<EnrichmentReport, PipelineError> {
        let mut stages = Vec::new();
        let providers = &self.providers;

        let product_type_key = self
            .capture_stage(
                "product_type",
                &mut stages,
                stages::product_type_key(providers, &request.product_type_id, ctx),
            )
            .await?;

        let analysis = self
            .capture_stage(
                "analyze_image",
                &mut stages,
                stages::analyze_image(providers, &request.image_url, ctx),
            )
            .await?;

        let description = self
            .capture_stage(
                "generate_description",
                &mut stages,
                stages::generate_description(
                    providers,
                    &analysis,
                    &request.product_name,
                    &product_type_key,
                    ctx,
                ),
            )
            .await?;

        let languages = self
            .capture_stage(
                "selected_languages",
                &mut stages,
                stages::selected_languages(providers, ctx),
            )
            .await?;

        let translations = self
            .capture_stage(
                "translate",
                &mut stages,
                stages::translate(providers, &description, &languages, ctx),
            )
            .await?;

        self.capture_stage(
            "create_placeholder",
            &mut stages,
            stages::create_placeholder(providers, request, &product_type_key, &languages, ctx),
        )
        .await?;

        self.capture_stage(
            "update_record",
            &mut stages,
            stages::update_record(providers, request, &product_type_key, &translations, ctx),
        )
        .await?;

        Ok(EnrichmentReport {
            product_id: request.product_id.clone(),
            description: EnrichedDescription {
                source_text: description,
                translations,
            },
            stages,
        })
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

pub(crate) mod stages {
    use super::*;
    use crate::models::{DescriptionRecord, ImageAnalysis, PlaceholderRecord};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tracing::info;

    pub(super) async fn product_type_key(
        providers: &Providers,
        product_type_id: &str,
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<String>, PipelineError> {
        let key = providers
            .catalog
            .fetch_product_type_key(product_type_id, ctx)
            .await
            .map_err(|err| PipelineError::internal("product_type", err.to_string()))?;
        Ok(StageOutcome::new(
            key.clone(),
            json!({ "product_type_id": product_type_id, "key": key }),
        ))
    }

    pub(super) async fn analyze_image(
        providers: &Providers,
        image_url: &str,
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<ImageAnalysis>, PipelineError> {
        let analysis = providers
            .vision
            .analyze_image(image_url, ctx)
            .await
            .map_err(|err| PipelineError::internal("analyze_image", err.to_string()))?;
        let output = json!({
            "image_url": image_url,
            "labels": analysis.labels,
            "colors": analysis.colors.len(),
        });
        Ok(StageOutcome::new(analysis, output))
    }

    pub(super) async fn generate_description(
        providers: &Providers,
        analysis: &ImageAnalysis,
        product_name: &str,
        product_type_key: &str,
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<String>, PipelineError> {
        let text = providers
            .writer
            .generate_description(analysis, product_name, product_type_key, ctx)
            .await
            .map_err(|err| PipelineError::internal("generate_description", err.to_string()))?;
        let chars = text.chars().count();
        Ok(StageOutcome::new(text, json!({ "chars": chars })))
    }

    pub(super) async fn selected_languages(
        providers: &Providers,
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<Vec<String>>, PipelineError> {
        let languages = providers
            .languages
            .fetch_selected_languages(ctx)
            .await
            .map_err(|err| PipelineError::internal("selected_languages", err.to_string()))?;
        let output = json!({ "languages": languages });
        Ok(StageOutcome::new(languages, output))
    }

    pub(super) async fn translate(
        providers: &Providers,
        text: &str,
        languages: &[String],
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<BTreeMap<String, String>>, PipelineError> {
        let translations = providers
            .translator
            .translate(text, languages, ctx)
            .await
            .map_err(|err| PipelineError::internal("translate", err.to_string()))?;
        let output = json!({ "languages": translations.keys().collect::<Vec<_>>() });
        Ok(StageOutcome::new(translations, output))
    }

    pub(super) async fn create_placeholder(
        providers: &Providers,
        request: &EnrichmentRequest,
        product_type_key: &str,
        languages: &[String],
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<()>, PipelineError> {
        let record = PlaceholderRecord {
            product_id: request.product_id.clone(),
            image_url: request.image_url.clone(),
            product_type_key: product_type_key.to_string(),
            product_name: request.product_name.clone(),
            languages: languages.to_vec(),
        };
        providers
            .records
            .create_placeholder_record(&record, ctx)
            .await
            .map_err(|err| PipelineError::internal("create_placeholder", err.to_string()))?;
        Ok(StageOutcome::new((), json!({ "key": record.product_id })))
    }

    pub(super) async fn update_record(
        providers: &Providers,
        request: &EnrichmentRequest,
        product_type_key: &str,
        translations: &BTreeMap<String, String>,
        ctx: &CorrelationContext,
    ) -> Result<StageOutcome<()>, PipelineError> {
        let record = DescriptionRecord {
            product_id: request.product_id.clone(),
            image_url: request.image_url.clone(),
            product_type_key: product_type_key.to_string(),
            product_name: request.product_name.clone(),
            translations: translations.clone(),
            generated_at: Utc::now(),
        };
        providers
            .records
            .update_record_with_translations(&record, ctx)
            .await
            .map_err(|err| PipelineError::internal("update_record", err.to_string()))?;
        info!(
            target = "pixelphraser.pipeline",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            product_id = %record.product_id,
            "processing completed",
        );
        Ok(StageOutcome::new(
            (),
            json!({ "key": record.product_id, "generated_at": record.generated_at }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocalizedString, ProductAttribute};
    use crate::testing::{Call, FakeWorld};
    use serde_json::json;

    fn sample_request() -> EnrichmentRequest {
        EnrichmentRequest {
            product_id: "p-1".into(),
            product_type_id: "type-1".into(),
            product_name: "Linen Shirt".into(),
            image_url: "https://img/1.jpg".into(),
        }
    }

    #[test]
    fn request_from_complete_snapshot() {
        let snapshot = ProductSnapshot {
            id: "p-1".into(),
            product_type_id: Some("type-1".into()),
            name: LocalizedString::from_pairs([("en-US", "Linen Shirt"), ("de", "Leinenhemd")]),
            image_url: Some("https://img/1.jpg".into()),
            staged_attributes: vec![ProductAttribute::new("generateDescription", json!(true))],
        };
        assert_eq!(
            EnrichmentRequest::from_snapshot(&snapshot).expect("request"),
            sample_request()
        );
    }

    #[test]
    fn request_from_incomplete_snapshot_is_invalid_input() {
        let snapshot = ProductSnapshot {
            id: "p-1".into(),
            ..ProductSnapshot::default()
        };
        let err = EnrichmentRequest::from_snapshot(&snapshot).expect_err("incomplete");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
        assert_eq!(err.stage(), "product_data");
    }

    #[tokio::test]
    async fn pipeline_run_stage_sequence() {
        let world = FakeWorld::new();
        let pipeline = EnrichmentPipeline::new(world.providers());
        let ctx = CorrelationContext::new().with_message_id("msg-1");

        let report = pipeline.run(&sample_request(), &ctx).await.expect("run");

        let names: Vec<_> = report.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "product_type",
                "analyze_image",
                "generate_description",
                "selected_languages",
                "translate",
                "create_placeholder",
                "update_record",
            ]
        );
        assert_eq!(
            world.calls(),
            vec![
                Call::ProductType,
                Call::AnalyzeImage,
                Call::GenerateDescription,
                Call::SelectedLanguages,
                Call::Translate,
                Call::CreatePlaceholder,
                Call::UpdateRecord,
            ]
        );
        assert_eq!(report.description.translations.len(), 2);
        assert_eq!(report.description.translations["de"], "[de] generated for Linen Shirt");
    }

    #[tokio::test]
    async fn final_record_replaces_placeholders() {
        let world = FakeWorld::new();
        let pipeline = EnrichmentPipeline::new(world.providers());
        pipeline
            .run(&sample_request(), &CorrelationContext::new())
            .await
            .expect("run");

        let record = world.record("p-1").expect("record");
        assert_eq!(record["de"], json!("[de] generated for Linen Shirt"));
        assert_eq!(record["fr"], json!("[fr] generated for Linen Shirt"));
        assert_eq!(record["productType"], json!("shirts"));
        assert!(record["generatedAt"].is_string());
    }

    #[tokio::test]
    async fn failing_stage_aborts_remaining_stages() {
        let world = FakeWorld::new();
        world.fail_on(Call::GenerateDescription);
        let pipeline = EnrichmentPipeline::new(world.providers());

        let err = pipeline
            .run(&sample_request(), &CorrelationContext::new())
            .await
            .expect_err("should fail");

        assert_eq!(err.stage(), "generate_description");
        assert_eq!(err.kind(), PipelineErrorKind::Internal);
        assert_eq!(
            world.calls(),
            vec![Call::ProductType, Call::AnalyzeImage, Call::GenerateDescription]
        );
        assert!(world.record("p-1").is_none());
    }

    #[tokio::test]
    async fn failed_update_leaves_placeholder_pending() {
        let world = FakeWorld::new();
        world.fail_on(Call::UpdateRecord);
        let pipeline = EnrichmentPipeline::new(world.providers());

        let err = pipeline
            .run(&sample_request(), &CorrelationContext::new())
            .await
            .expect_err("should fail");

        assert_eq!(err.stage(), "update_record");
        let record = world.record("p-1").expect("placeholder");
        assert_eq!(record["de"], serde_json::Value::Null);
        assert!(record.get("generatedAt").is_none());
    }
}
