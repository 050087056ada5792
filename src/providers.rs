//! Contracts the enrichment flow needs from the outside world.
//!
//! The production implementations live in `commercetools`, `vision` and `llm`; tests swap in
//! in-memory fakes.

use crate::{
    commercetools::StoreError,
    correlation::CorrelationContext,
    llm::LlmError,
    models::{DescriptionRecord, ImageAnalysis, PlaceholderRecord, ProductSnapshot},
    vision::VisionError,
};
use async_trait::async_trait;
use std::{collections::BTreeMap, sync::Arc};

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn fetch_product_by_id(
        &self,
        product_id: &str,
        ctx: &CorrelationContext,
    ) -> Result<ProductSnapshot, StoreError>;

    /// Empty string when the product type has no key.
    async fn fetch_product_type_key(
        &self,
        product_type_id: &str,
        ctx: &CorrelationContext,
    ) -> Result<String, StoreError>;
}

#[async_trait]
pub trait LanguageSelection: Send + Sync {
    async fn fetch_selected_languages(
        &self,
        ctx: &CorrelationContext,
    ) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait DescriptionRecords: Send + Sync {
    async fn create_placeholder_record(
        &self,
        record: &PlaceholderRecord,
        ctx: &CorrelationContext,
    ) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when no placeholder exists for the product.
    async fn update_record_with_translations(
        &self,
        record: &DescriptionRecord,
        ctx: &CorrelationContext,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze_image(
        &self,
        image_url: &str,
        ctx: &CorrelationContext,
    ) -> Result<ImageAnalysis, VisionError>;
}

#[async_trait]
pub trait DescriptionWriter: Send + Sync {
    async fn generate_description(
        &self,
        analysis: &ImageAnalysis,
        product_name: &str,
        product_type_key: &str,
        ctx: &CorrelationContext,
    ) -> Result<String, LlmError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        languages: &[String],
        ctx: &CorrelationContext,
    ) -> Result<BTreeMap<String, String>, LlmError>;
}

/// Everything the dispatcher and pipeline call out to, bundled for cheap cloning.
#[derive(Clone)]
pub struct Providers {
    pub catalog: Arc<dyn ProductCatalog>,
    pub languages: Arc<dyn LanguageSelection>,
    pub records: Arc<dyn DescriptionRecords>,
    pub vision: Arc<dyn ImageAnalyzer>,
    pub writer: Arc<dyn DescriptionWriter>,
    pub translator: Arc<dyn Translator>,
}
