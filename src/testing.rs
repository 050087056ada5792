//! In-memory collaborators shared by the unit tests.

use crate::{
    commercetools::{CUSTOM_OBJECT_CONTAINER, StoreError},
    correlation::CorrelationContext,
    llm::LlmError,
    models::{
        DescriptionRecord, ImageAnalysis, LocalizedString, PlaceholderRecord, ProductAttribute,
        ProductSnapshot,
    },
    providers::{
        DescriptionRecords, DescriptionWriter, ImageAnalyzer, LanguageSelection, ProductCatalog,
        Providers, Translator,
    },
    vision::VisionError,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    FetchProduct,
    ProductType,
    AnalyzeImage,
    GenerateDescription,
    SelectedLanguages,
    Translate,
    CreatePlaceholder,
    UpdateRecord,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<Option<Call>>,
    panicking: Mutex<Option<Call>>,
    products: Mutex<HashMap<String, ProductSnapshot>>,
    records: Mutex<HashMap<String, Value>>,
    vision_hold: Mutex<Option<Arc<Semaphore>>>,
}

#[derive(Clone, Default)]
pub struct FakeWorld {
    inner: Arc<Inner>,
}

impl FakeWorld {
    pub fn new() -> Self {
        let world = Self::default();
        world.put_product(complete_product("p-1"));
        world
    }

    pub fn providers(&self) -> Providers {
        let shared = Arc::new(self.clone());
        Providers {
            catalog: shared.clone(),
            languages: shared.clone(),
            records: shared.clone(),
            vision: shared.clone(),
            writer: shared.clone(),
            translator: shared,
        }
    }

    pub fn put_product(&self, product: ProductSnapshot) {
        self.inner
            .products
            .lock()
            .unwrap()
            .insert(product.id.clone(), product);
    }

    pub fn fail_on(&self, call: Call) {
        *self.inner.failing.lock().unwrap() = Some(call);
    }

    pub fn panic_on(&self, call: Call) {
        *self.inner.panicking.lock().unwrap() = Some(call);
    }

    /// Blocks image analysis until the returned semaphore receives a permit.
    pub fn hold_vision(&self) -> Arc<Semaphore> {
        let hold = Arc::new(Semaphore::new(0));
        *self.inner.vision_hold.lock().unwrap() = Some(hold.clone());
        hold
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn record(&self, key: &str) -> Option<Value> {
        self.inner.records.lock().unwrap().get(key).cloned()
    }

    fn enter(&self, call: Call) -> bool {
        self.inner.calls.lock().unwrap().push(call);
        let panics = *self.inner.panicking.lock().unwrap() == Some(call);
        if panics {
            panic!("{call:?} panicked");
        }
        *self.inner.failing.lock().unwrap() == Some(call)
    }
}

pub fn complete_product(id: &str) -> ProductSnapshot {
    ProductSnapshot {
        id: id.to_string(),
        product_type_id: Some("type-1".into()),
        name: LocalizedString::from_pairs([("en", "Linen Shirt"), ("de", "Leinenhemd")]),
        image_url: Some("https://img/1.jpg".into()),
        staged_attributes: vec![
            ProductAttribute::new("color", json!("white")),
            ProductAttribute::new("generateDescription", json!(true)),
        ],
    }
}

#[async_trait]
impl ProductCatalog for FakeWorld {
    async fn fetch_product_by_id(
        &self,
        product_id: &str,
        _ctx: &CorrelationContext,
    ) -> Result<ProductSnapshot, StoreError> {
        if self.enter(Call::FetchProduct) {
            return Err(StoreError::Request("product lookup failed".into()));
        }
        self.inner
            .products
            .lock()
            .unwrap()
            .get(product_id)
            .cloned()
            .ok_or_else(|| StoreError::Request(format!("HTTP 404 for product {product_id}")))
    }

    async fn fetch_product_type_key(
        &self,
        _product_type_id: &str,
        _ctx: &CorrelationContext,
    ) -> Result<String, StoreError> {
        if self.enter(Call::ProductType) {
            return Err(StoreError::Request("product type lookup failed".into()));
        }
        Ok("shirts".into())
    }
}

#[async_trait]
impl LanguageSelection for FakeWorld {
    async fn fetch_selected_languages(
        &self,
        _ctx: &CorrelationContext,
    ) -> Result<Vec<String>, StoreError> {
        if self.enter(Call::SelectedLanguages) {
            return Err(StoreError::Request("languages lookup failed".into()));
        }
        Ok(vec!["de".into(), "fr".into()])
    }
}

#[async_trait]
impl DescriptionRecords for FakeWorld {
    async fn create_placeholder_record(
        &self,
        record: &PlaceholderRecord,
        _ctx: &CorrelationContext,
    ) -> Result<(), StoreError> {
        if self.enter(Call::CreatePlaceholder) {
            return Err(StoreError::Request("create failed".into()));
        }
        self.inner
            .records
            .lock()
            .unwrap()
            .insert(record.product_id.clone(), record.value());
        Ok(())
    }

    async fn update_record_with_translations(
        &self,
        record: &DescriptionRecord,
        _ctx: &CorrelationContext,
    ) -> Result<(), StoreError> {
        if self.enter(Call::UpdateRecord) {
            return Err(StoreError::Request("update failed".into()));
        }
        let mut records = self.inner.records.lock().unwrap();
        let Some(existing) = records.get_mut(&record.product_id) else {
            return Err(StoreError::NotFound {
                resource: CUSTOM_OBJECT_CONTAINER.to_string(),
                key: record.product_id.clone(),
            });
        };
        *existing = record.value();
        Ok(())
    }
}

#[async_trait]
impl ImageAnalyzer for FakeWorld {
    async fn analyze_image(
        &self,
        _image_url: &str,
        _ctx: &CorrelationContext,
    ) -> Result<ImageAnalysis, VisionError> {
        let hold = self.inner.vision_hold.lock().unwrap().clone();
        if let Some(hold) = hold {
            let _permit = hold.acquire().await;
        }
        if self.enter(Call::AnalyzeImage) {
            return Err(VisionError::Request("vision unavailable".into()));
        }
        Ok(ImageAnalysis {
            labels: "Shirt, Sleeve".into(),
            objects: "Shirt".into(),
            colors: vec!["240, 240, 235".into()],
            detected_text: "No text detected".into(),
            web_entities: "Linen".into(),
        })
    }
}

#[async_trait]
impl DescriptionWriter for FakeWorld {
    async fn generate_description(
        &self,
        _analysis: &ImageAnalysis,
        product_name: &str,
        _product_type_key: &str,
        _ctx: &CorrelationContext,
    ) -> Result<String, LlmError> {
        if self.enter(Call::GenerateDescription) {
            return Err(LlmError::Http("HTTP 503".into()));
        }
        Ok(format!("generated for {product_name}"))
    }
}

#[async_trait]
impl Translator for FakeWorld {
    async fn translate(
        &self,
        text: &str,
        languages: &[String],
        _ctx: &CorrelationContext,
    ) -> Result<BTreeMap<String, String>, LlmError> {
        if self.enter(Call::Translate) {
            return Err(LlmError::Http("HTTP 503".into()));
        }
        Ok(languages
            .iter()
            .map(|language| (language.clone(), format!("[{language}] {text}")))
            .collect())
    }
}
