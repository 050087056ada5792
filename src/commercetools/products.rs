use super::{CommercetoolsClient, StoreError};
use crate::{
    correlation::CorrelationContext,
    models::{LocalizedString, ProductAttribute, ProductSnapshot},
    providers::ProductCatalog,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    id: String,
    #[serde(default)]
    product_type: Option<Reference>,
    #[serde(default)]
    master_data: Option<MasterData>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MasterData {
    #[serde(default)]
    current: Option<ProductData>,
    #[serde(default)]
    staged: Option<ProductData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductData {
    #[serde(default)]
    name: LocalizedString,
    #[serde(default)]
    master_variant: Option<Variant>,
}

#[derive(Debug, Default, Deserialize)]
struct Variant {
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    attributes: Vec<ProductAttribute>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ProductTypeResponse {
    #[serde(default)]
    key: Option<String>,
}

impl From<ProductResponse> for ProductSnapshot {
    fn from(product: ProductResponse) -> Self {
        let (current, staged) = match product.master_data {
            Some(data) => (data.current, data.staged),
            None => (None, None),
        };
        let (name, image_url) = match current {
            Some(current) => {
                let image_url = current
                    .master_variant
                    .and_then(|variant| variant.images.into_iter().next())
                    .map(|image| image.url);
                (current.name, image_url)
            }
            None => (LocalizedString::default(), None),
        };
        let staged_attributes = staged
            .and_then(|staged| staged.master_variant)
            .map(|variant| variant.attributes)
            .unwrap_or_default();

        ProductSnapshot {
            id: product.id,
            product_type_id: product.product_type.map(|reference| reference.id),
            name,
            image_url,
            staged_attributes,
        }
    }
}

#[async_trait]
impl ProductCatalog for CommercetoolsClient {
    async fn fetch_product_by_id(
        &self,
        product_id: &str,
        ctx: &CorrelationContext,
    ) -> Result<ProductSnapshot, StoreError> {
        info!(
            target = "pixelphraser.store",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            product_id,
            "fetching product",
        );
        let path = format!("products/{}", urlencoding::encode(product_id));
        let result = self
            .get_json::<ProductResponse>(&path)
            .await
            .and_then(|found| {
                found.ok_or_else(|| StoreError::NotFound {
                    resource: "product".into(),
                    key: product_id.to_string(),
                })
            });
        match result {
            Ok(product) => {
                info!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    product_id,
                    "product fetched",
                );
                Ok(product.into())
            }
            Err(err) => {
                error!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    product_id,
                    error = %err,
                    "failed to fetch product",
                );
                Err(err)
            }
        }
    }

    async fn fetch_product_type_key(
        &self,
        product_type_id: &str,
        ctx: &CorrelationContext,
    ) -> Result<String, StoreError> {
        info!(
            target = "pixelphraser.store",
            process_id = %ctx.process_id,
            message_id = %ctx.message_id,
            product_type_id,
            "fetching product type",
        );
        let path = format!("product-types/{}", urlencoding::encode(product_type_id));
        let result = self
            .get_json::<ProductTypeResponse>(&path)
            .await
            .and_then(|found| {
                found.ok_or_else(|| StoreError::NotFound {
                    resource: "product type".into(),
                    key: product_type_id.to_string(),
                })
            });
        match result {
            Ok(product_type) => {
                let key = product_type.key.unwrap_or_default();
                info!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    product_type_key = %key,
                    "product type fetched",
                );
                Ok(key)
            }
            Err(err) => {
                error!(
                    target = "pixelphraser.store",
                    process_id = %ctx.process_id,
                    message_id = %ctx.message_id,
                    product_type_id,
                    error = %err,
                    "failed to fetch product type",
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commercetools::test_support::{PROJECT, client, server_with_token};
    use serde_json::json;
    use wiremock::{
        Mock, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn product_body() -> serde_json::Value {
        json!({
            "id": "p-1",
            "version": 3,
            "productType": { "typeId": "product-type", "id": "type-1" },
            "masterData": {
                "current": {
                    "name": { "en-US": "Linen Shirt", "de": "Leinenhemd" },
                    "masterVariant": {
                        "id": 1,
                        "images": [
                            { "url": "https://img/1.jpg", "dimensions": { "w": 800, "h": 600 } },
                            { "url": "https://img/2.jpg" }
                        ],
                        "attributes": []
                    }
                },
                "staged": {
                    "name": { "en-US": "Linen Shirt" },
                    "masterVariant": {
                        "id": 1,
                        "attributes": [
                            { "name": "generateDescription", "value": true }
                        ]
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn fetches_and_maps_product() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/products/p-1")))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(product_body()))
            .expect(1)
            .mount(&server)
            .await;

        let product = client(&server)
            .fetch_product_by_id("p-1", &CorrelationContext::new())
            .await
            .expect("product");

        assert_eq!(product.product_type_id(), Some("type-1"));
        assert_eq!(product.product_name(), Some("Linen Shirt"));
        assert_eq!(product.image_url(), Some("https://img/1.jpg"));
        assert!(product.attribute("generateDescription").unwrap().is_enabled());
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/products/missing")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_product_by_id("missing", &CorrelationContext::new())
            .await
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn product_id_stays_in_one_path_segment() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/products/..%2Fproduct-types%2Ftype-1%3Fx")))
            .respond_with(ResponseTemplate::new(200).set_body_json(product_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/product-types/type-1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "type-1" })))
            .expect(0)
            .mount(&server)
            .await;

        client(&server)
            .fetch_product_by_id("../product-types/type-1?x", &CorrelationContext::new())
            .await
            .expect("product");
    }

    #[tokio::test]
    async fn product_type_without_key_is_empty() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/product-types/type-1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "type-1" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/product-types/type-2")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "type-2", "key": "shirts" })),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let ctx = CorrelationContext::new();
        assert_eq!(client.fetch_product_type_key("type-1", &ctx).await.unwrap(), "");
        assert_eq!(
            client.fetch_product_type_key("type-2", &ctx).await.unwrap(),
            "shirts"
        );
    }

    #[tokio::test]
    async fn server_error_is_request_error() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path(format!("/{PROJECT}/product-types/type-1")))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_product_type_key("type-1", &CorrelationContext::new())
            .await
            .expect_err("bad gateway");
        assert!(matches!(err, StoreError::Request(_)));
    }
}
