//! Client for the commerce platform: products, product types, custom objects and subscriptions.

pub mod auth;
pub mod custom_objects;
pub mod products;
pub mod subscriptions;

use crate::{
    config::{CommercetoolsSettings, HttpSettings},
    http::build_client,
};
use auth::TokenCache;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;

pub use custom_objects::{
    CUSTOM_OBJECT_CONTAINER, SELECTED_LANGUAGES_CONTAINER, SELECTED_LANGUAGES_KEY,
};
pub use subscriptions::SUBSCRIPTION_KEY;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token request failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
    #[error("{resource} not found with key `{key}`")]
    NotFound { resource: String, key: String },
}

#[derive(Clone)]
pub struct CommercetoolsClient {
    http: Client,
    settings: Arc<CommercetoolsSettings>,
    tokens: Arc<TokenCache>,
}

impl CommercetoolsClient {
    pub fn new(settings: CommercetoolsSettings, http: &HttpSettings) -> Self {
        Self {
            http: build_client(http),
            settings: Arc::new(settings),
            tokens: Arc::new(TokenCache::default()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.api_url,
            self.settings.project_key,
            path.trim_start_matches('/')
        )
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let token = self.tokens.bearer(&self.http, &self.settings).await?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    /// `Ok(None)` when the resource does not exist.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let response = self
            .request(Method::GET, path)
            .await?
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Request(format!("HTTP {}", response.status())));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|err| StoreError::Deserialize(err.to_string()))
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), StoreError> {
        let response = self
            .request(Method::POST, path)
            .await?
            .json(body)
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!("HTTP {}", response.status())));
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, path)
            .await?
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}
