use super::StoreError;
use crate::config::CommercetoolsSettings;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Tokens are refreshed this long before the platform says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Client-credentials token shared by every request of one client.
#[derive(Default)]
pub struct TokenCache {
    current: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub async fn bearer(
        &self,
        http: &Client,
        settings: &CommercetoolsSettings,
    ) -> Result<String, StoreError> {
        let mut guard = self.current.lock().await;
        if let Some(token) = guard.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.access_token.clone());
        }

        let fresh = request_token(http, settings).await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(
            target = "pixelphraser.store",
            expires_in = fresh.expires_in,
            "obtained access token"
        );
        let access_token = fresh.access_token.clone();
        *guard = Some(CachedToken {
            access_token: fresh.access_token,
            refresh_at: Instant::now() + lifetime,
        });
        Ok(access_token)
    }
}

async fn request_token(
    http: &Client,
    settings: &CommercetoolsSettings,
) -> Result<TokenResponse, StoreError> {
    let mut form = vec![("grant_type", "client_credentials")];
    if let Some(scope) = settings.scope.as_deref() {
        form.push(("scope", scope));
    }

    let response = http
        .post(format!("{}/oauth/token", settings.auth_url))
        .basic_auth(&settings.client_id, Some(&settings.client_secret))
        .form(&form)
        .send()
        .await
        .map_err(|err| StoreError::Auth(err.to_string()))?;

    if !response.status().is_success() {
        return Err(StoreError::Auth(format!("HTTP {}", response.status())));
    }

    response
        .json()
        .await
        .map_err(|err| StoreError::Auth(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commercetools::test_support::settings;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header_exists, method, path},
    };

    #[tokio::test]
    async fn token_is_requested_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-abc",
                "expires_in": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::default();
        let http = Client::new();
        let settings = settings(&server);
        assert_eq!(cache.bearer(&http, &settings).await.unwrap(), "token-abc");
        assert_eq!(cache.bearer(&http, &settings).await.unwrap(), "token-abc");
    }

    #[tokio::test]
    async fn rejected_credentials_surface_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = TokenCache::default()
            .bearer(&Client::new(), &settings(&server))
            .await
            .expect_err("unauthorized");
        assert!(matches!(err, StoreError::Auth(_)));
    }
}
