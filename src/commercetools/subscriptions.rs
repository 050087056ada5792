use super::{CommercetoolsClient, StoreError};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const SUBSCRIPTION_KEY: &str = "productCreatedSubscription";

#[derive(Debug, Deserialize)]
struct SubscriptionPage {
    #[serde(default)]
    results: Vec<SubscriptionSummary>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionSummary {
    version: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PubSubDestination<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    topic: &'a str,
    project_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageSubscription<'a> {
    resource_type_id: &'static str,
    types: &'a [String],
}

#[derive(Debug, Serialize)]
struct SubscriptionDraft<'a> {
    key: &'static str,
    destination: PubSubDestination<'a>,
    messages: [MessageSubscription<'a>; 1],
}

impl CommercetoolsClient {
    /// Removes the product subscription if one exists. Returns whether anything was deleted.
    pub async fn delete_product_subscription(&self) -> Result<bool, StoreError> {
        let key_filter = format!("key = \"{SUBSCRIPTION_KEY}\"");
        let filter = urlencoding::encode(&key_filter);
        let page = self
            .get_json::<SubscriptionPage>(&format!("subscriptions?where={filter}"))
            .await?
            .unwrap_or(SubscriptionPage { results: Vec::new() });

        let Some(existing) = page.results.first() else {
            info!(
                target = "pixelphraser.deploy",
                key = SUBSCRIPTION_KEY,
                "no subscription to delete"
            );
            return Ok(false);
        };

        self.delete(&format!(
            "subscriptions/key={SUBSCRIPTION_KEY}?version={}",
            existing.version
        ))
        .await?;
        info!(
            target = "pixelphraser.deploy",
            key = SUBSCRIPTION_KEY,
            version = existing.version,
            "subscription deleted"
        );
        Ok(true)
    }

    /// Replaces the product subscription with one that publishes `event_types` to the topic.
    pub async fn ensure_product_subscription(
        &self,
        topic: &str,
        gcp_project_id: &str,
        event_types: &[String],
    ) -> Result<(), StoreError> {
        self.delete_product_subscription().await?;

        let draft = SubscriptionDraft {
            key: SUBSCRIPTION_KEY,
            destination: PubSubDestination {
                kind: "GoogleCloudPubSub",
                topic,
                project_id: gcp_project_id,
            },
            messages: [MessageSubscription {
                resource_type_id: "product",
                types: event_types,
            }],
        };
        self.post_json("subscriptions", &draft).await?;
        info!(
            target = "pixelphraser.deploy",
            key = SUBSCRIPTION_KEY,
            topic,
            event_types = ?event_types,
            "subscription created"
        );
        Ok(())
    }
}
