//! Creates (or recreates) the product subscription that feeds `/event`.

use eyre::{Result, WrapErr};
use pixelphraser_event::{
    commercetools::CommercetoolsClient,
    config::{CommercetoolsSettings, HttpSettings, SubscriptionSettings},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Post-deploy failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let commercetools = CommercetoolsSettings::from_env().wrap_err("commercetools settings")?;
    let subscription = SubscriptionSettings::from_env()?;
    let client = CommercetoolsClient::new(commercetools, &HttpSettings::default());

    client
        .ensure_product_subscription(
            &subscription.topic_name,
            &subscription.gcp_project_id,
            &subscription.event_triggers,
        )
        .await
        .wrap_err("creating product subscription")?;
    info!(
        target = "pixelphraser.deploy",
        topic = %subscription.topic_name,
        "post-deploy finished"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
