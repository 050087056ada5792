//! Removes the product subscription before the service is torn down.

use eyre::{Result, WrapErr};
use pixelphraser_event::{
    commercetools::CommercetoolsClient,
    config::{CommercetoolsSettings, HttpSettings},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Pre-undeploy failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = CommercetoolsSettings::from_env().wrap_err("commercetools settings")?;
    let client = CommercetoolsClient::new(settings, &HttpSettings::default());

    let deleted = client
        .delete_product_subscription()
        .await
        .wrap_err("deleting product subscription")?;
    info!(target = "pixelphraser.deploy", deleted, "pre-undeploy finished");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
