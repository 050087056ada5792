use eyre::{Result, WrapErr};
use metrics_exporter_prometheus::PrometheusBuilder;
use pixelphraser_event::{
    AppState, Config, build_router,
    commercetools::CommercetoolsClient,
    jobs::EnrichmentJobs,
    llm::{GeminiClient, gemini::GeminiConfig},
    pipeline::EnrichmentPipeline,
    providers::Providers,
    vision::VisionClient,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        error!(target = "pixelphraser.api", "server crashed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env().wrap_err("invalid configuration")?;

    let commercetools = Arc::new(CommercetoolsClient::new(
        config.commercetools.clone(),
        &config.http,
    ));
    let vision = Arc::new(
        VisionClient::new(&config.google, &config.http).wrap_err("vision client")?,
    );
    let gemini = Arc::new(GeminiClient::new(
        GeminiConfig::from(&config.google),
        &config.http,
    ));
    let providers = Providers {
        catalog: commercetools.clone(),
        languages: commercetools.clone(),
        records: commercetools.clone(),
        vision,
        writer: gemini.clone(),
        translator: gemini,
    };

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("prometheus recorder")?;
    let state = AppState {
        catalog: providers.catalog.clone(),
        jobs: EnrichmentJobs::new(
            EnrichmentPipeline::new(providers),
            config.server.job_history_capacity,
        ),
        prometheus: Some(prometheus),
    };
    let app = build_router(state, config.server.request_max_bytes);

    let addr: SocketAddr = ([0, 0, 0, 0], config.server.port).into();
    info!(
        target = "pixelphraser.api",
        project_key = %config.commercetools.project_key,
        "listening on {addr}"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
