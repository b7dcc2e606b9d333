use anyhow::Context;
use pdfchat::{api, config, logging, processing::ProcessingService};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::init_config().context("Invalid configuration")?;

    let service = ProcessingService::from_config(config).context("Failed to build service")?;
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let address = (config.server_host.as_str(), config.server_port);
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.server_host, config.server_port))?;
    tracing::info!(
        "Listening on http://{}:{}",
        config.server_host,
        config.server_port
    );
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
