use anyhow::{Context, Result, anyhow};
use grantor::cli::{self, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("a rustls crypto provider is already installed"))
        .context("Failed to install the ring crypto provider")?;

    let action = cli::start()?;

    let result = action.execute().await;

    telemetry::shutdown_tracer();

    result
}
