use anyhow::Result;
use edge_warden::config::{LogFormat, Settings};
use edge_warden::Application;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.level))?;

    match settings.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .init(),
    }

    info!(
        environment = %settings.application.environment,
        "Starting Edge Warden application"
    );

    let app = Application::build(settings)?;
    app.run().await?;

    Ok(())
}
