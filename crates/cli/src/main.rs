use clap::Parser;
use eyre::{eyre, WrapErr};
use storegate_cli::Cli;
use storegate_client::Gateway;
use storegate_config::ConfigLoader;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Diagnostics go to stderr so stdout stays machine readable
    storegate_utils::tracing::init("warn").map_err(|e| eyre!(e))?;

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let loaded = loader.load().wrap_err("failed to load configuration")?;

    let mut config = loaded.config;
    if let Some(base_url) = cli.base_url {
        config.request.base_url = base_url;
    }
    tracing::debug!(
        base_url = %config.request.base_url,
        file = ?loaded.source.file,
        "cli_config_resolved"
    );

    let gateway = Gateway::builder()
        .config(config)
        .build()
        .wrap_err("failed to start the gateway")?;

    cli.command.execute(&gateway).await
}
