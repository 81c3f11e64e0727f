use anyhow::{Context, Result};
use glasslink_client::{ble::BleTransport, cli, config, logging, runtime};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = <cli::Cli as clap::Parser>::parse();

    let log_file = match cli.log_file {
        Some(p) => p,
        None => config::default_log_path()?,
    };
    let _log_guard = logging::init_logging(cli.verbose, &log_file)?;

    let config_path = match cli.config {
        Some(p) => p,
        None => config::default_config_path()?,
    };

    let job = match cli.command.unwrap_or(cli::Command::Run) {
        cli::Command::PrintConfigPath => {
            println!("{}", config_path.display());
            return Ok(());
        }
        cli::Command::InitConfig { force } => {
            let cfg = glasslink_core::GlassesConfig::default();
            config::save(&config_path, &cfg, force)?;
            println!("Wrote default config to {}", config_path.display());
            return Ok(());
        }
        cli::Command::Scan => {
            let cfg = config::load(&config_path)?;
            let transport = Arc::new(BleTransport::new().await?);
            return runtime::run_scan(transport, cfg, Box::new(|m| tracing::info!("{m}"))).await;
        }
        cli::Command::Run => runtime::Job::KeepAlive,
        cli::Command::Send { text } => runtime::Job::Text(text.join(" ")),
        cli::Command::Image { path } => {
            let bitmap = std::fs::read(&path)
                .with_context(|| format!("failed to read image: {}", path.display()))?;
            runtime::Job::Image(bitmap)
        }
    };

    let cfg = config::load(&config_path)?;
    let transport = Arc::new(BleTransport::new().await?);
    let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    runtime::run_client(
        transport,
        cfg,
        job,
        stop_rx,
        Box::new(|m| tracing::info!("{m}")),
    )
    .await
}
