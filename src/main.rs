use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tunnelvisor::{LogWriter, ProxyPool, Settings, Supervisor, launch};

/// Keeps one tunnel core running per local SOCKS port.
#[derive(Debug, Parser)]
#[command(name = "tunnelvisor", version, about)]
struct Cli {
    /// TOML settings file.
    #[arg(short, long, default_value = "tunnelvisor.toml")]
    config: PathBuf,

    /// Listen port; repeat for several endpoints. Overrides the settings file.
    #[arg(short, long = "port")]
    ports: Vec<u16>,

    /// Log reconnect reasons and raw notice text.
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Delete all endpoint data directories and exit.
    #[arg(long)]
    remove_data: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = if cli.config.exists() {
        Settings::load(&cli.config)?
    } else {
        Settings::default()
    };
    if !cli.ports.is_empty() {
        settings.supervisor.listen_ports = cli.ports.clone();
    }
    settings.supervisor.verbose |= cli.verbose;

    setup_logging(settings.supervisor.verbose, cli.json_logs);
    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "settings file not found; using defaults");
    }

    if cli.remove_data {
        let data_dir = settings
            .supervisor
            .data_dir
            .clone()
            .unwrap_or_else(tunnelvisor::default_data_dir);
        launch::remove_data(&data_dir)
            .await
            .with_context(|| format!("removing data under {}", data_dir.display()))?;
        info!(path = %data_dir.display(), "endpoint data removed");
        return Ok(());
    }

    let (cfg, tunnel) = settings.into_configs()?;
    info!(
        ports = ?cfg.listen_ports,
        tunnels = tunnel.tunnel,
        credentials = tunnel.credentials.len(),
        "starting"
    );

    let pool = Arc::new(ProxyPool::new());
    let sup = Supervisor::builder(cfg.clone(), tunnel)
        .with_subscriber(Arc::new(LogWriter::new(cfg.verbose)))
        .with_registry(pool.clone())
        .build();

    sup.run().await?;
    info!(
        total = %tunnelvisor::ledger::format_bytes(sup.ledger().grand_total()),
        proxies = ?pool.addresses(),
        "stopped"
    );
    Ok(())
}

fn setup_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "tunnelvisor=debug"
    } else {
        "tunnelvisor=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
