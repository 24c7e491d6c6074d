//! Rally server binary: hosts the auth, users and matches services, or any
//! one of them.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rally_server::service::config::{AppConfig, ServiceSelection};
use rally_server::AppBuilder;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rally-server", version, about)]
struct Args {
    /// JSON config file. Defaults apply when omitted.
    #[arg(long, env = "RALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Service(s) to host in this process.
    #[arg(long, value_enum, default_value_t = ServiceSelection::All, env = "RALLY_SERVICE")]
    service: ServiceSelection,

    /// Overrides `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RALLY_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate(args.service)?;

    let app = AppBuilder::new(config).services(args.service).build()?;
    let mut network = app.network();
    let port = network.start().await.context("binding listener")?;

    app.registry
        .init_all(&app.context())
        .await
        .context("initializing services")?;
    info!(port, services = ?app.registry.names(), "rally server ready");

    let served = network.serve(shutdown_signal()).await;

    app.registry.shutdown_all(false).await?;
    info!("rally server stopped");
    served
}
