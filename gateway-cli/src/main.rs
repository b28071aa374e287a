//! CLI entry point: wires configuration, tracing, and the gateway together,
//! and owns the process exit code.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use gateway::http;
use gateway::{Config, Gateway};

#[derive(clap::ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(bin_name = "gateway-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Override the bind port from configuration (`PORT` env var / default 8000).
    #[arg(long)]
    bind: Option<u16>,
    /// Log verbosity.
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,
    /// Enable permissive CORS headers on the HTTP surface.
    #[arg(long, default_value_t = false)]
    cors: bool,
}

fn setup_subscriber(level: LogLevel) {
    let level_filter = match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_subscriber(cli.log_level);

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };
    if let Some(port) = cli.bind {
        config.port = port;
    }
    let port = config.port;

    let gateway = Arc::new(Gateway::new(config));

    let mut handles: JoinSet<()> = JoinSet::new();
    gateway.spawn_workers(&mut handles);

    let app = http::router(gateway.clone(), cli.cors);
    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(address = %addr, error = %e, "failed to bind HTTP listener");
            process::exit(1);
        }
    };

    info!(address = %addr, "gateway listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
    });

    if let Err(e) = server.await {
        error!(error = %e, "HTTP server error");
    }

    gateway.shutdown();
    while handles.join_next().await.is_some() {}

    info!("gateway stopped");
}
