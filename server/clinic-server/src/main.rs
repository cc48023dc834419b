use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, warn};

use clinic_server::{create_app, ClinicServer};
use error_common::{log_error, ClinicError, Result};
use logger_redacted::{LogFormat, LoggerConfig};

/// Clinic Engine HTTP Server
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "Multi-tenant dental clinic HTTP API server")]
struct Args {
    /// Server bind address (overrides the configuration)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long, default_value = "config/clinic-server.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = config_engine::load(&args.config).map_err(|e| ClinicError::ConfigError(e.to_string()))?;
    init_tracing(&config.logging, args.verbose)?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Clinic Engine HTTP Server");
    info!(
        environment = config.server.environment.as_str(),
        database = %config.database.masked_url(),
        "Configuration loaded"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ClinicError::ConfigError(format!("Invalid bind address: {}", e)))?;

    let server = ClinicServer::new(config).await.inspect_err(|e| log_error("startup", e))?;
    let app = create_app(server.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ClinicError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!(address = %addr, "Clinic Engine server listening");
    info!("Health check available at: http://{}/health", addr);
    info!("API documentation available at: http://{}/docs", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ClinicError::ServerError(format!("HTTP server error: {}", e)))
        .inspect_err(|e| log_error("serve", e));

    server.shutdown().await;
    info!("Clinic Engine server stopped");
    result
}

fn init_tracing(settings: &config_engine::LoggingSettings, verbose: bool) -> Result<()> {
    let format = match settings.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    let logger = LoggerConfig {
        log_level: if verbose { "debug".to_string() } else { settings.level.clone() },
        format,
        ..LoggerConfig::default()
    };
    logger_redacted::init_tracing(&logger)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
