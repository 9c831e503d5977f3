//! Promptgate HTTP server
//!
//! Starts an Axum web server that routes chat turns through confidentiality
//! classification, model selection, prompt enhancement, and history
//! truncation before dispatching to the backend pool.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use clap::Parser;
use promptgate::cli::{Cli, Command, generate_config_template};
use promptgate::config::{Config, Secrets};
use promptgate::handlers::{self, AppState};
use promptgate::middleware::request_id_middleware;
use promptgate::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let config = Arc::new(Config::from_file(&cli.config)?);

    // Secrets are read once; a missing key refuses startup.
    let secrets = Secrets::from_env()?;

    telemetry::init(&config.observability);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        confidential_model = %secrets.confidential_model,
        "starting promptgate"
    );

    let state = AppState::new(config.clone(), &secrets)?;

    let mut app = Router::new()
        .route("/chat/completions", post(handlers::chat::handler))
        .route("/health", get(handlers::health::handler));

    if config.observability.metrics_enabled {
        app = app.route("/metrics", get(handlers::metrics::handler));
    }

    let app = app
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware));

    let ip_addr = config.server.host.parse::<std::net::IpAddr>().map_err(|e| {
        format!(
            "Invalid IP address '{}' in config: {}. Expected format: 0.0.0.0 or 127.0.0.1",
            config.server.host, e
        )
    })?;
    let addr = SocketAddr::from((ip_addr, config.server.port));

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
