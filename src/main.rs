//! llm-relay server binary.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use llm_relay::config::{Cli, Config};
use llm_relay::server::routes::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up the upstream API key from a local .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        "llm_relay=debug,tower_http=debug"
    } else {
        "llm_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("llm-relay v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    let config = Arc::new(config);

    info!(
        upstream = config.upstream.base_url,
        default_model = config.generation.default_model,
        "Configuration loaded"
    );

    // Resolved once at startup; absence yields an empty credential and the
    // upstream rejects the request as unauthorized.
    let api_key = config.upstream.resolve_api_key();

    let state = Arc::new(AppState::new(config.clone(), api_key)?);
    let app = build_router(state);

    let listen_addr = cli.listen;
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
