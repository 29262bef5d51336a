use actix_web::web;
use anyhow::{Context, Result};
use dbmsdb_mock::{http_server, AppState, MockConfig};
use std::net::TcpListener;

mod telemetry;

#[actix_web::main]
async fn main() -> Result<()> {
    let loaded = MockConfig::load("dbmsdb-mock.json");
    let config = loaded.as_ref().cloned().unwrap_or_default();
    let _guard = telemetry::init_telemetry(&config)?;
    if let Err(err) = &loaded {
        tracing::warn!("Using default settings: {:#}", err);
    }

    tracing::info!("dbmsdb-mock starting");
    tracing::info!("  Address: {}:{}", config.host, config.port);
    tracing::info!("  User: {}", config.username);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    let state = web::Data::new(AppState::new(config));
    let workers = std::thread::available_parallelism().map_or(2, |n| n.get());

    http_server(listener, state, workers)?.await?;

    tracing::info!("dbmsdb-mock stopped");
    Ok(())
}
