use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use lapline_server::build_app;
use lapline_server::config::ServerConfig;
use lapline_server::persist::DataFile;
use lapline_server::scraper::SubprocessFetcher;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load();
    config.validate();

    let data = DataFile::new(&config.data_file);
    let snapshot = data.load().unwrap_or_default();
    let store = snapshot.into_store();
    tracing::info!(
        players = store.players.len(),
        zones = store.zones.len(),
        race_results = store.race_results.len(),
        "Tournament data loaded"
    );

    let fetcher = Arc::new(SubprocessFetcher::from_config(&config.scraper));
    let listen_addr = config.listen_addr.clone();
    let (app, _state) = build_app(config, store, fetcher);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, "Failed to bind: {e}");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Lapline server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
