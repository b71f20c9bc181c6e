mod auth;
mod config;
mod dashboard;
mod draft;
mod error;
mod extract;
mod live;
mod routes;
mod scoring;
mod standings;
mod state;
mod store;
mod types;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::store::Store;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    config::init().expect("Failed to initialize config directory");

    let server = ServerConfig::from_env().expect("Invalid server configuration");
    let league = config::load_league_config().expect("Failed to load league.json");
    let weeks = config::load_schedule();
    tracing::info!(
        "{} season {}: {} weeks scheduled",
        league.league_name,
        league.season,
        weeks.len()
    );

    let store = Store::open(weeks, &league, Some(server.data_path.clone()))
        .expect("Failed to load saved data");
    let state = AppState::new(store, league, server.secure_cookies);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port))
        .await
        .expect("Failed to bind");

    tracing::info!("Pick'em server running on port {}", server.port);

    axum::serve(listener, app).await.expect("Server error");
}
