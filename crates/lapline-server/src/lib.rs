pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod persist;
pub mod scraper;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use lapline_core::store::TournamentStore;

use crate::config::ServerConfig;
use crate::scraper::MapFetcher;
use crate::state::AppState;

/// Origins allowed to call the API from a browser: local development hosts
/// plus the hosted front-end domains.
fn allowed_origin(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
    else {
        return false;
    };
    let host = rest.split(':').next().unwrap_or(rest);
    host == "localhost"
        || host == "127.0.0.1"
        || host.ends_with(".github.io")
        || host.ends_with(".loca.lt")
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.to_str().map(allowed_origin).unwrap_or(false)
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Assemble the router: the JSON API under `/api` with the admin gate over
/// every mutating method, and the static front end for everything else.
pub fn build_app(
    config: ServerConfig,
    store: TournamentStore,
    fetcher: Arc<dyn MapFetcher>,
) -> (Router, AppState) {
    let state = AppState::new(config, store, fetcher);

    let api = Router::new()
        .route("/tournaments", get(api::get_tournaments))
        .route("/tournaments/{id}", put(api::put_tournament))
        .route(
            "/points-config",
            get(api::get_points_config).put(api::put_points_config),
        )
        .route("/players", get(api::get_players).post(api::post_player))
        .route(
            "/players/{id}",
            put(api::put_player).delete(api::delete_player),
        )
        .route("/zones", get(api::get_zones).post(api::post_zone))
        .route("/zones/scrape-map", post(api::post_scrape_map))
        .route("/zones/{id}", put(api::put_zone).delete(api::delete_zone))
        .route(
            "/race-results",
            get(api::get_race_results).post(api::post_race_result),
        )
        .route("/race-results/bulk", post(api::post_race_results_bulk))
        .route(
            "/race-results/{id}",
            put(api::put_race_result).delete(api::delete_race_result),
        )
        .route("/health", get(health::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_gate,
        ));

    let web_root = state.config.web_root.clone();
    let app = Router::new()
        .nest("/api", api)
        .layer(cors_layer())
        .fallback_service(ServeDir::new(web_root))
        .with_state(state.clone());

    (app, state)
}
