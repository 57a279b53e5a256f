//! REST handlers. Every response body is wrapped in `{"data": ...}`; every
//! mutation persists the dataset before the response is sent.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use lapline_core::model::{Player, RaceResult, Tournament, Zone};
use lapline_core::points::PointsConfig;
use lapline_core::store::{
    BulkSubmission, MapEnrichment, PlayerInput, RaceResultInput, StoreError, TournamentUpdate,
    ZoneInput,
};

use crate::error::AppError;
use crate::scraper::MapFetchOutcome;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DataBody<T> {
    pub data: T,
}

impl<T> DataBody<T> {
    fn of(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TournamentNotFound(_)
            | StoreError::PlayerNotFound(_)
            | StoreError::ZoneNotFound(_)
            | StoreError::ResultNotFound(_) => AppError::NotFound(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

/// ISO-8601 UTC timestamp with millisecond precision, used wherever a request
/// omits the race date.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// --- tournament ---

pub async fn get_tournaments(State(state): State<AppState>) -> Json<DataBody<Vec<Tournament>>> {
    let store = state.store.read().await;
    DataBody::of(vec![store.tournament.clone()])
}

pub async fn put_tournament(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<TournamentUpdate>,
) -> Result<Json<DataBody<Tournament>>, AppError> {
    let tournament = {
        let mut store = state.store.write().await;
        store.update_tournament(id, update)?
    };
    state.persist().await?;
    Ok(DataBody::of(tournament))
}

// --- points config ---

pub async fn get_points_config(State(state): State<AppState>) -> Json<DataBody<PointsConfig>> {
    let store = state.store.read().await;
    DataBody::of(store.points_config.clone())
}

/// Accepts either a bare config object or `{"pointsConfig": {...}}`; any shape
/// normalizes to a full table, so this endpoint cannot fail validation.
pub async fn put_points_config(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DataBody<PointsConfig>>, AppError> {
    let raw = body.get("pointsConfig").unwrap_or(&body);
    let config = PointsConfig::normalize(raw);
    let applied = {
        let mut store = state.store.write().await;
        store.set_points_config(config);
        store.points_config.clone()
    };
    state.persist().await?;
    Ok(DataBody::of(applied))
}

// --- players ---

pub async fn get_players(State(state): State<AppState>) -> Json<DataBody<Vec<Player>>> {
    let store = state.store.read().await;
    DataBody::of(store.players.clone())
}

pub async fn post_player(
    State(state): State<AppState>,
    Json(input): Json<PlayerInput>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let player = {
        let mut store = state.store.write().await;
        store.add_player(input)?
    };
    state.persist().await?;
    Ok((StatusCode::CREATED, DataBody::of(player)))
}

pub async fn put_player(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<PlayerInput>,
) -> Result<Json<DataBody<Player>>, AppError> {
    let player = {
        let mut store = state.store.write().await;
        store.update_player(id, input)?
    };
    state.persist().await?;
    Ok(DataBody::of(player))
}

pub async fn delete_player(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    {
        let mut store = state.store.write().await;
        store.delete_player(id)?;
    }
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- zones ---

#[derive(Debug, Default, Deserialize)]
pub struct ZoneQuery {
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn get_zones(
    State(state): State<AppState>,
    Query(query): Query<ZoneQuery>,
) -> Json<DataBody<Vec<Zone>>> {
    let store = state.store.read().await;
    let zones = match query.active {
        Some(true) => store.active_zone().cloned().into_iter().collect(),
        _ => store.zones.clone(),
    };
    DataBody::of(zones)
}

fn enrichment_from(outcome: MapFetchOutcome) -> Option<MapEnrichment> {
    match outcome {
        MapFetchOutcome::Structured { formatted, data } => Some(MapEnrichment {
            formatted,
            structured: Some(data),
        }),
        MapFetchOutcome::Text(text) => Some(MapEnrichment {
            formatted: text,
            structured: None,
        }),
        MapFetchOutcome::Skipped => None,
    }
}

pub async fn post_zone(
    State(state): State<AppState>,
    Json(input): Json<ZoneInput>,
) -> Result<impl IntoResponse, AppError> {
    // Fetch before taking the write lock: a slow scrape must not block reads.
    let enrichment = if input.map_url.is_empty() {
        None
    } else {
        enrichment_from(state.fetcher.fetch(&input.map_url).await)
    };
    let zone = {
        let mut store = state.store.write().await;
        store.add_zone(input, enrichment)
    };
    state.persist().await?;
    Ok((StatusCode::CREATED, DataBody::of(zone)))
}

pub async fn put_zone(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<ZoneInput>,
) -> Result<Json<DataBody<Zone>>, AppError> {
    // Re-scrape only when the URL actually changed.
    let current_url = {
        let store = state.store.read().await;
        store
            .zone(id)
            .map(|z| z.map_url.clone())
            .ok_or(StoreError::ZoneNotFound(id))?
    };
    let enrichment = if input.map_url.is_empty() || input.map_url == current_url {
        None
    } else {
        enrichment_from(state.fetcher.fetch(&input.map_url).await)
    };
    let zone = {
        let mut store = state.store.write().await;
        store.update_zone(id, input, enrichment)?
    };
    state.persist().await?;
    Ok(DataBody::of(zone))
}

pub async fn delete_zone(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    {
        let mut store = state.store.write().await;
        store.delete_zone(id)?;
    }
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default, rename = "mapUrl", alias = "map_url")]
    pub map_url: String,
}

/// On-demand scrape preview. Does not touch any zone.
pub async fn post_scrape_map(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !request.map_url.starts_with("https://") {
        return Err(AppError::BadRequest(
            "A valid https:// map URL is required".to_string(),
        ));
    }
    match state.fetcher.fetch(&request.map_url).await {
        MapFetchOutcome::Structured { formatted, data } => Ok(Json(serde_json::json!({
            "success": true,
            "data": data,
            "formatted": formatted,
        }))),
        MapFetchOutcome::Text(text) => Ok(Json(serde_json::json!({
            "success": true,
            "data": text,
        }))),
        MapFetchOutcome::Skipped => Err(AppError::BadRequest(
            "Failed to scrape map information".to_string(),
        )),
    }
}

// --- race results ---

pub async fn get_race_results(State(state): State<AppState>) -> Json<DataBody<Vec<RaceResult>>> {
    let store = state.store.read().await;
    DataBody::of(store.race_results.clone())
}

pub async fn post_race_result(
    State(state): State<AppState>,
    Json(input): Json<RaceResultInput>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let result = {
        let mut store = state.store.write().await;
        store.add_race_result(input, &now())?
    };
    state.persist().await?;
    Ok((StatusCode::CREATED, DataBody::of(result)))
}

pub async fn put_race_result(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<RaceResultInput>,
) -> Result<Json<DataBody<RaceResult>>, AppError> {
    let result = {
        let mut store = state.store.write().await;
        store.update_race_result(id, input, &now())?
    };
    state.persist().await?;
    Ok(DataBody::of(result))
}

pub async fn delete_race_result(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    {
        let mut store = state.store.write().await;
        store.delete_race_result(id)?;
    }
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub data: Vec<RaceResult>,
    pub message: String,
}

pub async fn post_race_results_bulk(
    State(state): State<AppState>,
    Json(submission): Json<BulkSubmission>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let created = {
        let mut store = state.store.write().await;
        store
            .submit_bulk(submission, &now())
            .map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    state.persist().await?;
    let message = format!("Successfully added {} race results", created.len());
    Ok((
        StatusCode::CREATED,
        Json(BulkResponse {
            data: created,
            message,
        }),
    ))
}
