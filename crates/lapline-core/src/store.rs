//! In-memory tournament dataset and every mutation the REST surface performs.
//!
//! The store owns the writable copy of the data for the process lifetime.
//! Mutations update the collections, run a full standings recalculation, and
//! leave persistence to the caller. Identifiers are assigned `max(existing)+1`.

use std::fmt;

use serde::Deserialize;

use crate::model::{EntityRef, MapData, Player, RaceResult, Tournament, Zone};
use crate::points::PointsConfig;
use crate::stats;
use crate::time::parse_finish_time;

/// Why a store mutation was rejected. Carries enough context for the REST
/// layer to phrase the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    TournamentNotFound(u64),
    PlayerNotFound(u64),
    ZoneNotFound(u64),
    ResultNotFound(u64),
    /// A result body referenced a player id that does not exist.
    UnknownPlayer(u64),
    /// A result body referenced a zone id that does not exist.
    UnknownZone(u64),
    UnparsableTime {
        player: String,
        raw: String,
    },
    EmptyBatch,
    MissingName,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TournamentNotFound(id) => write!(f, "Tournament {id} not found"),
            Self::PlayerNotFound(id) => write!(f, "Player {id} not found"),
            Self::ZoneNotFound(id) => write!(f, "Zone {id} not found"),
            Self::ResultNotFound(id) => write!(f, "Race result {id} not found"),
            Self::UnknownPlayer(id) => write!(f, "Invalid player_id: {id}"),
            Self::UnknownZone(id) => write!(f, "Invalid zone_id: {id}"),
            Self::UnparsableTime { player, raw } => {
                write!(f, "Invalid finish time for player {player}: {raw}")
            },
            Self::EmptyBatch => write!(f, "zone_id and a non-empty results array are required"),
            Self::MissingName => write!(f, "name is required"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Admin-supplied tournament fields. Derived data (points config snapshot)
/// is never taken from the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TournamentUpdate {
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub status: Option<String>,
    pub total_weeks: Option<u32>,
    pub prizes: String,
    pub rules: String,
    pub registration_info: String,
    pub contact_info: String,
    pub stream_url: String,
    pub discord_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerInput {
    pub name: String,
    pub zone_assignment: String,
    pub status: Option<String>,
    pub best_lap_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ZoneInput {
    pub name: String,
    pub map_name: String,
    pub map_url: String,
    pub map_info: String,
    pub description: String,
    pub week_number: Option<u32>,
    pub is_active: bool,
}

/// Outcome of a map-metadata fetch, as applied to a zone write.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEnrichment {
    pub formatted: String,
    pub structured: Option<MapData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RaceResultInput {
    pub player_id: Option<u64>,
    pub zone_id: Option<u64>,
    pub position: Option<u32>,
    pub finish_time: String,
    pub lap_time: String,
    pub race_date: Option<String>,
    pub week_number: Option<u32>,
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkSubmission {
    pub zone_id: u64,
    #[serde(default)]
    pub race_date: Option<String>,
    #[serde(default)]
    pub week_number: Option<u32>,
    #[serde(default)]
    pub results: Vec<BulkEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntry {
    pub player_id: u64,
    pub finish_time: String,
    #[serde(default)]
    pub notes: String,
}

/// The whole in-memory dataset.
#[derive(Debug, Clone)]
pub struct TournamentStore {
    pub tournament: Tournament,
    pub players: Vec<Player>,
    pub zones: Vec<Zone>,
    pub race_results: Vec<RaceResult>,
    pub points_config: PointsConfig,
}

fn next_id(ids: impl Iterator<Item = u64>) -> u64 {
    ids.max().unwrap_or(0) + 1
}

fn date_day(date: &str) -> &str {
    date.split('T').next().unwrap_or(date)
}

impl TournamentStore {
    pub fn new(
        tournament: Tournament,
        players: Vec<Player>,
        zones: Vec<Zone>,
        race_results: Vec<RaceResult>,
        points_config: PointsConfig,
    ) -> Self {
        let mut store = Self {
            tournament,
            players,
            zones,
            race_results,
            points_config,
        };
        store.recalculate();
        store
    }

    /// Recompute all derived fields from the current collections.
    pub fn recalculate(&mut self) {
        stats::recalculate(
            &mut self.players,
            &mut self.race_results,
            &self.points_config,
            &mut self.tournament,
        );
    }

    pub fn player(&self, id: u64) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn zone(&self, id: u64) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn race_result(&self, id: u64) -> Option<&RaceResult> {
        self.race_results.iter().find(|r| r.id == id)
    }

    pub fn active_zone(&self) -> Option<&Zone> {
        self.zones.iter().find(|z| z.is_active)
    }

    pub fn update_tournament(
        &mut self,
        id: u64,
        update: TournamentUpdate,
    ) -> Result<Tournament, StoreError> {
        if self.tournament.id != id {
            return Err(StoreError::TournamentNotFound(id));
        }
        let tournament = &mut self.tournament;
        tournament.title = update.title;
        tournament.description = update.description;
        tournament.start_date = update.start_date;
        tournament.end_date = update.end_date;
        tournament.status = update.status.unwrap_or_else(|| "active".to_string());
        tournament.total_weeks = update.total_weeks.filter(|w| *w > 0).unwrap_or(8);
        tournament.prizes = update.prizes;
        tournament.rules = update.rules;
        tournament.registration_info = update.registration_info;
        tournament.contact_info = update.contact_info;
        tournament.stream_url = update.stream_url;
        tournament.discord_url = update.discord_url;
        tournament.points_config = self.points_config.clone();
        Ok(self.tournament.clone())
    }

    /// Replace the scoring table and rescore everything.
    pub fn set_points_config(&mut self, config: PointsConfig) {
        self.points_config = config;
        self.recalculate();
    }

    pub fn add_player(&mut self, input: PlayerInput) -> Result<Player, StoreError> {
        if input.name.trim().is_empty() {
            return Err(StoreError::MissingName);
        }
        let id = next_id(self.players.iter().map(|p| p.id));
        self.players.push(Player {
            id,
            name: input.name,
            zone_assignment: input.zone_assignment,
            status: input.status.unwrap_or_else(|| "active".to_string()),
            best_lap_time: input.best_lap_time,
            ..Player::default()
        });
        self.recalculate();
        self.player(id)
            .cloned()
            .ok_or(StoreError::PlayerNotFound(id))
    }

    pub fn update_player(&mut self, id: u64, input: PlayerInput) -> Result<Player, StoreError> {
        if input.name.trim().is_empty() {
            return Err(StoreError::MissingName);
        }
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::PlayerNotFound(id))?;
        player.name = input.name;
        player.zone_assignment = input.zone_assignment;
        player.status = input.status.unwrap_or_else(|| "active".to_string());
        player.best_lap_time = input.best_lap_time;
        self.recalculate();
        self.player(id)
            .cloned()
            .ok_or(StoreError::PlayerNotFound(id))
    }

    /// Delete a player and every race result referencing them.
    pub fn delete_player(&mut self, id: u64) -> Result<(), StoreError> {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        if self.players.len() == before {
            return Err(StoreError::PlayerNotFound(id));
        }
        self.race_results
            .retain(|r| r.player.as_ref().is_none_or(|p| p.id != id));
        self.recalculate();
        Ok(())
    }

    /// Create a zone. `enrichment`, when present, is the awaited output of the
    /// map fetcher and wins over the request's `map_info`.
    pub fn add_zone(&mut self, input: ZoneInput, enrichment: Option<MapEnrichment>) -> Zone {
        if input.is_active {
            for zone in &mut self.zones {
                zone.is_active = false;
            }
        }
        let (map_info, map_data) = match enrichment {
            Some(e) => (e.formatted, e.structured),
            None => (input.map_info, None),
        };
        let id = next_id(self.zones.iter().map(|z| z.id));
        let zone = Zone {
            id,
            name: input.name,
            map_name: input.map_name,
            map_url: input.map_url,
            map_info,
            map_data,
            description: input.description,
            week_number: input.week_number.filter(|w| *w > 0).unwrap_or(1),
            is_active: input.is_active,
        };
        self.zones.push(zone.clone());
        zone
    }

    pub fn update_zone(
        &mut self,
        id: u64,
        input: ZoneInput,
        enrichment: Option<MapEnrichment>,
    ) -> Result<Zone, StoreError> {
        if !self.zones.iter().any(|z| z.id == id) {
            return Err(StoreError::ZoneNotFound(id));
        }
        // Activation is exclusive: flipping this zone on turns every other off
        // in the same write.
        if input.is_active {
            for zone in &mut self.zones {
                if zone.id != id {
                    zone.is_active = false;
                }
            }
        }
        let zone = self
            .zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or(StoreError::ZoneNotFound(id))?;
        zone.name = input.name;
        zone.map_name = input.map_name;
        zone.map_url = input.map_url;
        zone.description = input.description;
        zone.week_number = input.week_number.filter(|w| *w > 0).unwrap_or(1);
        zone.is_active = input.is_active;
        match enrichment {
            Some(e) => {
                zone.map_info = e.formatted;
                if e.structured.is_some() {
                    zone.map_data = e.structured;
                }
            },
            // Existing structured data survives a plain edit.
            None => zone.map_info = input.map_info,
        }
        Ok(zone.clone())
    }

    /// Delete a zone and every race result referencing it.
    pub fn delete_zone(&mut self, id: u64) -> Result<(), StoreError> {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != id);
        if self.zones.len() == before {
            return Err(StoreError::ZoneNotFound(id));
        }
        self.race_results
            .retain(|r| r.zone.as_ref().is_none_or(|z| z.id != id));
        self.recalculate();
        Ok(())
    }

    fn player_ref(&self, id: Option<u64>) -> Result<Option<EntityRef>, StoreError> {
        match id {
            None => Ok(None),
            Some(id) => {
                let player = self.player(id).ok_or(StoreError::UnknownPlayer(id))?;
                Ok(Some(EntityRef {
                    id: player.id,
                    name: player.name.clone(),
                }))
            },
        }
    }

    fn zone_ref(&self, id: Option<u64>) -> Result<Option<EntityRef>, StoreError> {
        match id {
            None => Ok(None),
            Some(id) => {
                let zone = self.zone(id).ok_or(StoreError::UnknownZone(id))?;
                Ok(Some(EntityRef {
                    id: zone.id,
                    name: zone.name.clone(),
                }))
            },
        }
    }

    /// Rank `candidate_ms` against the other timed results of the same race
    /// (same zone, week, and calendar day), rewriting the ranks of existing
    /// members that shifted. Returns the candidate's 1-based position.
    fn rank_within_race(
        &mut self,
        zone_id: u64,
        week: u32,
        race_date: &str,
        candidate_ms: i64,
        exclude: Option<u64>,
    ) -> u32 {
        let day = date_day(race_date);
        let in_group = |r: &RaceResult| {
            exclude != Some(r.id)
                && r.zone.as_ref().is_some_and(|z| z.id == zone_id)
                && r.week_number == week
                && date_day(&r.race_date) == day
        };

        let mut times: Vec<(Option<u64>, i64)> = self
            .race_results
            .iter()
            .filter(|r| in_group(r))
            .filter_map(|r| r.finish_time_ms.map(|ms| (Some(r.id), ms)))
            .collect();
        times.push((None, candidate_ms));
        times.sort_by_key(|&(_, ms)| ms);

        let position = times
            .iter()
            .position(|&(id, _)| id.is_none())
            .map_or(1, |index| index as u32 + 1);

        // Ties collapse onto the first matching time, same as ranks assigned
        // by value rather than by identity.
        for result in self.race_results.iter_mut() {
            if !in_group(result) {
                continue;
            }
            if let Some(ms) = result.finish_time_ms
                && let Some(rank) = times.iter().position(|&(_, m)| m == ms)
            {
                result.position = rank as u32 + 1;
            }
        }
        position
    }

    /// Create one race result. When the request omits a position but carries a
    /// parseable time, the position is derived by ranking against the same
    /// race; with neither, it defaults to 1.
    pub fn add_race_result(
        &mut self,
        input: RaceResultInput,
        now: &str,
    ) -> Result<RaceResult, StoreError> {
        let player = self.player_ref(input.player_id)?;
        let zone = self.zone_ref(input.zone_id)?;

        let raw_time = if input.finish_time.is_empty() {
            input.lap_time.clone()
        } else {
            input.finish_time.clone()
        };
        let parsed = parse_finish_time(&raw_time);
        let race_date = input
            .race_date
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| now.to_string());
        let week = input.week_number.filter(|w| *w > 0).unwrap_or(1);

        let position = match (input.position.filter(|p| *p > 0), parsed.milliseconds) {
            (Some(position), _) => position,
            (None, Some(ms)) => match &zone {
                Some(zone_ref) => self.rank_within_race(zone_ref.id, week, &race_date, ms, None),
                None => 1,
            },
            (None, None) => 1,
        };

        let id = next_id(self.race_results.iter().map(|r| r.id));
        let lap_time = if parsed.formatted.is_empty() {
            input.lap_time
        } else {
            parsed.formatted.clone()
        };
        self.race_results.push(RaceResult {
            id,
            position,
            points_earned: 0,
            finish_time: parsed.formatted,
            finish_time_ms: parsed.milliseconds,
            lap_time,
            race_date,
            week_number: week,
            notes: input.notes,
            player,
            zone,
        });
        self.recalculate();
        self.race_result(id)
            .cloned()
            .ok_or(StoreError::ResultNotFound(id))
    }

    pub fn update_race_result(
        &mut self,
        id: u64,
        input: RaceResultInput,
        now: &str,
    ) -> Result<RaceResult, StoreError> {
        if !self.race_results.iter().any(|r| r.id == id) {
            return Err(StoreError::ResultNotFound(id));
        }
        let player = self.player_ref(input.player_id)?;
        let zone = self.zone_ref(input.zone_id)?;

        let raw_time = if input.finish_time.is_empty() {
            input.lap_time.clone()
        } else {
            input.finish_time.clone()
        };
        let parsed = parse_finish_time(&raw_time);
        let race_date = input
            .race_date
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| now.to_string());
        let week = input.week_number.filter(|w| *w > 0).unwrap_or(1);

        let position = match (input.position.filter(|p| *p > 0), parsed.milliseconds) {
            (Some(position), _) => position,
            (None, Some(ms)) => match &zone {
                Some(zone_ref) => {
                    self.rank_within_race(zone_ref.id, week, &race_date, ms, Some(id))
                },
                None => 1,
            },
            (None, None) => 1,
        };

        let lap_time = if parsed.formatted.is_empty() {
            input.lap_time
        } else {
            parsed.formatted.clone()
        };
        let result = self
            .race_results
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::ResultNotFound(id))?;
        result.position = position;
        result.points_earned = 0;
        result.finish_time = parsed.formatted;
        result.finish_time_ms = parsed.milliseconds;
        result.lap_time = lap_time;
        result.race_date = race_date;
        result.week_number = week;
        result.notes = input.notes;
        result.player = player;
        result.zone = zone;
        self.recalculate();
        self.race_result(id)
            .cloned()
            .ok_or(StoreError::ResultNotFound(id))
    }

    pub fn delete_race_result(&mut self, id: u64) -> Result<(), StoreError> {
        let before = self.race_results.len();
        self.race_results.retain(|r| r.id != id);
        if self.race_results.len() == before {
            return Err(StoreError::ResultNotFound(id));
        }
        self.recalculate();
        Ok(())
    }

    /// Ingest a whole race at once: parse every entry's finish time, derive
    /// positions from the sorted times (stable, ties keep submission order),
    /// append all results, and recalculate once for the batch. Any invalid
    /// entry rejects the entire batch with no partial effect.
    pub fn submit_bulk(
        &mut self,
        submission: BulkSubmission,
        now: &str,
    ) -> Result<Vec<RaceResult>, StoreError> {
        let zone = self
            .zone(submission.zone_id)
            .ok_or(StoreError::UnknownZone(submission.zone_id))?;
        let zone_ref = EntityRef {
            id: zone.id,
            name: zone.name.clone(),
        };
        if submission.results.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let race_date = submission
            .race_date
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| now.to_string());
        let week = submission.week_number.filter(|w| *w > 0).unwrap_or(1);

        struct ParsedEntry {
            player: EntityRef,
            milliseconds: i64,
            formatted: String,
            notes: String,
        }

        let mut entries = Vec::with_capacity(submission.results.len());
        for entry in submission.results {
            let player = self
                .player(entry.player_id)
                .ok_or(StoreError::UnknownPlayer(entry.player_id))?;
            let parsed = parse_finish_time(&entry.finish_time);
            let Some(milliseconds) = parsed.milliseconds else {
                return Err(StoreError::UnparsableTime {
                    player: player.name.clone(),
                    raw: entry.finish_time,
                });
            };
            entries.push(ParsedEntry {
                player: EntityRef {
                    id: player.id,
                    name: player.name.clone(),
                },
                milliseconds,
                formatted: parsed.formatted,
                notes: entry.notes,
            });
        }

        entries.sort_by_key(|e| e.milliseconds);

        let mut id = next_id(self.race_results.iter().map(|r| r.id));
        let mut created_ids = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            self.race_results.push(RaceResult {
                id,
                position: index as u32 + 1,
                points_earned: 0,
                finish_time: entry.formatted.clone(),
                finish_time_ms: Some(entry.milliseconds),
                lap_time: entry.formatted,
                race_date: race_date.clone(),
                week_number: week,
                notes: entry.notes,
                player: Some(entry.player),
                zone: Some(zone_ref.clone()),
            });
            created_ids.push(id);
            id += 1;
        }

        self.recalculate();
        Ok(self
            .race_results
            .iter()
            .filter(|r| created_ids.contains(&r.id))
            .cloned()
            .collect())
    }
}
