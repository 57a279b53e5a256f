//! Persisted entity types.
//!
//! Identifiers are positive integers, unique per collection, assigned as
//! `max(existing) + 1`. Insertion order is display order. Fields marked
//! derived are owned by the recalculation engine ([`crate::stats`]) and are
//! overwritten on every mutation; values loaded from disk are never trusted.

use serde::{Deserialize, Serialize};

use crate::points::PointsConfig;

/// The singleton tournament record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tournament {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub total_weeks: u32,
    pub prizes: String,
    pub rules: String,
    pub registration_info: String,
    pub contact_info: String,
    pub stream_url: String,
    pub discord_url: String,
    /// Snapshot of the live scoring table, re-embedded on every recalculation
    /// so read-only clients see the current config.
    pub points_config: PointsConfig,
}

impl Default for Tournament {
    fn default() -> Self {
        Self {
            id: 1,
            title: String::new(),
            description: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            status: "active".to_string(),
            total_weeks: 8,
            prizes: String::new(),
            rules: String::new(),
            registration_info: String::new(),
            contact_info: String::new(),
            stream_url: String::new(),
            discord_url: String::new(),
            points_config: PointsConfig::default(),
        }
    }
}

/// A registered racer. Everything below `status` is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub id: u64,
    pub name: String,
    pub zone_assignment: String,
    pub status: String,
    pub total_points: i64,
    pub races_participated: u32,
    /// Formatted best finish time. The historical field name is kept for
    /// on-disk compatibility; hand-entered values are adopted as the best
    /// time only while no timed result exists.
    pub best_lap_time: String,
    pub best_finish_time_ms: Option<i64>,
    pub race_results: Vec<ResultSummary>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            zone_assignment: String::new(),
            status: "active".to_string(),
            total_points: 0,
            races_participated: 0,
            best_lap_time: String::new(),
            best_finish_time_ms: None,
            race_results: Vec::new(),
        }
    }
}

/// Per-result summary embedded in a player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub id: u64,
    pub position: u32,
    pub points_earned: i64,
    pub week_number: u32,
}

/// A race track/course tied to a tournament week. At most one zone is active
/// at any time; activating one deactivates the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub id: u64,
    pub name: String,
    pub map_name: String,
    pub map_url: String,
    /// Formatted map summary (legacy free-text field).
    pub map_info: String,
    /// Structured metadata from the map fetcher, when a scrape succeeded.
    pub map_data: Option<MapData>,
    pub description: String,
    pub week_number: u32,
    pub is_active: bool,
}

impl Default for Zone {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            map_name: String::new(),
            map_url: String::new(),
            map_info: String::new(),
            map_data: None,
            description: String::new(),
            week_number: 1,
            is_active: false,
        }
    }
}

/// Best-effort descriptive metadata about a zone's external map resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapData {
    pub title: String,
    pub description: String,
    pub location: String,
    pub region: String,
    pub environment: String,
    pub weather: String,
    pub image_url: String,
    pub map_image_url: String,
    pub owner: String,
    pub owner_id: String,
    pub oid: String,
}

/// Denormalized id+name snapshot of a referenced entity, captured at write
/// time. Not a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: u64,
    pub name: String,
}

/// One player's outcome in one race instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceResult {
    pub id: u64,
    /// 1 = fastest.
    pub position: u32,
    /// Derived: always recomputed from `position` and the points config.
    pub points_earned: i64,
    pub finish_time: String,
    /// `None` when the entered time could not be parsed.
    pub finish_time_ms: Option<i64>,
    /// Legacy alias of `finish_time`, still written for older clients.
    pub lap_time: String,
    pub race_date: String,
    pub week_number: u32,
    pub notes: String,
    pub player: Option<EntityRef>,
    pub zone: Option<EntityRef>,
}

impl Default for RaceResult {
    fn default() -> Self {
        Self {
            id: 0,
            position: 1,
            points_earned: 0,
            finish_time: String::new(),
            finish_time_ms: None,
            lap_time: String::new(),
            race_date: String::new(),
            week_number: 1,
            notes: String::new(),
            player: None,
            zone: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_deserializes_from_partial_document() {
        let player: Player =
            serde_json::from_str(r#"{"id": 3, "name": "Dusty"}"#).expect("deserialize");
        assert_eq!(player.id, 3);
        assert_eq!(player.status, "active");
        assert!(player.race_results.is_empty());
        assert_eq!(player.best_finish_time_ms, None);
    }

    #[test]
    fn zone_defaults_to_week_one() {
        let zone: Zone = serde_json::from_str(r#"{"id": 1, "name": "Dunes"}"#).expect("deserialize");
        assert_eq!(zone.week_number, 1);
        assert!(!zone.is_active);
        assert!(zone.map_data.is_none());
    }

    #[test]
    fn race_result_round_trips() {
        let result = RaceResult {
            id: 7,
            position: 2,
            points_earned: 9,
            finish_time: "01:23.456".to_string(),
            finish_time_ms: Some(83_456),
            lap_time: "01:23.456".to_string(),
            race_date: "2025-10-18T20:00:00.000Z".to_string(),
            week_number: 1,
            notes: String::new(),
            player: Some(EntityRef {
                id: 1,
                name: "Dusty".to_string(),
            }),
            zone: Some(EntityRef {
                id: 2,
                name: "Dunes".to_string(),
            }),
        };
        let raw = serde_json::to_string(&result).expect("serialize");
        let back: RaceResult = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, result);
    }
}
