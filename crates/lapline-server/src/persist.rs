//! Persistence gateway: the whole dataset as one pretty-printed JSON document.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use lapline_core::model::{Player, RaceResult, Tournament, Zone};
use lapline_core::points::PointsConfig;
use lapline_core::seed;
use lapline_core::store::TournamentStore;

/// The persisted document. Every key is optional on load; a missing key falls
/// back to the built-in seed records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "one_or_many")]
    pub tournament: Option<Tournament>,
    #[serde(default)]
    pub players: Option<Vec<Player>>,
    #[serde(default)]
    pub zones: Option<Vec<Zone>>,
    #[serde(rename = "raceResults", default)]
    pub race_results: Option<Vec<RaceResult>>,
    #[serde(rename = "pointsConfig", default)]
    pub points_config: Option<PointsConfig>,
}

/// Older documents stored the tournament as a one-element collection;
/// normalize either shape to a single record on load.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(
        match Option::<OneOrMany<T>>::deserialize(deserializer)? {
            None => None,
            Some(OneOrMany::One(value)) => Some(value),
            Some(OneOrMany::Many(values)) => values.into_iter().next(),
        },
    )
}

impl Snapshot {
    pub fn of(store: &TournamentStore) -> Self {
        Self {
            tournament: Some(store.tournament.clone()),
            players: Some(store.players.clone()),
            zones: Some(store.zones.clone()),
            race_results: Some(store.race_results.clone()),
            points_config: Some(store.points_config.clone()),
        }
    }

    /// Build the in-memory store, seeding any missing key and running the
    /// startup recalculation so no persisted derived value is trusted.
    pub fn into_store(self) -> TournamentStore {
        let tournament = self.tournament.unwrap_or_else(seed::tournament);
        // Config precedence: explicit key, then the tournament's embedded copy
        let points_config = self
            .points_config
            .unwrap_or_else(|| tournament.points_config.clone());
        TournamentStore::new(
            tournament,
            self.players.unwrap_or_else(seed::players),
            self.zones.unwrap_or_else(seed::zones),
            self.race_results.unwrap_or_else(seed::race_results),
            points_config,
        )
    }
}

/// Handle on the backing JSON file.
#[derive(Debug, Clone)]
pub struct DataFile {
    path: PathBuf,
}

impl DataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. Absent or unparsable files yield `None`; the caller
    /// falls back to the built-in defaults.
    pub fn load(&self) -> Option<Snapshot> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Failed to parse data file, falling back to defaults: {e}"
                );
                None
            },
        }
    }

    /// Overwrite the backing file. Errors propagate: a failed save means the
    /// mutation did not durably happen.
    pub async fn save(&self, snapshot: &Snapshot) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec_pretty(snapshot).map_err(std::io::Error::other)?;
        tokio::fs::write(&self.path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lapline-persist-{}-{name}.json", std::process::id()))
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let data = DataFile::new(temp_path("round-trip"));
        let store = Snapshot::default().into_store();
        let snapshot = Snapshot::of(&store);

        data.save(&snapshot).await.expect("save");
        let loaded = data.load().expect("load");
        assert_eq!(loaded.players.as_ref().map(Vec::len), Some(store.players.len()));
        assert_eq!(
            loaded.tournament.map(|t| t.title),
            Some(store.tournament.title.clone())
        );

        let _ = std::fs::remove_file(data.path());
    }

    #[test]
    fn load_missing_file_is_none() {
        let data = DataFile::new(temp_path("missing"));
        assert!(data.load().is_none());
    }

    #[test]
    fn load_invalid_json_is_none() {
        let path = temp_path("garbage");
        std::fs::write(&path, b"{ not json").expect("write");
        assert!(DataFile::new(&path).load().is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_keys_fall_back_to_seeds() {
        let store = Snapshot::default().into_store();
        assert!(!store.players.is_empty());
        assert!(!store.zones.is_empty());
        assert!(!store.race_results.is_empty());
        assert!(!store.tournament.title.is_empty());
    }

    #[test]
    fn tournament_accepts_single_object_or_collection() {
        let single: Snapshot =
            serde_json::from_str(r#"{"tournament": {"id": 1, "title": "Solo"}}"#).expect("parse");
        assert_eq!(single.tournament.map(|t| t.title), Some("Solo".to_string()));

        let collection: Snapshot =
            serde_json::from_str(r#"{"tournament": [{"id": 1, "title": "Listed"}]}"#)
                .expect("parse");
        assert_eq!(
            collection.tournament.map(|t| t.title),
            Some("Listed".to_string())
        );

        let empty: Snapshot = serde_json::from_str(r#"{"tournament": []}"#).expect("parse");
        assert!(empty.tournament.is_none());
    }

    #[test]
    fn points_config_prefers_explicit_key_over_tournament_copy() {
        let raw = r#"{
            "tournament": {"id": 1, "title": "T", "points_config": {"1": 50}},
            "pointsConfig": {"1": 20},
            "players": [], "zones": [], "raceResults": []
        }"#;
        let snapshot: Snapshot = serde_json::from_str(raw).expect("parse");
        let store = snapshot.into_store();
        assert_eq!(store.points_config.points_for(1), 20);
        // recalculation re-embeds the live config into the tournament
        assert_eq!(store.tournament.points_config.points_for(1), 20);
    }

    #[test]
    fn embedded_tournament_config_used_when_key_absent() {
        let raw = r#"{
            "tournament": {"id": 1, "title": "T", "points_config": {"1": 50}},
            "players": [], "zones": [], "raceResults": []
        }"#;
        let store = serde_json::from_str::<Snapshot>(raw).expect("parse").into_store();
        assert_eq!(store.points_config.points_for(1), 50);
    }

    #[test]
    fn derived_fields_are_recomputed_on_load() {
        let raw = r#"{
            "tournament": {"id": 1, "title": "T"},
            "players": [{"id": 1, "name": "Dusty", "total_points": 999}],
            "zones": [],
            "raceResults": [{
                "id": 1, "position": 1, "points_earned": 0,
                "finish_time": "1:30.000", "week_number": 1,
                "player": {"id": 1, "name": "Dusty"}
            }]
        }"#;
        let store = serde_json::from_str::<Snapshot>(raw).expect("parse").into_store();
        // persisted total_points ignored, recomputed from results
        assert_eq!(store.player(1).map(|p| p.total_points), Some(10));
        assert_eq!(store.race_result(1).map(|r| r.points_earned), Some(10));
    }
}
