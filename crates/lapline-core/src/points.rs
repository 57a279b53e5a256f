//! Scoring policy: finishing position to awarded points.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Built-in point values for positions 1 through 10.
pub const DEFAULT_POINTS: [i64; 10] = [10, 9, 8, 7, 6, 5, 4, 3, 2, 1];

/// Built-in fallback for positions beyond the explicit table.
pub const DEFAULT_FALLBACK: i64 = 1;

/// A total mapping from finishing position to points.
///
/// Always fully defined: construction goes through [`PointsConfig::normalize`],
/// which substitutes the built-in defaults for missing, non-numeric, or
/// negative entries. The wire shape is the historical
/// `{"1": 10, ..., "10": 1, "default": 1}` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsConfig {
    positions: [i64; 10],
    fallback: i64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            positions: DEFAULT_POINTS,
            fallback: DEFAULT_FALLBACK,
        }
    }
}

impl PointsConfig {
    /// Build a config from an arbitrary JSON value, defending every entry.
    ///
    /// Accepts numbers or numeric strings; anything non-finite or negative
    /// falls back to the built-in default for that slot. The fallback may be
    /// spelled `default` or the older `fallback`. Idempotent:
    /// `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(raw: &serde_json::Value) -> Self {
        let source = raw.as_object();
        let mut positions = DEFAULT_POINTS;
        for (index, slot) in positions.iter_mut().enumerate() {
            let key = (index + 1).to_string();
            if let Some(value) = source.and_then(|obj| obj.get(&key)).and_then(coerce_points) {
                *slot = value;
            }
        }
        let fallback = source
            .and_then(|obj| obj.get("default").or_else(|| obj.get("fallback")))
            .and_then(coerce_points)
            .unwrap_or(DEFAULT_FALLBACK);
        Self {
            positions,
            fallback,
        }
    }

    /// Points awarded for a finishing position. Positions outside 1..=10 take
    /// the fallback value.
    pub fn points_for(&self, position: u32) -> i64 {
        match position {
            1..=10 => self.positions[(position - 1) as usize],
            _ => self.fallback,
        }
    }

    pub fn fallback(&self) -> i64 {
        self.fallback
    }
}

/// JS-style numeric coercion: numbers and numeric strings qualify, anything
/// non-finite or negative does not.
fn coerce_points(value: &serde_json::Value) -> Option<i64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number >= 0.0).then_some(number as i64)
}

impl Serialize for PointsConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(11))?;
        for (index, points) in self.positions.iter().enumerate() {
            map.serialize_entry(&(index + 1).to_string(), points)?;
        }
        map.serialize_entry("default", &self.fallback)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for PointsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Loading normalizes, so a hand-edited or partial table still yields a
        // total mapping.
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}
