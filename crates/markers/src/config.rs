use std::env;

use log::warn;

/// Reports closer than this to an existing marker are merged into it.
pub const DEFAULT_MERGE_DISTANCE_KM: f64 = 0.025;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerConfig {
    pub merge_distance_km: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            merge_distance_km: DEFAULT_MERGE_DISTANCE_KM,
        }
    }
}

impl MarkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup("MARKER_MERGE_DISTANCE_KM") {
            match raw.trim().parse::<f64>() {
                Ok(distance) if distance.is_finite() && distance >= 0.0 => {
                    config.merge_distance_km = distance
                }
                _ => warn!(
                    "ignoring invalid MARKER_MERGE_DISTANCE_KM '{}', using {} km.",
                    raw, config.merge_distance_km
                ),
            }
        }
        config
    }
}
