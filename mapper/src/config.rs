use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use shared::Coordinate;

use crate::error::MapperError;
use crate::geolocation::PositionOptions;
use crate::trimmer::DEFAULT_TRIM_THRESHOLD_DEG;

/// Initial map centre, also restored on reset.
pub const DEFAULT_CENTER: Coordinate = Coordinate {
    lat: 45.45,
    lon: -73.64,
};

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GEOCODE_CACHE: usize = 64;

#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub api_base: String,
    pub http_timeout: Duration,
    pub geocode_cache_size: NonZeroUsize,
    pub tracking: PositionOptions,
    pub trim_threshold_deg: f64,
    pub default_center: Coordinate,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            geocode_cache_size: NonZeroUsize::new(DEFAULT_GEOCODE_CACHE)
                .unwrap_or(NonZeroUsize::MIN),
            tracking: PositionOptions::default(),
            trim_threshold_deg: DEFAULT_TRIM_THRESHOLD_DEG,
            default_center: DEFAULT_CENTER,
        }
    }
}

impl MapperConfig {
    /// Read `MAPPER_*` variables from the process environment.
    pub fn from_env() -> Result<Self, MapperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, MapperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base) = lookup("MAPPER_API_BASE") {
            let base = base.trim().trim_end_matches('/');
            if base.is_empty() {
                return Err(MapperError::Config("MAPPER_API_BASE is empty".into()));
            }
            config.api_base = base.to_string();
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "MAPPER_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "MAPPER_GEOCODE_CACHE")? {
            config.geocode_cache_size = NonZeroUsize::new(size).ok_or_else(|| {
                MapperError::Config("MAPPER_GEOCODE_CACHE must be at least 1".into())
            })?;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "MAPPER_TRACK_INTERVAL_SECS")? {
            config.tracking.min_interval = Duration::from_secs(secs);
        }
        if let Some(meters) = parse_var::<f64, _>(&lookup, "MAPPER_TRACK_MAX_ACCURACY_M")? {
            config.tracking.max_accuracy_m = Some(meters);
        }
        if let Some(threshold) = parse_var::<f64, _>(&lookup, "MAPPER_TRIM_THRESHOLD_DEG")? {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(MapperError::Config(format!(
                    "MAPPER_TRIM_THRESHOLD_DEG must be positive, got {threshold}"
                )));
            }
            config.trim_threshold_deg = threshold;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, MapperError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| MapperError::Config(format!("{key}={raw:?}: {err}"))),
    }
}
