use serde_json::{Map, Value};
use shared::{Coordinate, OptimizeResponse};

use crate::models::{ProfileMarker, RouteResult};

const ID_KEY: &str = "id";
const LAT_KEY: &str = "lat";
const LON_KEY: &str = "lon";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("optimizer reply has no route")]
    MissingRoute,
    #[error("optimizer reply has no start")]
    MissingStart,
    #[error("route point {index} is not a valid [lon, lat] pair")]
    PathPoint { index: usize },
    #[error("marker {index} has no usable id")]
    MarkerId { index: usize },
    #[error("marker {index} has no usable coordinates")]
    MarkerPosition { index: usize },
}

impl NormalizeError {
    /// True for replies that simply carry no result, as opposed to broken ones.
    pub fn is_empty_reply(&self) -> bool {
        matches!(self, NormalizeError::MissingRoute | NormalizeError::MissingStart)
    }
}

/// Converts a raw optimizer reply into map-ready data.
///
/// The route arrives as GeoJSON `[lon, lat]` pairs and is swapped to
/// `(lat, lon)`. Markers get their 1-based reply position as display index;
/// `id` becomes the stable id, `lat`/`lon` become the position, and every
/// other key is kept verbatim as an attribute.
pub fn normalize(response: OptimizeResponse) -> Result<RouteResult, NormalizeError> {
    let route = response.route.ok_or(NormalizeError::MissingRoute)?;
    let start = response.start.ok_or(NormalizeError::MissingStart)?;

    let path = route
        .coordinates
        .iter()
        .enumerate()
        .map(|(index, pair)| swap_axes(pair).ok_or(NormalizeError::PathPoint { index }))
        .collect::<Result<Vec<_>, _>>()?;

    let markers = response
        .markers
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, raw)| normalize_marker(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouteResult {
        start,
        path,
        markers,
    })
}

fn swap_axes(pair: &[f64]) -> Option<Coordinate> {
    match pair {
        [lon, lat, ..] => Some(Coordinate::new(*lat, *lon)).filter(Coordinate::is_valid),
        _ => None,
    }
}

fn normalize_marker(
    index: usize,
    mut raw: Map<String, Value>,
) -> Result<ProfileMarker, NormalizeError> {
    let stable_id = raw
        .remove(ID_KEY)
        .and_then(|value| identity(&value))
        .ok_or(NormalizeError::MarkerId { index })?;

    let lat = raw.remove(LAT_KEY).as_ref().and_then(number);
    let lon = raw.remove(LON_KEY).as_ref().and_then(number);
    let position = match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
        _ => None,
    }
    .filter(Coordinate::is_valid)
    .ok_or(NormalizeError::MarkerPosition { index })?;

    Ok(ProfileMarker {
        stable_id,
        position,
        display_index: index + 1,
        attributes: raw,
    })
}

// Backend ids are database integers today; strings are accepted too.
fn identity(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
