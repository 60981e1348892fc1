use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both axes finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A single filter criterion as the backend expects it.
///
/// Ranges serialize as `{"gte": n}`, everything else as the bare value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range { gte: Number },
    Equals(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub start_lat: f64,
    pub start_lon: f64,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
}

/// Route geometry as returned by the optimizer, GeoJSON style: `[lon, lat]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<Vec<f64>>,
}

/// Raw optimize reply. Every field is optional: a reply without `route` or
/// `start` means "no result" and usually carries a `message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteGeometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<Vec<Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeHit {
    #[serde(deserialize_with = "lenient_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub lon: f64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<Value>,
}

impl GeocodeHit {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub field_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(alias = "error")]
    pub message: String,
}

// Geocoders in the wild (Nominatim) send coordinates as strings.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
