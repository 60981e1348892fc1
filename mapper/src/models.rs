use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use shared::{Coordinate, FilterValue, OptimizeRequest, OptimizeResponse};

/// Backend field name → criterion. Never contains empty values.
pub type FilterCriteria = BTreeMap<String, FilterValue>;

/// A search ready for the optimizer: the start is always concrete numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteQuery {
    pub start: Coordinate,
    pub filters: FilterCriteria,
}

impl RouteQuery {
    pub fn to_request(&self) -> OptimizeRequest {
        OptimizeRequest {
            start_lat: self.start.lat,
            start_lon: self.start.lon,
            filters: self.filters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMarker {
    /// Backend identifier; the only key used for selection equality.
    pub stable_id: String,
    pub position: Coordinate,
    /// 1-based position in the optimizer reply, valid for this result set only.
    pub display_index: usize,
    pub attributes: Map<String, Value>,
}

impl ProfileMarker {
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute_str("name")
    }

    pub fn color(&self) -> Option<&str> {
        self.attribute_str("color")
    }

    /// Tooltip text, e.g. `#3 – Jane`.
    pub fn label(&self) -> String {
        format!("#{} – {}", self.display_index, self.name().unwrap_or("Unknown"))
    }
}

/// Normalized optimizer reply, every coordinate in (lat, lon) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub start: Coordinate,
    pub path: Vec<Coordinate>,
    pub markers: Vec<ProfileMarker>,
}
