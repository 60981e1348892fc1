use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Number, Value};
use shared::{Coordinate, FilterValue};

use crate::models::{FilterCriteria, RouteQuery};
use crate::notice::Notice;
use crate::resolver::AddressResolver;

/// Raw form state: UI field name → whatever the input produced.
pub type RawFilters = BTreeMap<String, Value>;

pub const START_LAT_KEY: &str = "start_lat";
pub const START_LON_KEY: &str = "start_lon";
pub const START_ADDRESS_KEY: &str = "startAddress";

/// Filtered as `{gte: n}` instead of equality.
pub const MIN_SCORE_FIELD: &str = "min_score_vote";

/// UI field name → backend field name. Unlisted names pass through.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("ethnicity", "origin"),
    ("political_alignment", "political_lean"),
    (MIN_SCORE_FIELD, "score_vote"),
];

const HELPER_KEYS: &[&str] = &[START_LAT_KEY, START_LON_KEY, START_ADDRESS_KEY];

pub fn backend_field(ui_field: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(ui, _)| *ui == ui_field)
        .map(|(_, backend)| *backend)
        .unwrap_or(ui_field)
}

/// Where the start of a built query came from.
#[derive(Debug, Clone, PartialEq)]
pub enum StartSource {
    Explicit,
    Address(String),
    Device,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub query: RouteQuery,
    pub source: StartSource,
    pub notices: Vec<Notice>,
}

/// Turns raw form state into a [`RouteQuery`].
pub struct FilterQueryBuilder {
    resolver: AddressResolver,
    known_fields: Option<BTreeSet<String>>,
}

impl FilterQueryBuilder {
    pub fn new(resolver: AddressResolver) -> Self {
        Self {
            resolver,
            known_fields: None,
        }
    }

    /// Restricts filters to backend-declared fields. Until called, every key passes.
    pub fn set_known_fields<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.known_fields = Some(fields.into_iter().collect());
    }

    /// Resolves the start (explicit coordinates, then address, then
    /// `device`) and cleans the filters. Geocoding problems never fail the
    /// build; they fall back to `device` with a notice.
    pub async fn build(&mut self, raw: &RawFilters, device: Coordinate) -> BuiltQuery {
        let mut notices = Vec::new();

        let (start, source) = if let Some(start) = explicit_start(raw) {
            (start, StartSource::Explicit)
        } else if let Some(address) = start_address(raw) {
            match self.resolver.resolve(address).await {
                Ok(Some(start)) => (start, StartSource::Address(address.to_string())),
                Ok(None) => {
                    tracing::warn!("address {address:?} did not resolve, using device position");
                    notices.push(Notice::AddressUnresolved {
                        address: address.to_string(),
                    });
                    (device, StartSource::Device)
                }
                Err(err) => {
                    tracing::warn!("geocoding {address:?} failed: {err}");
                    notices.push(Notice::AddressUnresolved {
                        address: address.to_string(),
                    });
                    (device, StartSource::Device)
                }
            }
        } else {
            (device, StartSource::Device)
        };

        let (filters, filter_notices) = clean_filters(raw, self.known_fields.as_ref());
        notices.extend(filter_notices);

        tracing::debug!(
            "built query start=({:.5},{:.5}) source={source:?} filters={filters:?}",
            start.lat,
            start.lon
        );

        BuiltQuery {
            query: RouteQuery { start, filters },
            source,
            notices,
        }
    }
}

/// True when the raw state overrides the device position (typed address or
/// coordinates picked from address suggestions).
pub fn has_start_override(raw: &RawFilters) -> bool {
    explicit_start(raw).is_some() || start_address(raw).is_some()
}

/// Both `start_lat` and `start_lon` present, numeric and in range.
pub fn explicit_start(raw: &RawFilters) -> Option<Coordinate> {
    let lat = raw.get(START_LAT_KEY).and_then(as_f64)?;
    let lon = raw.get(START_LON_KEY).and_then(as_f64)?;
    Some(Coordinate::new(lat, lon)).filter(Coordinate::is_valid)
}

pub fn start_address(raw: &RawFilters) -> Option<&str> {
    raw.get(START_ADDRESS_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|address| !address.is_empty())
}

/// Aliases field names, drops empty values and helper keys, and turns the
/// minimum score into a `gte` range.
pub fn clean_filters(
    raw: &RawFilters,
    known_fields: Option<&BTreeSet<String>>,
) -> (FilterCriteria, Vec<Notice>) {
    let mut filters = FilterCriteria::new();
    let mut notices = Vec::new();

    for (ui_field, value) in raw {
        if HELPER_KEYS.contains(&ui_field.as_str()) || is_empty(value) {
            continue;
        }

        let field = backend_field(ui_field);
        if let Some(known) = known_fields {
            if !known.contains(field) {
                tracing::warn!("dropping filter {ui_field:?}: backend has no field {field:?}");
                notices.push(Notice::UnknownFilter {
                    field: ui_field.clone(),
                });
                continue;
            }
        }

        let criterion = if ui_field == MIN_SCORE_FIELD {
            match as_number(value) {
                Some(gte) => FilterValue::Range { gte },
                None => {
                    notices.push(Notice::InvalidFilterValue {
                        field: ui_field.clone(),
                        value: display_value(value),
                    });
                    continue;
                }
            }
        } else {
            FilterValue::Equals(value.clone())
        };
        filters.insert(field.to_string(), criterion);
    }

    (filters, notices)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// Integers stay integers on the wire ("7" → 7, not 7.0).
fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Number::from)
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
        }
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc};

    use async_trait::async_trait;
    use serde_json::json;
    use shared::GeocodeHit;

    use super::*;
    use crate::api::Geocoder;
    use crate::error::MapperError;

    struct FixedGeocoder(Result<Vec<GeocodeHit>, ()>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, query: &str) -> Result<Vec<GeocodeHit>, MapperError> {
            match &self.0 {
                Ok(hits) => Ok(hits.clone()),
                Err(()) => Err(MapperError::Status {
                    url: format!("/geocode?q={query}"),
                    status: 500,
                    message: "boom".into(),
                }),
            }
        }
    }

    fn builder(hits: Result<Vec<GeocodeHit>, ()>) -> FilterQueryBuilder {
        let resolver = AddressResolver::new(
            Arc::new(FixedGeocoder(hits)),
            NonZeroUsize::new(8).unwrap(),
        );
        FilterQueryBuilder::new(resolver)
    }

    fn raw(value: Value) -> RawFilters {
        serde_json::from_value(value).unwrap()
    }

    fn montreal_hit() -> GeocodeHit {
        GeocodeHit {
            lat: 45.5,
            lon: -73.6,
            display_name: "123 Main St".into(),
            place_id: Some(json!(1)),
        }
    }

    const DEVICE: Coordinate = Coordinate {
        lat: 45.0,
        lon: -73.0,
    };

    #[tokio::test]
    async fn address_wins_over_device_and_empty_filters_drop() {
        let mut builder = builder(Ok(vec![montreal_hit()]));
        let input = raw(json!({
            "ethnicity": "",
            "min_score_vote": "7",
            "startAddress": "123 Main St"
        }));
        let built = builder.build(&input, DEVICE).await;

        assert_eq!(built.query.start, Coordinate::new(45.5, -73.6));
        assert_eq!(built.source, StartSource::Address("123 Main St".into()));
        assert!(built.notices.is_empty());
        assert_eq!(
            serde_json::to_value(&built.query.filters).unwrap(),
            json!({"score_vote": {"gte": 7}})
        );
    }

    #[tokio::test]
    async fn explicit_coordinates_beat_address() {
        let mut builder = builder(Ok(vec![montreal_hit()]));
        let input = raw(json!({
            "start_lat": "46.1",
            "start_lon": -72.5,
            "startAddress": "123 Main St"
        }));
        let built = builder.build(&input, DEVICE).await;

        assert_eq!(built.query.start, Coordinate::new(46.1, -72.5));
        assert_eq!(built.source, StartSource::Explicit);
        assert!(built.query.filters.is_empty());
    }

    #[tokio::test]
    async fn unresolved_address_falls_back_with_notice() {
        let mut builder = builder(Ok(vec![]));
        let built = builder
            .build(&raw(json!({"startAddress": "nowhere"})), DEVICE)
            .await;

        assert_eq!(built.query.start, DEVICE);
        assert_eq!(built.source, StartSource::Device);
        assert_eq!(
            built.notices,
            vec![Notice::AddressUnresolved {
                address: "nowhere".into()
            }]
        );
    }

    #[tokio::test]
    async fn geocoder_failure_falls_back_with_notice() {
        let mut builder = builder(Err(()));
        let built = builder
            .build(&raw(json!({"startAddress": "123 Main St"})), DEVICE)
            .await;
        assert_eq!(built.query.start, DEVICE);
        assert_eq!(built.notices.len(), 1);
    }

    #[tokio::test]
    async fn no_override_uses_device() {
        let mut builder = builder(Ok(vec![montreal_hit()]));
        let built = builder
            .build(&raw(json!({"startAddress": "   ", "nbhood": "Plateau"})), DEVICE)
            .await;
        assert_eq!(built.query.start, DEVICE);
        assert_eq!(
            built.query.filters.get("nbhood"),
            Some(&FilterValue::Equals(json!("Plateau")))
        );
    }

    #[test]
    fn aliases_translate_and_unknown_names_pass_through() {
        let (filters, notices) = clean_filters(
            &raw(json!({
                "ethnicity": "Haitian",
                "political_alignment": "left",
                "preferred_language": "fr"
            })),
            None,
        );
        assert!(notices.is_empty());
        assert_eq!(
            serde_json::to_value(&filters).unwrap(),
            json!({"origin": "Haitian", "political_lean": "left", "preferred_language": "fr"})
        );
    }

    #[test]
    fn empty_values_and_helper_keys_never_reach_filters() {
        let (filters, _) = clean_filters(
            &raw(json!({
                "origin": null,
                "nbhood": "",
                "age": "  ",
                "start_lat": 45.0,
                "start_lon": -73.0,
                "startAddress": "123 Main St"
            })),
            None,
        );
        assert!(filters.is_empty());
    }

    #[test]
    fn min_score_is_always_a_range() {
        let (filters, _) = clean_filters(&raw(json!({"min_score_vote": 3})), None);
        assert_eq!(
            filters.get("score_vote"),
            Some(&FilterValue::Range {
                gte: Number::from(3)
            })
        );

        let (filters, _) = clean_filters(&raw(json!({"min_score_vote": " 6.5 "})), None);
        assert_eq!(
            serde_json::to_value(&filters).unwrap(),
            json!({"score_vote": {"gte": 6.5}})
        );
    }

    #[test]
    fn non_numeric_min_score_is_dropped_with_notice() {
        let (filters, notices) = clean_filters(&raw(json!({"min_score_vote": "high"})), None);
        assert!(filters.is_empty());
        assert_eq!(
            notices,
            vec![Notice::InvalidFilterValue {
                field: "min_score_vote".into(),
                value: "high".into()
            }]
        );
    }

    #[test]
    fn known_fields_reject_undeclared_filters() {
        let known: BTreeSet<String> = ["origin", "score_vote"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (filters, notices) = clean_filters(
            &raw(json!({"ethnicity": "Haitian", "shoe_size": "42", "min_score_vote": "5"})),
            Some(&known),
        );
        assert_eq!(filters.len(), 2);
        assert!(filters.contains_key("origin"));
        assert_eq!(
            notices,
            vec![Notice::UnknownFilter {
                field: "shoe_size".into()
            }]
        );
    }

    #[test]
    fn explicit_start_needs_both_axes() {
        assert_eq!(explicit_start(&raw(json!({"start_lat": "45.0"}))), None);
        assert_eq!(
            explicit_start(&raw(json!({"start_lat": "45.0", "start_lon": "abc"}))),
            None
        );
        assert_eq!(
            explicit_start(&raw(json!({"start_lat": "45.0", "start_lon": "-73.0"}))),
            Some(Coordinate::new(45.0, -73.0))
        );
        assert!(has_start_override(&raw(json!({"startAddress": "x"}))));
        assert!(!has_start_override(&raw(json!({"startAddress": ""}))));
    }
}
