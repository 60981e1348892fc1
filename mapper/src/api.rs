use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use shared::{ApiError, FieldMetadata, GeocodeHit, OptimizeRequest, OptimizeResponse};

use crate::config::MapperConfig;
use crate::error::MapperError;

/// Backend service computing a route through the profiles matching a query.
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Returns whatever the service answered; a reply without a route is
    /// still `Ok`, only transport and decoding problems are errors.
    async fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizeResponse, MapperError>;
}

/// Free-text address lookup. An empty list means the address is unknown.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeHit>, MapperError>;
}

/// Filterable fields, their legal values and their human descriptions.
#[async_trait]
pub trait FieldCatalog: Send + Sync {
    async fn fields(&self) -> Result<BTreeMap<String, String>, MapperError>;
    async fn valid_values(&self, field: &str) -> Result<Vec<String>, MapperError>;
    async fn field_metadata(&self, field: &str) -> Result<Vec<FieldMetadata>, MapperError>;
}

/// HTTP client for the profiles backend.
#[derive(Debug, Clone)]
pub struct ProfileApi {
    client: reqwest::Client,
    base: String,
}

impl ProfileApi {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, MapperError> {
        let base = base.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| MapperError::Http {
                url: base.clone(),
                source,
            })?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &MapperConfig) -> Result<Self, MapperError> {
        Self::new(&config.api_base, config.http_timeout)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, Vec<u8>), MapperError> {
        let http = |source| MapperError::Http {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(http)?;
        let status = response.status();
        let body = response.bytes().await.map_err(http)?;
        Ok((status, body.to_vec()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MapperError> {
        tracing::debug!("GET {url} {query:?}");
        let (status, body) = self.send(url, self.client.get(url).query(query)).await?;
        if !status.is_success() {
            return Err(status_error(url, status, &body));
        }
        decode(url, &body)
    }
}

#[async_trait]
impl Optimizer for ProfileApi {
    async fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizeResponse, MapperError> {
        let url = self.url("/profiles/optimize");
        tracing::debug!(
            "POST {url} start=({:.5},{:.5}) filters={:?}",
            request.start_lat,
            request.start_lon,
            request.filters
        );
        let (status, body) = self.send(&url, self.client.post(&url).json(request)).await?;

        // The service explains empty results in the body, sometimes with an
        // error status; keep the body whenever it decodes.
        match serde_json::from_slice::<OptimizeResponse>(&body) {
            Ok(response) => {
                if !status.is_success() {
                    tracing::warn!("optimize answered {status}");
                }
                Ok(response)
            }
            Err(_) if !status.is_success() => Err(status_error(&url, status, &body)),
            Err(source) => Err(MapperError::Decode { url, source }),
        }
    }
}

#[async_trait]
impl Geocoder for ProfileApi {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeHit>, MapperError> {
        let url = self.url("/geocode");
        self.get_json(&url, &[("q", query)]).await
    }
}

#[async_trait]
impl FieldCatalog for ProfileApi {
    async fn fields(&self) -> Result<BTreeMap<String, String>, MapperError> {
        let url = self.url("/profiles/fields");
        let raw: BTreeMap<String, Value> = self.get_json(&url, &[]).await?;
        Ok(raw
            .into_iter()
            .map(|(field, kind)| (field, value_to_string(&kind).unwrap_or_default()))
            .collect())
    }

    async fn valid_values(&self, field: &str) -> Result<Vec<String>, MapperError> {
        let url = self.url("/profiles/valid_values");
        let raw: Vec<Value> = self.get_json(&url, &[("field", field)]).await?;
        let mut values: Vec<String> = raw
            .iter()
            .filter_map(value_to_string)
            .filter(|v| !v.trim().is_empty())
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    async fn field_metadata(&self, field: &str) -> Result<Vec<FieldMetadata>, MapperError> {
        let url = self.url(&format!(
            "/profiles/field_metadata/{}",
            urlencoding::encode(field)
        ));
        let raw: OneOrMany<FieldMetadata> = self.get_json(&url, &[]).await?;
        Ok(raw.into_vec())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, MapperError> {
    serde_json::from_slice(body).map_err(|source| MapperError::Decode {
        url: url.to_string(),
        source,
    })
}

fn status_error(url: &str, status: reqwest::StatusCode, body: &[u8]) -> MapperError {
    let message = serde_json::from_slice::<ApiError>(body)
        .map(|err| err.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).chars().take(200).collect());
    MapperError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        message,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_is_trimmed() {
        let api = ProfileApi::new("http://localhost:8000///", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base(), "http://localhost:8000");
        assert_eq!(
            api.url("/profiles/optimize"),
            "http://localhost:8000/profiles/optimize"
        );
    }

    #[test]
    fn status_error_prefers_api_message() {
        let err = status_error(
            "http://x/geocode",
            reqwest::StatusCode::BAD_GATEWAY,
            br#"{"error": "HTTP error: 502"}"#,
        );
        match err {
            MapperError::Status {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "HTTP error: 502");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn metadata_accepts_object_or_list() {
        let one: OneOrMany<FieldMetadata> =
            serde_json::from_value(json!({"field_name": "origin", "label": "Ethnicity"})).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: OneOrMany<FieldMetadata> = serde_json::from_value(json!([
            {"field_name": "origin", "visible": true},
            {"field_name": "origin", "visible": false}
        ]))
        .unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn values_render_as_strings() {
        assert_eq!(value_to_string(&json!("left")), Some("left".into()));
        assert_eq!(value_to_string(&json!(7)), Some("7".into()));
        assert_eq!(value_to_string(&Value::Null), None);
    }
}
