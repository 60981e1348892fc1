use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use shared::{Coordinate, GeocodeHit};

use crate::api::Geocoder;
use crate::error::MapperError;

/// Address to coordinate resolution with a small memo of past successes.
pub struct AddressResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: LruCache<String, Coordinate>,
}

impl AddressResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, capacity: NonZeroUsize) -> Self {
        Self {
            geocoder,
            cache: LruCache::new(capacity),
        }
    }

    /// First usable hit for `address`, `Ok(None)` when nothing matches.
    /// Blank input never reaches the geocoder.
    pub async fn resolve(&mut self, address: &str) -> Result<Option<Coordinate>, MapperError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        let key = address.to_lowercase();
        if let Some(coord) = self.cache.get(&key) {
            tracing::debug!("geocode cache hit for {address:?}");
            return Ok(Some(*coord));
        }

        let hits = self.geocoder.geocode(address).await?;
        let resolved = hits
            .iter()
            .map(GeocodeHit::coordinate)
            .find(Coordinate::is_valid);

        match resolved {
            Some(coord) => {
                tracing::debug!(
                    "resolved {address:?} to ({:.5},{:.5})",
                    coord.lat,
                    coord.lon
                );
                self.cache.put(key, coord);
            }
            None => tracing::debug!("no geocode result for {address:?}"),
        }
        Ok(resolved)
    }

    /// All candidates for an address being typed, best first.
    pub async fn suggestions(&self, query: &str) -> Result<Vec<GeocodeHit>, MapperError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.geocoder.geocode(query).await
    }
}
