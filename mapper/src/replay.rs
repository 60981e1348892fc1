use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    time::Duration,
};

use async_trait::async_trait;
use shared::Coordinate;
use tokio::sync::mpsc;

use crate::error::MapperError;
use crate::geolocation::{GeoError, GeoPositionProvider, PositionFix, PositionOptions};

/// Plays back a recorded GPX track as if it were the device moving.
#[derive(Debug, Clone)]
pub struct GpxReplayProvider {
    points: Vec<Coordinate>,
    step: Duration,
}

impl GpxReplayProvider {
    pub fn from_path(path: &Path, step: Duration) -> Result<Self, MapperError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), step)
    }

    /// Track points in document order; falls back to plain waypoints when
    /// the file has no track.
    pub fn from_reader<R: Read>(reader: R, step: Duration) -> Result<Self, MapperError> {
        let gpx = gpx::read(reader)?;

        let mut points: Vec<Coordinate> = gpx
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
            .map(to_coordinate)
            .collect();
        if points.is_empty() {
            points = gpx.waypoints.iter().map(to_coordinate).collect();
        }
        points.retain(Coordinate::is_valid);

        if points.is_empty() {
            return Err(MapperError::EmptyTrack);
        }
        tracing::debug!("loaded {} replay points", points.len());
        Ok(Self { points, step })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }
}

#[async_trait]
impl GeoPositionProvider for GpxReplayProvider {
    async fn current_position(&self, _options: &PositionOptions) -> Result<PositionFix, GeoError> {
        self.points
            .first()
            .map(|coord| PositionFix::now(*coord, None))
            .ok_or_else(|| GeoError::Unavailable("empty replay track".into()))
    }

    fn watch_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<mpsc::Receiver<PositionFix>, GeoError> {
        let points = self.points.clone();
        let step = self.step;
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            for (idx, coord) in points.into_iter().enumerate() {
                if idx > 0 {
                    tokio::time::sleep(step).await;
                }
                if tx.send(PositionFix::now(coord, None)).await.is_err() {
                    tracing::debug!("replay stopped after {idx} point(s)");
                    return;
                }
            }
        });

        Ok(rx)
    }
}

fn to_coordinate(waypoint: &gpx::Waypoint) -> Coordinate {
    let point = waypoint.point();
    Coordinate::new(point.y(), point.x())
}
