use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use shared::Coordinate;

use crate::error::MapperError;
use crate::models::RouteResult;

const CREATOR: &str = "profile-mapper";

pub fn encode_route_as_gpx(result: &RouteResult) -> Result<Vec<u8>, MapperError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };

    let mut start = to_waypoint(&result.start);
    start.name = Some("Start".into());
    gpx.waypoints.push(start);

    for marker in &result.markers {
        let mut waypoint = to_waypoint(&marker.position);
        waypoint.name = Some(marker.label());
        waypoint.description = marker.attribute_str("arguments").map(str::to_string);
        gpx.waypoints.push(waypoint);
    }

    let mut track = Track {
        name: Some("route".into()),
        ..Default::default()
    };
    let mut segment = TrackSegment::new();
    segment.points.extend(result.path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(buffer)
}

pub fn write_route_gpx(result: &RouteResult, path: &Path) -> Result<(), MapperError> {
    let buffer = encode_route_as_gpx(result)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&buffer)?;
    writer.flush()?;
    tracing::info!("route written to {}", path.display());
    Ok(())
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}
