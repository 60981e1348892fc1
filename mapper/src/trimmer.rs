use shared::Coordinate;

/// Roughly 50 m at mid latitudes.
pub const DEFAULT_TRIM_THRESHOLD_DEG: f64 = 0.0005;

/// Equirectangular distance in degrees: longitude scaled by the cosine of the
/// mean latitude, then plain Euclidean distance.
pub fn planar_distance_deg(a: Coordinate, b: Coordinate) -> f64 {
    let mean_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let dx = (b.lon - a.lon) * mean_lat.cos();
    let dy = b.lat - a.lat;
    (dx * dx + dy * dy).sqrt()
}

/// Drops every path point within `threshold_deg` of `position`.
///
/// All points in range go, wherever they sit in the path, so a looped route
/// passing near the device twice loses both passes. Order of the survivors is
/// preserved and nothing is ever added.
pub fn trim_path(path: &[Coordinate], position: Coordinate, threshold_deg: f64) -> Vec<Coordinate> {
    path.iter()
        .copied()
        .filter(|point| planar_distance_deg(*point, position) >= threshold_deg)
        .collect()
}

/// Remaining route plus the last device fix while live tracking is on.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTrackingState {
    pub position: Option<Coordinate>,
    /// `None` means no route was requested; `Some(vec![])` means it was consumed.
    pub remaining: Option<Vec<Coordinate>>,
}

#[derive(Debug, Clone)]
pub struct LiveRouteTrimmer {
    threshold_deg: f64,
    state: Option<LiveTrackingState>,
}

impl Default for LiveRouteTrimmer {
    fn default() -> Self {
        Self::new(DEFAULT_TRIM_THRESHOLD_DEG)
    }
}

impl LiveRouteTrimmer {
    pub fn new(threshold_deg: f64) -> Self {
        Self {
            threshold_deg,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&LiveTrackingState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Begin tracking against `route`; any previous tracking state is replaced.
    pub fn start(&mut self, route: Option<Vec<Coordinate>>) {
        self.state = Some(LiveTrackingState {
            position: None,
            remaining: route,
        });
    }

    /// A new result set landed: trimming restarts from the full path.
    pub fn replace_route(&mut self, route: Option<Vec<Coordinate>>) {
        if let Some(state) = self.state.as_mut() {
            state.remaining = route;
        }
    }

    /// Applies one device fix and returns the remaining path, or `None` when
    /// tracking is off or no route is active.
    pub fn update(&mut self, position: Coordinate) -> Option<&[Coordinate]> {
        let threshold = self.threshold_deg;
        let state = self.state.as_mut()?;
        state.position = Some(position);

        if let Some(remaining) = state.remaining.as_mut() {
            let before = remaining.len();
            let trimmed = trim_path(remaining, position, threshold);
            if trimmed.len() != before {
                tracing::debug!(
                    "trimmed {} point(s), {} remaining",
                    before - trimmed.len(),
                    trimmed.len()
                );
            }
            *remaining = trimmed;
        }

        state.remaining.as_deref()
    }

    pub fn discard(&mut self) {
        self.state = None;
    }
}
