use shared::Coordinate;

use crate::models::ProfileMarker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(pub u64);

/// Animated dashed polyline settings for the route overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub delay_ms: u32,
    pub dash_array: [u32; 2],
    pub weight: u32,
    pub color: String,
    pub pulse_color: String,
    pub paused: bool,
    pub reverse: bool,
    pub hardware_accelerated: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            delay_ms: 800,
            dash_array: [10, 20],
            weight: 5,
            color: "#0078ff".into(),
            pulse_color: "#00f0ff".into(),
            paused: false,
            reverse: false,
            hardware_accelerated: true,
        }
    }
}

/// The map the controller draws on.
pub trait RenderSurface {
    fn attach_path(&mut self, path: &[Coordinate], style: &OverlayStyle) -> OverlayId;
    fn detach_path(&mut self, overlay: OverlayId);
    fn place_start(&mut self, start: Coordinate);
    /// Replaces all profile markers; `selected` is highlighted.
    fn place_markers(&mut self, markers: &[ProfileMarker], selected: Option<&str>);
}

/// Headless surface that only logs what would be drawn.
#[derive(Debug, Default)]
pub struct TracingSurface {
    next_id: u64,
}

impl RenderSurface for TracingSurface {
    fn attach_path(&mut self, path: &[Coordinate], _style: &OverlayStyle) -> OverlayId {
        self.next_id += 1;
        tracing::info!("overlay {} attached with {} points", self.next_id, path.len());
        OverlayId(self.next_id)
    }

    fn detach_path(&mut self, overlay: OverlayId) {
        tracing::info!("overlay {} detached", overlay.0);
    }

    fn place_start(&mut self, start: Coordinate) {
        tracing::debug!("start marker at ({:.5},{:.5})", start.lat, start.lon);
    }

    fn place_markers(&mut self, markers: &[ProfileMarker], selected: Option<&str>) {
        tracing::debug!("{} marker(s), selected={selected:?}", markers.len());
    }
}
