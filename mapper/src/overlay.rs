use shared::Coordinate;

use crate::surface::{OverlayId, OverlayStyle, RenderSurface};

/// Keeps at most one route overlay on the surface, always detaching the old
/// one before attaching its replacement.
#[derive(Debug, Default)]
pub struct PathOverlayLifecycle {
    style: OverlayStyle,
    attached: Option<(OverlayId, Vec<Coordinate>)>,
}

impl PathOverlayLifecycle {
    pub fn attached(&self) -> Option<OverlayId> {
        self.attached.as_ref().map(|(id, _)| *id)
    }

    /// Replaces the overlay when `path` differs from what is drawn. `None`
    /// and empty paths leave nothing attached.
    pub fn sync<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        path: Option<&[Coordinate]>,
    ) {
        let drawn = self.attached.as_ref().map(|(_, points)| points.as_slice());
        let wanted = path.filter(|p| !p.is_empty());
        if drawn == wanted {
            return;
        }
        self.replace(surface, wanted);
    }

    pub fn replace<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        path: Option<&[Coordinate]>,
    ) {
        if let Some((id, _)) = self.attached.take() {
            surface.detach_path(id);
        }
        if let Some(points) = path.filter(|p| !p.is_empty()) {
            let id = surface.attach_path(points, &self.style);
            self.attached = Some((id, points.to_vec()));
        }
    }

    pub fn teardown<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        self.replace(surface, None);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::ProfileMarker;

    /// Counts live overlays and fails on double detach.
    #[derive(Default)]
    struct CountingSurface {
        next: u64,
        live: HashSet<OverlayId>,
        max_live: usize,
        attaches: usize,
    }

    impl RenderSurface for CountingSurface {
        fn attach_path(&mut self, _path: &[Coordinate], _style: &OverlayStyle) -> OverlayId {
            self.next += 1;
            self.attaches += 1;
            let id = OverlayId(self.next);
            self.live.insert(id);
            self.max_live = self.max_live.max(self.live.len());
            id
        }

        fn detach_path(&mut self, overlay: OverlayId) {
            assert!(self.live.remove(&overlay), "detached unknown overlay");
        }

        fn place_start(&mut self, _start: Coordinate) {}

        fn place_markers(&mut self, _markers: &[ProfileMarker], _selected: Option<&str>) {}
    }

    fn path(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| Coordinate::new(45.0 + i as f64 * 0.01, -73.0)).collect()
    }

    #[test]
    fn never_more_than_one_overlay() {
        let mut surface = CountingSurface::default();
        let mut overlay = PathOverlayLifecycle::default();
        let a = path(3);
        let b = path(5);

        overlay.sync(&mut surface, Some(a.as_slice()));
        overlay.sync(&mut surface, Some(b.as_slice()));
        overlay.sync(&mut surface, None);
        overlay.sync(&mut surface, Some(a.as_slice()));
        overlay.sync(&mut surface, Some(&[][..]));
        overlay.sync(&mut surface, Some(b.as_slice()));

        assert_eq!(surface.max_live, 1);
        assert_eq!(surface.live.len(), 1);
    }

    #[test]
    fn null_path_leaves_nothing_attached() {
        let mut surface = CountingSurface::default();
        let mut overlay = PathOverlayLifecycle::default();
        overlay.sync(&mut surface, Some(path(2).as_slice()));
        overlay.sync(&mut surface, None);
        assert!(surface.live.is_empty());
        assert!(overlay.attached().is_none());
    }

    #[test]
    fn unchanged_path_is_not_redrawn() {
        let mut surface = CountingSurface::default();
        let mut overlay = PathOverlayLifecycle::default();
        overlay.sync(&mut surface, Some(path(4).as_slice()));
        overlay.sync(&mut surface, Some(path(4).as_slice()));
        overlay.sync(&mut surface, None);
        overlay.sync(&mut surface, None);
        assert_eq!(surface.attaches, 1);
    }

    #[test]
    fn teardown_detaches_unconditionally() {
        let mut surface = CountingSurface::default();
        let mut overlay = PathOverlayLifecycle::default();
        overlay.sync(&mut surface, Some(path(2).as_slice()));
        overlay.teardown(&mut surface);
        overlay.teardown(&mut surface);
        assert!(surface.live.is_empty());
    }
}
