use std::sync::Arc;

use shared::Coordinate;

use crate::api::ProfileApi;
use crate::config::MapperConfig;
use crate::filters::{has_start_override, FilterQueryBuilder, RawFilters};
use crate::geolocation::{GeoError, GeoPositionProvider, PositionOptions, TrackingSubscription};
use crate::models::{ProfileMarker, RouteQuery, RouteResult};
use crate::notice::Notice;
use crate::orchestrator::{RouteRequestOrchestrator, SearchFailure};
use crate::overlay::PathOverlayLifecycle;
use crate::resolver::AddressResolver;
use crate::selection::Selection;
use crate::surface::RenderSurface;
use crate::trimmer::{LiveRouteTrimmer, LiveTrackingState};

/// Identifies one search; later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Displayed { points: usize, markers: usize },
    /// Route and markers were cleared; see the notices for why.
    Cleared,
    /// A newer search was issued (or the map reset) before this one landed.
    Stale,
}

/// Owns everything the map shows: start, route, markers, selection and live
/// tracking. State only changes through these methods, and every change is
/// pushed to the render surface.
pub struct MapController<S: RenderSurface> {
    surface: S,
    builder: FilterQueryBuilder,
    orchestrator: RouteRequestOrchestrator,
    default_center: Coordinate,
    start: Coordinate,
    device_position: Option<Coordinate>,
    route: Option<Vec<Coordinate>>,
    markers: Vec<ProfileMarker>,
    selection: Selection,
    trimmer: LiveRouteTrimmer,
    tracking: Option<TrackingSubscription>,
    address_mode: bool,
    overlay: PathOverlayLifecycle,
    notices: Vec<Notice>,
    issued: u64,
    settled: u64,
}

impl<S: RenderSurface> MapController<S> {
    pub fn new(
        surface: S,
        builder: FilterQueryBuilder,
        orchestrator: RouteRequestOrchestrator,
        config: &MapperConfig,
    ) -> Self {
        let mut controller = Self {
            surface,
            builder,
            orchestrator,
            default_center: config.default_center,
            start: config.default_center,
            device_position: None,
            route: None,
            markers: Vec::new(),
            selection: Selection::default(),
            trimmer: LiveRouteTrimmer::new(config.trim_threshold_deg),
            tracking: None,
            address_mode: false,
            overlay: PathOverlayLifecycle::default(),
            notices: Vec::new(),
            issued: 0,
            settled: 0,
        };
        controller.render();
        controller
    }

    /// Wires every collaborator to the HTTP backend.
    pub fn with_api(surface: S, api: Arc<ProfileApi>, config: &MapperConfig) -> Self {
        let resolver = AddressResolver::new(api.clone(), config.geocode_cache_size);
        Self::new(
            surface,
            FilterQueryBuilder::new(resolver),
            RouteRequestOrchestrator::new(api),
            config,
        )
    }

    pub fn start(&self) -> Coordinate {
        self.start
    }

    /// `None`: nothing requested. `Some(empty)`: route fully consumed.
    pub fn route(&self) -> Option<&[Coordinate]> {
        self.route.as_deref()
    }

    pub fn markers(&self) -> &[ProfileMarker] {
        &self.markers
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_marker(&self) -> Option<&ProfileMarker> {
        let id = self.selection.selected_id()?;
        self.markers.iter().find(|m| m.stable_id == id)
    }

    pub fn device_position(&self) -> Option<Coordinate> {
        self.device_position
    }

    pub fn live_state(&self) -> Option<&LiveTrackingState> {
        self.trimmer.state()
    }

    pub fn is_address_mode(&self) -> bool {
        self.address_mode
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.settled < self.issued
    }

    pub fn builder_mut(&mut self) -> &mut FilterQueryBuilder {
        &mut self.builder
    }

    pub fn orchestrator(&self) -> &RouteRequestOrchestrator {
        &self.orchestrator
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// One-shot device fix. Permission or availability failures leave the
    /// current start untouched.
    pub async fn locate(&mut self, provider: &dyn GeoPositionProvider, options: &PositionOptions) {
        match provider.current_position(options).await {
            Ok(fix) => {
                self.device_position = Some(fix.coordinate);
                if !self.address_mode {
                    self.start = fix.coordinate;
                }
                tracing::info!(
                    "device located at ({:.5},{:.5})",
                    fix.coordinate.lat,
                    fix.coordinate.lon
                );
                self.render();
            }
            Err(err) => tracing::debug!("geolocation unavailable: {err}"),
        }
    }

    /// Search with `raw` form state and apply the reply.
    pub async fn search(&mut self, raw: &RawFilters) -> SearchStatus {
        let (ticket, query) = self.prepare(raw).await;
        let outcome = self.orchestrator.request(&query).await;
        self.apply_outcome(ticket, outcome)
    }

    /// First half of a search: engages address mode when the form overrides
    /// the start, issues a ticket and resolves the query.
    pub async fn prepare(&mut self, raw: &RawFilters) -> (SearchTicket, RouteQuery) {
        self.set_address_override(has_start_override(raw));

        self.issued += 1;
        let ticket = SearchTicket(self.issued);

        let device = self.device_position.unwrap_or(self.start);
        let built = self.builder.build(raw, device).await;
        self.notices.extend(built.notices);
        (ticket, built.query)
    }

    /// Second half of a search. Replies for superseded tickets are dropped;
    /// failures clear route and markers together.
    pub fn apply_outcome(
        &mut self,
        ticket: SearchTicket,
        outcome: Result<RouteResult, SearchFailure>,
    ) -> SearchStatus {
        if ticket.0 <= self.settled {
            tracing::warn!("dropping stale search reply #{}", ticket.0);
            return SearchStatus::Stale;
        }
        self.settled = ticket.0;

        match outcome {
            Ok(result) => {
                let status = SearchStatus::Displayed {
                    points: result.path.len(),
                    markers: result.markers.len(),
                };
                self.start = result.start;
                self.replace_result(Some(result.path), result.markers);
                status
            }
            Err(failure) => {
                tracing::info!("search #{} cleared the map: {failure}", ticket.0);
                self.notices.push(failure.notice());
                self.replace_result(None, Vec::new());
                SearchStatus::Cleared
            }
        }
    }

    /// Toggles selection of a marker in the current result set. Unknown ids
    /// are ignored. Returns the selected marker afterwards.
    pub fn activate_marker(&mut self, stable_id: &str) -> Option<&ProfileMarker> {
        if self.markers.iter().any(|m| m.stable_id == stable_id) {
            self.selection.activate(stable_id);
            self.surface
                .place_markers(&self.markers, self.selection.selected_id());
        } else {
            tracing::debug!("ignoring activation of unknown marker {stable_id:?}");
        }
        self.selected_marker()
    }

    /// Address mode disables live tracking: engaging it cancels the watch
    /// and discards the tracking state.
    pub fn set_address_override(&mut self, engaged: bool) {
        if engaged == self.address_mode {
            return;
        }
        self.address_mode = engaged;
        if engaged {
            tracing::info!("address mode engaged, live tracking stopped");
            self.stop_tracking();
        }
    }

    /// Starts the continuous watch unless address mode is on. Returns whether
    /// tracking is running.
    pub fn start_tracking(
        &mut self,
        provider: &dyn GeoPositionProvider,
        options: &PositionOptions,
    ) -> Result<bool, GeoError> {
        if self.address_mode {
            tracing::debug!("not tracking while an address is set");
            return Ok(false);
        }
        self.stop_tracking();
        self.tracking = Some(TrackingSubscription::spawn(provider, options)?);
        self.trimmer.start(self.route.clone());
        tracing::info!("live tracking started");
        Ok(true)
    }

    pub fn stop_tracking(&mut self) {
        if let Some(subscription) = self.tracking.take() {
            subscription.cancel();
        }
        self.trimmer.discard();
    }

    /// Waits for the next accepted fix and applies it. Returns `false` once
    /// tracking is off or the provider has stopped.
    pub async fn next_tracking_update(&mut self) -> bool {
        let Some(subscription) = self.tracking.as_mut() else {
            return false;
        };
        match subscription.next().await {
            Some(fix) => {
                self.on_position(fix.coordinate);
                true
            }
            None => {
                tracing::info!("position watch closed");
                self.stop_tracking();
                false
            }
        }
    }

    /// Applies one device position: moves the start and trims the route.
    pub fn on_position(&mut self, position: Coordinate) {
        if self.address_mode || !self.trimmer.is_active() {
            return;
        }
        self.device_position = Some(position);
        self.start = position;

        if let Some(remaining) = self.trimmer.update(position) {
            if remaining.is_empty() && self.route.as_ref().is_some_and(|r| !r.is_empty()) {
                tracing::info!("route consumed");
            }
            self.route = Some(remaining.to_vec());
        }
        self.render();
    }

    /// Back to the initial empty map. Outstanding searches become stale.
    pub fn reset(&mut self) {
        self.settled = self.issued;
        self.address_mode = false;
        self.start = self.default_center;
        self.device_position = None;
        self.selection.reset();
        self.route = None;
        self.markers.clear();
        self.notices.clear();

        self.trimmer.discard();
        if self.tracking.is_some() {
            self.trimmer.start(None);
        }
        tracing::info!("map reset");
        self.render();
    }

    /// Stops tracking and removes the overlay. Also runs on drop.
    pub fn teardown(&mut self) {
        self.stop_tracking();
        self.overlay.teardown(&mut self.surface);
    }

    fn replace_result(&mut self, route: Option<Vec<Coordinate>>, markers: Vec<ProfileMarker>) {
        self.selection
            .retain(|id| markers.iter().any(|m| m.stable_id == id));
        self.trimmer.replace_route(route.clone());
        self.route = route;
        self.markers = markers;
        self.render();
    }

    fn render(&mut self) {
        self.surface.place_start(self.start);
        self.surface
            .place_markers(&self.markers, self.selection.selected_id());
        self.overlay.sync(&mut self.surface, self.route.as_deref());
    }
}

impl<S: RenderSurface> Drop for MapController<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
