//! Panorama session - owns the single live panorama viewer
//!
//! The session is a synchronous state machine. It never performs I/O itself:
//! spot lookups are requested through [`SessionEvent::FetchRequested`] and
//! answered with [`PanoramaSession::complete_fetch`], and the renderer reports
//! panorama and model loading back through the `panorama_*` and `model_*`
//! methods. Every open starts a new generation, and any report that belongs to
//! an older generation is dropped.
//!
//! Rendering resources are acquired through the session's [`ResourceLedger`]
//! and released as one scope when the viewer is disposed. The previous viewer
//! is always disposed before the next spot is even requested, so the render
//! surface never hosts two viewers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::hotspot::{HotspotDef, HotspotFactory, HotspotKind, HotspotPayload, MarkerSpec, MarkerStyle};
use crate::overlay::{ModelOverlay, ModelSession, ModelTicket};
use crate::resources::{
    FetchTicket, GenerationCounter, ListenerHandle, MarkerHandle, ResourceLedger, ViewerHandle,
};
use crate::spot::{Spot, SpotError, SpotId, SpotSource};
use crate::teleport::ResetScheduler;

/// Rendering backend driven by a [`PanoramaSession`]
pub trait RenderSurface {
    /// Build a panorama for `spot`. Loading is reported back asynchronously.
    fn create_viewer(&mut self, viewer: ViewerHandle, spot: &Spot);
    fn watch_resize(&mut self, viewer: ViewerHandle, listener: ListenerHandle);
    fn attach_marker(&mut self, viewer: ViewerHandle, marker: &MarkerSpec);
    /// Release the viewer together with its markers, textures and listener
    fn dispose_viewer(&mut self, viewer: ViewerHandle);
    fn show_model(&mut self, ticket: ModelTicket, model: &ModelSession);
    fn hide_model(&mut self);
    /// Drop cached GPU assets after a teleport
    fn reset_environment(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Fetching,
    Rendering,
    Ready,
    Error,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Spot lookup failed: {0}")]
    LookupFailure(#[from] SpotError),
    #[error("Panorama failed to load: {0}")]
    DecodeFailure(String),
    #[error("Failed to load 3D model: {0}")]
    ModelDecodeFailure(String),
}

impl SessionError {
    /// Message shown to the user in place of the panorama
    pub fn user_message(&self) -> String {
        match self {
            SessionError::LookupFailure(e) => e.user_message().to_string(),
            SessionError::DecodeFailure(_) => "Failed to load the panorama image.".to_string(),
            SessionError::ModelDecodeFailure(msg) => msg.clone(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::DecodeFailure(_))
    }
}

/// Notifications for the host, drained with [`PanoramaSession::drain_events`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Look up this spot and answer with `complete_fetch`
    FetchRequested(FetchTicket),
    /// A teleport was activated; the host should navigate and call `open`
    NavigationRequested(SpotId),
    StatusChanged(SessionStatus),
}

/// State exposed to the host UI
#[derive(Debug, Default)]
pub struct PanoramaSessionState {
    pub status: SessionStatus,
    pub spot: Option<Spot>,
    pub error: Option<SessionError>,
    overlay: ModelOverlay,
}

impl PanoramaSessionState {
    pub fn active_model(&self) -> Option<&ModelSession> {
        self.overlay.active()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(SessionError::user_message)
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Panorama stall timeout; `None` waits forever
    pub decode_timeout: Option<Duration>,
    pub marker_style: MarkerStyle,
    pub sphere_radius: f32,
    pub marker_inset: f32,
    pub environment_reset: bool,
    pub reset_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            decode_timeout: Some(Duration::from_secs(30)),
            marker_style: MarkerStyle::default(),
            sphere_radius: 5000.0,
            marker_inset: 0.9,
            environment_reset: false,
            reset_delay: Duration::from_millis(100),
        }
    }
}

/// A hotspot currently attached to the live viewer
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedHotspot {
    pub handle: MarkerHandle,
    pub def: HotspotDef,
}

pub struct PanoramaSession<S: RenderSurface> {
    surface: S,
    catalog: Arc<Catalog>,
    settings: SessionSettings,
    ledger: ResourceLedger,
    generations: GenerationCounter,
    state: PanoramaSessionState,
    current_id: Option<SpotId>,
    viewer: Option<ViewerHandle>,
    hotspots: Vec<AttachedHotspot>,
    /// Time spent in `Rendering` since the last progress report
    stalled_for: Option<Duration>,
    reset: ResetScheduler,
    events: VecDeque<SessionEvent>,
}

impl<S: RenderSurface> PanoramaSession<S> {
    pub fn new(surface: S, catalog: Arc<Catalog>, settings: SessionSettings) -> Self {
        let reset = ResetScheduler::new(settings.reset_delay, settings.environment_reset);
        Self {
            surface,
            catalog,
            settings,
            ledger: ResourceLedger::new(),
            generations: GenerationCounter::default(),
            state: PanoramaSessionState::default(),
            current_id: None,
            viewer: None,
            hotspots: Vec::new(),
            stalled_for: None,
            reset,
            events: VecDeque::new(),
        }
    }

    /// Switch to `spot_id`. The previous viewer is disposed before this returns.
    pub fn open(&mut self, spot_id: SpotId) -> FetchTicket {
        let ticket = self.begin(spot_id);
        self.events.push_back(SessionEvent::FetchRequested(ticket.clone()));
        ticket
    }

    /// Open and resolve the spot from a synchronous source in one step
    pub fn open_from(&mut self, spot_id: SpotId, source: &impl SpotSource) -> bool {
        let ticket = self.begin(spot_id);
        let result = source.fetch_spot(&ticket.spot_id);
        self.complete_fetch(ticket, result)
    }

    fn begin(&mut self, spot_id: SpotId) -> FetchTicket {
        self.teardown();
        let generation = self.generations.advance();
        info!(spot_id = %spot_id, generation = generation.0, "Opening spot");

        self.current_id = Some(spot_id.clone());
        self.state.spot = None;
        self.state.error = None;
        self.set_status(SessionStatus::Fetching);

        FetchTicket { generation, spot_id }
    }

    /// Deliver the result of a spot lookup. Returns false if the ticket is stale.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<Spot, SpotError>) -> bool {
        if !self.generations.is_current(ticket.generation) || self.state.status != SessionStatus::Fetching {
            debug!(spot_id = %ticket.spot_id, generation = ticket.generation.0, "Discarding stale spot lookup");
            return false;
        }

        match result {
            Err(e) => {
                warn!(spot_id = %ticket.spot_id, error = %e, "Spot lookup failed");
                self.state.error = Some(SessionError::LookupFailure(e));
                self.set_status(SessionStatus::Error);
            }
            Ok(spot) => {
                // Normally already gone; never let two viewers coexist.
                self.dispose_viewer();

                let viewer = self.ledger.acquire_viewer();
                self.surface.create_viewer(viewer, &spot);
                let listener = self.ledger.acquire_listener(viewer);
                self.surface.watch_resize(viewer, listener);

                debug!(spot_id = %spot.id, viewer = viewer.0, "Panorama viewer created");
                self.viewer = Some(viewer);
                self.state.spot = Some(spot);
                self.stalled_for = Some(Duration::ZERO);
                self.set_status(SessionStatus::Rendering);
            }
        }
        true
    }

    fn is_rendering(&self, viewer: ViewerHandle) -> bool {
        self.viewer == Some(viewer) && self.state.status == SessionStatus::Rendering
    }

    /// Decoder progress. Restarts the stall timer.
    pub fn panorama_progress(&mut self, viewer: ViewerHandle) -> bool {
        if !self.is_rendering(viewer) {
            return false;
        }
        self.stalled_for = Some(Duration::ZERO);
        true
    }

    /// The panorama finished loading: attach the location's hotspots
    pub fn panorama_loaded(&mut self, viewer: ViewerHandle) -> bool {
        if !self.is_rendering(viewer) {
            debug!(viewer = viewer.0, "Ignoring load report for inactive viewer");
            return false;
        }
        self.stalled_for = None;

        let catalog = Arc::clone(&self.catalog);
        let entry = self.state.spot.as_ref().and_then(|spot| catalog.select(spot));
        let factory = HotspotFactory::new(
            &self.settings.marker_style,
            self.settings.sphere_radius,
            self.settings.marker_inset,
        );

        if let Some(entry) = entry {
            for def in &entry.hotspots {
                let handle = self.ledger.acquire_marker(viewer);
                let marker = factory.build(def, handle);
                self.surface.attach_marker(viewer, &marker);
                self.hotspots.push(AttachedHotspot {
                    handle,
                    def: def.clone(),
                });
            }
        }

        info!(
            location = entry.map(|e| e.key.as_str()).unwrap_or("<none>"),
            hotspots = self.hotspots.len(),
            "Panorama ready"
        );
        self.set_status(SessionStatus::Ready);
        true
    }

    /// The renderer could not decode the panorama image
    pub fn panorama_failed(&mut self, viewer: ViewerHandle, message: &str) -> bool {
        if !self.is_rendering(viewer) {
            return false;
        }
        self.fail_decode(message.to_string());
        true
    }

    fn fail_decode(&mut self, message: String) {
        warn!(spot_id = ?self.current_id, error = %message, "Panorama decode failed");
        self.close_model();
        self.dispose_viewer();
        self.state.error = Some(SessionError::DecodeFailure(message));
        self.set_status(SessionStatus::Error);
    }

    /// Advance session timers: the decode stall timeout and a pending
    /// environment reset.
    pub fn advance(&mut self, dt: Duration) {
        if let (Some(stalled), Some(timeout)) = (self.stalled_for, self.settings.decode_timeout) {
            let stalled = stalled + dt;
            if stalled >= timeout {
                self.fail_decode(format!(
                    "no response from the image decoder after {}s",
                    timeout.as_secs()
                ));
            } else {
                self.stalled_for = Some(stalled);
            }
        }

        if self.reset.advance(dt) {
            info!("Resetting rendering environment");
            self.surface.reset_environment();
        }
    }

    /// Re-open the current spot after a decode failure
    pub fn retry(&mut self) -> Option<FetchTicket> {
        let retryable = self.state.error.as_ref().is_some_and(SessionError::is_retryable);
        if !retryable {
            return None;
        }
        let id = self.current_id.clone()?;
        Some(self.open(id))
    }

    /// Dispatch a click on a marker. Returns the kind of hotspot activated.
    pub fn activate_hotspot(&mut self, handle: MarkerHandle) -> Option<HotspotKind> {
        if self.state.status != SessionStatus::Ready {
            return None;
        }
        let payload = self
            .hotspots
            .iter()
            .find(|h| h.handle == handle)
            .map(|h| h.def.payload.clone())?;

        match payload {
            HotspotPayload::Model(model) => {
                let had_model = self.state.overlay.is_open();
                let ticket = self.state.overlay.open(&model);
                if had_model {
                    self.surface.hide_model();
                }
                if let Some(active) = self.state.overlay.active() {
                    self.surface.show_model(ticket, active);
                }
                Some(HotspotKind::Model)
            }
            HotspotPayload::Teleport(teleport) => {
                info!(target = %teleport.target_spot_id, "Teleport requested");
                self.close_model();
                self.events
                    .push_back(SessionEvent::NavigationRequested(teleport.target_spot_id));
                if self.reset.arm() {
                    debug!(delay = ?self.settings.reset_delay, "Environment reset scheduled");
                }
                Some(HotspotKind::Teleport)
            }
        }
    }

    pub fn model_load_started(&mut self, ticket: ModelTicket) -> bool {
        self.state.overlay.begin_loading(ticket)
    }

    pub fn model_loaded(&mut self, ticket: ModelTicket) -> bool {
        self.state.overlay.finish(ticket)
    }

    /// Model decode failure. Reported inside the overlay; the panorama is untouched.
    pub fn model_failed(&mut self, ticket: ModelTicket, message: &str) -> bool {
        let error = SessionError::ModelDecodeFailure(message.to_string());
        self.state.overlay.fail(ticket, &error.user_message())
    }

    pub fn close_model(&mut self) -> bool {
        if self.state.overlay.close() {
            self.surface.hide_model();
            true
        } else {
            false
        }
    }

    /// Tear the session down to idle
    pub fn close(&mut self) {
        self.teardown();
        self.generations.advance();
        self.reset.cancel();
        self.current_id = None;
        self.state.spot = None;
        self.state.error = None;
        self.set_status(SessionStatus::Idle);
    }

    fn teardown(&mut self) {
        self.close_model();
        self.dispose_viewer();
        self.stalled_for = None;
    }

    fn dispose_viewer(&mut self) {
        self.hotspots.clear();
        if let Some(viewer) = self.viewer.take() {
            self.surface.dispose_viewer(viewer);
            let released = self.ledger.release_scope(viewer);
            debug!(viewer = viewer.0, released, "Disposed panorama viewer");
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.state.status != status {
            self.state.status = status;
            self.events.push_back(SessionEvent::StatusChanged(status));
        }
    }

    pub fn state(&self) -> &PanoramaSessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn current_spot_id(&self) -> Option<&SpotId> {
        self.current_id.as_ref()
    }

    pub fn viewer(&self) -> Option<ViewerHandle> {
        self.viewer
    }

    pub fn attached_hotspots(&self) -> &[AttachedHotspot] {
        &self.hotspots
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn reset_scheduler(&self) -> &ResetScheduler {
        &self.reset
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }
}

impl<S: RenderSurface> Drop for PanoramaSession<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::ModelStatus;
    use crate::resources::ResourceKind;
    use crate::spot::StaticSpotDirectory;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(ViewerHandle, SpotId),
        Resize(ViewerHandle),
        Attach(ViewerHandle, HotspotKind),
        Dispose(ViewerHandle),
        ShowModel(String),
        HideModel,
        Reset,
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<Call>,
        live: HashSet<ViewerHandle>,
        max_live: usize,
    }

    impl RenderSurface for RecordingSurface {
        fn create_viewer(&mut self, viewer: ViewerHandle, spot: &Spot) {
            self.live.insert(viewer);
            self.max_live = self.max_live.max(self.live.len());
            self.calls.push(Call::Create(viewer, spot.id.clone()));
        }

        fn watch_resize(&mut self, viewer: ViewerHandle, _listener: ListenerHandle) {
            self.calls.push(Call::Resize(viewer));
        }

        fn attach_marker(&mut self, viewer: ViewerHandle, marker: &MarkerSpec) {
            assert!(self.live.contains(&viewer));
            self.calls.push(Call::Attach(viewer, marker.kind));
        }

        fn dispose_viewer(&mut self, viewer: ViewerHandle) {
            assert!(self.live.remove(&viewer));
            self.calls.push(Call::Dispose(viewer));
        }

        fn show_model(&mut self, _ticket: ModelTicket, model: &ModelSession) {
            self.calls.push(Call::ShowModel(model.url.clone()));
        }

        fn hide_model(&mut self) {
            self.calls.push(Call::HideModel);
        }

        fn reset_environment(&mut self) {
            self.calls.push(Call::Reset);
        }
    }

    fn spot(id: &str, name: &str) -> Spot {
        Spot {
            id: SpotId::new(id),
            name: name.to_string(),
            description: String::new(),
            image_ref: format!("{id}.jpg"),
        }
    }

    const CAMP_III: &str = "zvuINqT41VhWCKpenjZw";
    const CAMP_3: &str = "YCEKhHOU6eNHSqx10qSr";
    const CAMP_IV: &str = "8us4vrBVTMIDiCXXWHlY";

    fn directory() -> StaticSpotDirectory {
        StaticSpotDirectory::from_spots([
            spot("X", "Mossy Forest Overlook"),
            spot("T", "Twin Falls"),
            spot(CAMP_III, "Camp III"),
            spot(CAMP_3, "Camp 3"),
            spot(CAMP_IV, "Camp IV"),
        ])
    }

    fn session(settings: SessionSettings) -> PanoramaSession<RecordingSurface> {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        PanoramaSession::new(RecordingSurface::default(), catalog, settings)
    }

    fn load(s: &mut PanoramaSession<RecordingSurface>, id: &str) {
        assert!(s.open_from(SpotId::new(id), &directory()));
        let viewer = s.viewer().unwrap();
        assert!(s.panorama_progress(viewer));
        assert!(s.panorama_loaded(viewer));
    }

    fn kinds(s: &PanoramaSession<RecordingSurface>) -> Vec<HotspotKind> {
        s.attached_hotspots().iter().map(|h| h.def.kind()).collect()
    }

    fn find(s: &PanoramaSession<RecordingSurface>, kind: HotspotKind) -> MarkerHandle {
        s.attached_hotspots()
            .iter()
            .find(|h| h.def.kind() == kind)
            .unwrap()
            .handle
    }

    #[test]
    fn test_mossy_overlook_scenario() {
        let mut s = session(SessionSettings::default());
        load(&mut s, "X");

        assert_eq!(s.status(), SessionStatus::Ready);
        assert_eq!(kinds(&s), vec![HotspotKind::Model; 4]);
        assert_eq!(s.ledger().live_count(ResourceKind::Marker), 4);
        assert_eq!(s.ledger().live_count(ResourceKind::Listener), 1);
    }

    #[test]
    fn test_no_catalog_match_is_ready_without_hotspots() {
        let mut s = session(SessionSettings::default());
        load(&mut s, "T");
        assert_eq!(s.status(), SessionStatus::Ready);
        assert!(s.attached_hotspots().is_empty());
        assert!(s.state().error.is_none());
    }

    #[test]
    fn test_previous_viewer_disposed_before_next_created() {
        let mut s = session(SessionSettings::default());
        for id in ["X", CAMP_III, "T", "X"] {
            load(&mut s, id);
        }
        assert_eq!(s.surface().max_live, 1);

        let mut live = None;
        for call in &s.surface().calls {
            match call {
                Call::Create(v, _) => {
                    assert!(live.is_none());
                    live = Some(*v);
                }
                Call::Dispose(v) => {
                    assert_eq!(live.take(), Some(*v));
                }
                _ => {}
            }
        }
        assert_eq!(s.ledger().live_count(ResourceKind::Viewer), 1);
    }

    #[test]
    fn test_stale_fetch_discarded() {
        let mut s = session(SessionSettings::default());
        let first = s.open(SpotId::new("X"));
        let second = s.open(SpotId::new("T"));

        assert!(!s.complete_fetch(first, Ok(spot("X", "Mossy Forest Overlook"))));
        assert_eq!(s.status(), SessionStatus::Fetching);
        assert!(s.surface().calls.is_empty());

        assert!(s.complete_fetch(second, Ok(spot("T", "Twin Falls"))));
        assert_eq!(s.status(), SessionStatus::Rendering);
        assert_eq!(s.state().spot.as_ref().unwrap().name, "Twin Falls");
    }

    #[test]
    fn test_fetch_events() {
        let mut s = session(SessionSettings::default());
        let ticket = s.open(SpotId::new("X"));
        let events = s.drain_events();
        assert!(events.contains(&SessionEvent::FetchRequested(ticket)));
        assert!(events.contains(&SessionEvent::StatusChanged(SessionStatus::Fetching)));
    }

    #[test]
    fn test_lookup_failure_is_terminal() {
        let mut s = session(SessionSettings::default());
        assert!(s.open_from(SpotId::new("nope"), &directory()));
        assert_eq!(s.status(), SessionStatus::Error);
        assert!(matches!(s.state().error, Some(SessionError::LookupFailure(SpotError::NotFound(_)))));
        assert_eq!(s.state().error_message().as_deref(), Some("Spot not found!"));
        assert!(s.retry().is_none());
        assert!(s.ledger().is_empty());
    }

    #[test]
    fn test_teleport_round_trip_reattaches_same_set() {
        let mut s = session(SessionSettings::default());
        load(&mut s, CAMP_III);
        let original = s.attached_hotspots().iter().map(|h| h.def.clone()).collect::<Vec<_>>();
        s.drain_events();

        // Camp III -> Camp 3
        assert_eq!(s.activate_hotspot(find(&s, HotspotKind::Teleport)), Some(HotspotKind::Teleport));
        let target = s
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                SessionEvent::NavigationRequested(id) => Some(id),
                _ => None,
            })
            .unwrap();
        assert_eq!(target.as_str(), CAMP_3);
        load(&mut s, target.as_str());
        assert_eq!(kinds(&s), vec![HotspotKind::Teleport]);

        // Camp 3 -> Camp III
        s.activate_hotspot(find(&s, HotspotKind::Teleport));
        load(&mut s, CAMP_III);

        let returned = s.attached_hotspots().iter().map(|h| h.def.clone()).collect::<Vec<_>>();
        assert_eq!(returned, original);
        assert_eq!(s.status(), SessionStatus::Ready);
        assert_eq!(s.ledger().live_count(ResourceKind::Viewer), 1);
        assert_eq!(s.ledger().live_count(ResourceKind::Marker), original.len());
    }

    #[test]
    fn test_teleport_to_missing_spot_surfaces_lookup_failure() {
        let mut s = session(SessionSettings::default());
        load(&mut s, CAMP_IV);
        s.drain_events();
        s.activate_hotspot(find(&s, HotspotKind::Teleport));

        let target = match s.drain_events().pop() {
            Some(SessionEvent::NavigationRequested(id)) => id,
            other => panic!("unexpected event {other:?}"),
        };
        // Camp 4 is not in the directory
        s.open_from(target, &directory());
        assert_eq!(s.status(), SessionStatus::Error);
        assert!(matches!(s.state().error, Some(SessionError::LookupFailure(_))));
        assert!(s.viewer().is_none());
    }

    #[test]
    fn test_model_failure_keeps_panorama_ready() {
        let mut s = session(SessionSettings::default());
        load(&mut s, "X");

        assert_eq!(s.activate_hotspot(find(&s, HotspotKind::Model)), Some(HotspotKind::Model));
        let ticket = s.state().active_model().unwrap().ticket;
        assert!(s.model_load_started(ticket));
        assert!(s.model_failed(ticket, "404 Not Found"));

        let model = s.state().active_model().unwrap();
        assert_eq!(model.status, ModelStatus::Error);
        assert!(!model.error_message.as_deref().unwrap_or_default().is_empty());
        assert_eq!(s.status(), SessionStatus::Ready);

        assert!(s.close_model());
        assert!(s.state().active_model().is_none());
        assert_eq!(s.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_second_model_supersedes_first() {
        let mut s = session(SessionSettings::default());
        load(&mut s, "X");
        let handles: Vec<_> = s.attached_hotspots().iter().map(|h| h.handle).collect();

        s.activate_hotspot(handles[0]);
        let first = s.state().active_model().unwrap().ticket;
        s.activate_hotspot(handles[1]);

        assert!(!s.model_loaded(first));
        let active = s.state().active_model().unwrap();
        assert_eq!(active.url, "/3dmodels/Nepenthes justinae.glb");
        assert_eq!(active.status, ModelStatus::Opening);

        let shown = s.surface().calls.iter().filter(|c| matches!(c, Call::ShowModel(_))).count();
        let hidden = s.surface().calls.iter().filter(|c| **c == Call::HideModel).count();
        assert_eq!(shown - hidden, 1);
    }

    #[test]
    fn test_decode_timeout_and_retry() {
        let mut s = session(SessionSettings {
            decode_timeout: Some(Duration::from_secs(1)),
            ..SessionSettings::default()
        });
        assert!(s.open_from(SpotId::new("X"), &directory()));
        let viewer = s.viewer().unwrap();

        s.advance(Duration::from_millis(600));
        assert_eq!(s.status(), SessionStatus::Rendering);
        s.panorama_progress(viewer);
        s.advance(Duration::from_millis(600));
        assert_eq!(s.status(), SessionStatus::Rendering);
        s.advance(Duration::from_millis(600));

        assert_eq!(s.status(), SessionStatus::Error);
        assert!(matches!(s.state().error, Some(SessionError::DecodeFailure(_))));
        assert!(s.ledger().is_empty());
        // A load arriving after the timeout is ignored
        assert!(!s.panorama_loaded(viewer));

        let ticket = s.retry().unwrap();
        assert_eq!(ticket.spot_id.as_str(), "X");
        assert_eq!(s.status(), SessionStatus::Fetching);
    }

    #[test]
    fn test_decoder_failure_releases_viewer() {
        let mut s = session(SessionSettings::default());
        s.open_from(SpotId::new("X"), &directory());
        let viewer = s.viewer().unwrap();
        assert!(s.panorama_failed(viewer, "unsupported image format"));
        assert!(s.surface().calls.contains(&Call::Dispose(viewer)));
        assert!(s.ledger().is_empty());
        assert!(s.state().error.as_ref().unwrap().is_retryable());
    }

    #[test]
    fn test_environment_reset_fires_once_after_teleport() {
        let mut s = session(SessionSettings {
            environment_reset: true,
            reset_delay: Duration::from_millis(100),
            ..SessionSettings::default()
        });
        load(&mut s, CAMP_III);
        let exit = find(&s, HotspotKind::Teleport);
        s.activate_hotspot(exit);
        s.activate_hotspot(exit);

        s.advance(Duration::from_millis(50));
        s.advance(Duration::from_millis(60));
        s.advance(Duration::from_millis(200));

        let resets = s.surface().calls.iter().filter(|c| **c == Call::Reset).count();
        assert_eq!(resets, 1);
        assert_eq!(s.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_close_releases_everything() {
        let mut s = session(SessionSettings::default());
        load(&mut s, "X");
        s.activate_hotspot(find(&s, HotspotKind::Model));
        s.close();

        assert_eq!(s.status(), SessionStatus::Idle);
        assert!(s.ledger().is_empty());
        assert_eq!(s.ledger().acquired_total(), s.ledger().released_total());
        assert!(s.state().active_model().is_none());
    }
}
