//! Rendering resource handles, generations, and the release ledger
//!
//! Every GPU-side object a session creates (viewer, hotspot markers, the resize
//! listener) is allocated a handle here and recorded in a [`ResourceLedger`]
//! under the viewer that owns it. Disposing a viewer releases its whole scope,
//! so the ledger is empty whenever no viewer is alive.

use std::collections::HashMap;

use crate::spot::SpotId;

/// Monotonic counter identifying one open of a session or overlay.
/// Async results carrying an older generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Source of generations; only the latest one is current
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Generation,
}

impl GenerationCounter {
    pub fn advance(&mut self) -> Generation {
        self.current = self.current.next();
        self.current
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current == generation
    }
}

/// Ticket handed to the host for an in-flight spot lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: Generation,
    pub spot_id: SpotId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Viewer,
    Marker,
    Listener,
}

#[derive(Debug, Clone, Copy)]
struct LiveResource {
    kind: ResourceKind,
    owner: ViewerHandle,
}

/// Tracks live rendering resources by owning viewer
#[derive(Debug, Default)]
pub struct ResourceLedger {
    next_id: u64,
    live: HashMap<u64, LiveResource>,
    acquired_total: u64,
    released_total: u64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, kind: ResourceKind, owner: Option<ViewerHandle>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let owner = owner.unwrap_or(ViewerHandle(id));
        self.live.insert(id, LiveResource { kind, owner });
        self.acquired_total += 1;
        id
    }

    pub fn acquire_viewer(&mut self) -> ViewerHandle {
        ViewerHandle(self.allocate(ResourceKind::Viewer, None))
    }

    pub fn acquire_marker(&mut self, owner: ViewerHandle) -> MarkerHandle {
        MarkerHandle(self.allocate(ResourceKind::Marker, Some(owner)))
    }

    pub fn acquire_listener(&mut self, owner: ViewerHandle) -> ListenerHandle {
        ListenerHandle(self.allocate(ResourceKind::Listener, Some(owner)))
    }

    /// Release a viewer and everything it owns. Returns the number of entries released.
    pub fn release_scope(&mut self, viewer: ViewerHandle) -> usize {
        let before = self.live.len();
        self.live.retain(|_, r| r.owner != viewer);
        let released = before - self.live.len();
        self.released_total += released as u64;
        released
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live.values().filter(|r| r.kind == kind).count()
    }

    pub fn is_live(&self, viewer: ViewerHandle) -> bool {
        self.live
            .get(&viewer.0)
            .is_some_and(|r| r.kind == ResourceKind::Viewer)
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn acquired_total(&self) -> u64 {
        self.acquired_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}
