//! Bevy-side render surface for the panorama session
//!
//! The session calls into [`BevySurface`] synchronously; every call is
//! recorded as a [`SurfaceOp`] and applied to the world by
//! [`apply_surface_ops`](crate::panorama::apply_surface_ops) in call order.
//! Keeping one queue preserves the dispose-before-create ordering the session
//! guarantees.

use bevy::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;

use hamitour_core::{
    Catalog, ListenerHandle, MarkerSpec, ModelSession, ModelTicket, PanoramaSession, RenderSurface,
    SessionSettings, Spot, ViewerHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    CreateViewer {
        viewer: ViewerHandle,
        image_ref: String,
    },
    WatchResize {
        viewer: ViewerHandle,
        listener: ListenerHandle,
    },
    AttachMarker {
        viewer: ViewerHandle,
        marker: MarkerSpec,
    },
    DisposeViewer(ViewerHandle),
    ShowModel {
        ticket: ModelTicket,
        url: String,
        scale: Vec3,
        offset: Vec3,
    },
    HideModel,
    ResetEnvironment,
}

#[derive(Debug, Default)]
pub struct BevySurface {
    ops: VecDeque<SurfaceOp>,
}

impl BevySurface {
    pub fn drain(&mut self) -> Vec<SurfaceOp> {
        self.ops.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.ops.len()
    }
}

impl RenderSurface for BevySurface {
    fn create_viewer(&mut self, viewer: ViewerHandle, spot: &Spot) {
        self.ops.push_back(SurfaceOp::CreateViewer {
            viewer,
            image_ref: spot.image_ref.clone(),
        });
    }

    fn watch_resize(&mut self, viewer: ViewerHandle, listener: ListenerHandle) {
        self.ops.push_back(SurfaceOp::WatchResize { viewer, listener });
    }

    fn attach_marker(&mut self, viewer: ViewerHandle, marker: &MarkerSpec) {
        self.ops.push_back(SurfaceOp::AttachMarker {
            viewer,
            marker: marker.clone(),
        });
    }

    fn dispose_viewer(&mut self, viewer: ViewerHandle) {
        self.ops.push_back(SurfaceOp::DisposeViewer(viewer));
    }

    fn show_model(&mut self, ticket: ModelTicket, model: &ModelSession) {
        self.ops.push_back(SurfaceOp::ShowModel {
            ticket,
            url: model.url.clone(),
            scale: Vec3::from_array(model.view_scale),
            offset: Vec3::from_array(model.view_offset),
        });
    }

    fn hide_model(&mut self) {
        self.ops.push_back(SurfaceOp::HideModel);
    }

    fn reset_environment(&mut self) {
        self.ops.push_back(SurfaceOp::ResetEnvironment);
    }
}

/// The tour's single panorama session
#[derive(Resource, Deref, DerefMut)]
pub struct TourSession(pub PanoramaSession<BevySurface>);

impl TourSession {
    pub fn new(catalog: Arc<Catalog>, settings: SessionSettings) -> Self {
        Self(PanoramaSession::new(BevySurface::default(), catalog, settings))
    }
}
