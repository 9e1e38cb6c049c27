//! Browser navigation between spots
//!
//! Each navigation pushes a `?spot=` history entry and reopens the session.
//! Back/forward in the browser arrive through a `popstate` listener and reopen
//! the session without pushing.

use bevy::prelude::*;
use std::sync::{Arc, Mutex};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use hamitour_core::{SessionStatus, SpotId};
use hamitour_scene::{NavigateTo, TourConfig, TourSession};

use crate::config::BrowserOverrides;

/// Spot to open first, resolved from the URL and config
#[derive(Resource, Debug, Clone, Default)]
pub struct InitialSpot(pub Option<SpotId>);

/// Spot selected by the last browser back/forward
#[derive(Resource, Default, Clone)]
pub struct PendingPopState(pub Arc<Mutex<Option<SpotId>>>);

pub struct NavigationPlugin;

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingPopState>()
            .init_resource::<InitialSpot>()
            .add_systems(Startup, (install_popstate_listener, open_initial_spot))
            .add_systems(Update, (handle_navigation, apply_popstate));
    }
}

/// Query string for a spot's history entry
pub fn spot_query(id: &SpotId) -> String {
    format!("?spot={id}")
}

fn push_history(id: &SpotId) {
    let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
        return;
    };
    if let Err(e) = history.push_state_with_url(&JsValue::NULL, "", Some(&spot_query(id))) {
        tracing::warn!(spot_id = %id, error = ?e, "Failed to push history entry");
    }
}

fn install_popstate_listener(pending: Res<PendingPopState>, config: Res<TourConfig>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let slot = pending.0.clone();
    let home = config.home_spot_id.clone();

    let closure = Closure::<dyn FnMut(web_sys::PopStateEvent)>::new(move |_event: web_sys::PopStateEvent| {
        let target = BrowserOverrides::from_browser().spot.or_else(|| home.clone());
        if let (Some(id), Ok(mut slot)) = (target, slot.lock()) {
            *slot = Some(id);
        }
    });
    if let Err(e) = window.add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref()) {
        tracing::warn!(error = ?e, "Failed to install popstate listener");
    }
    // Lives for the whole page
    closure.forget();
}

fn open_initial_spot(initial: Res<InitialSpot>, mut session: ResMut<TourSession>) {
    match &initial.0 {
        Some(id) => {
            tracing::info!(spot_id = %id, "Opening initial spot");
            session.open(id.clone());
        }
        None => tracing::warn!("No spot requested and no home spot configured"),
    }
}

fn handle_navigation(mut requests: MessageReader<NavigateTo>, mut session: ResMut<TourSession>) {
    for NavigateTo(id) in requests.read() {
        let already_showing =
            session.current_spot_id() == Some(id) && session.status() != SessionStatus::Error;
        if already_showing {
            continue;
        }
        push_history(id);
        session.open(id.clone());
    }
}

fn apply_popstate(pending: Res<PendingPopState>, mut session: ResMut<TourSession>) {
    let target = match pending.0.try_lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => return,
    };
    if let Some(id) = target {
        if session.current_spot_id() != Some(&id) {
            tracing::info!(spot_id = %id, "Browser history navigation");
            session.open(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_query() {
        assert_eq!(
            spot_query(&SpotId::new("YCEKhHOU6eNHSqx10qSr")),
            "?spot=YCEKhHOU6eNHSqx10qSr"
        );
    }
}
