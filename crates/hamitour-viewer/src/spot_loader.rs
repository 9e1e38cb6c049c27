//! Spot lookups requested by the session
//!
//! Fetch requests are answered from the inline directory when possible,
//! otherwise by a single HTTP GET against the configured endpoint. Results
//! are queued and handed back to the session on the next frame; the session
//! drops any that belong to a superseded open.

use bevy::prelude::*;
use std::sync::{Arc, Mutex};

use hamitour_core::{
    decode_spot_record, FetchTicket, SessionEvent, Spot, SpotError, SpotId, SpotRecordFormat,
    SpotSource, SpotsConfig, StaticSpotDirectory,
};
use hamitour_scene::{NavigateTo, TourSession};

type FetchResult = (FetchTicket, Result<Spot, SpotError>);

/// Completed lookups waiting to be delivered
#[derive(Resource, Default, Clone)]
pub struct PendingSpots(pub Arc<Mutex<Vec<FetchResult>>>);

impl PendingSpots {
    fn push(&self, ticket: FetchTicket, result: Result<Spot, SpotError>) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push((ticket, result));
        }
    }
}

/// Where spot records come from
#[derive(Resource)]
pub struct SpotLookup {
    directory: StaticSpotDirectory,
    spots: SpotsConfig,
}

impl SpotLookup {
    pub fn new(spots: &SpotsConfig) -> Self {
        Self {
            directory: spots.directory(),
            spots: spots.clone(),
        }
    }
}

pub struct SpotLoaderPlugin {
    pub spots: SpotsConfig,
}

impl Plugin for SpotLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingSpots>()
            .insert_resource(SpotLookup::new(&self.spots))
            .add_systems(Update, (dispatch_session_events, deliver_fetched_spots).chain());
    }
}

/// Map an HTTP status to a lookup error
pub fn status_error(status: u16, id: &SpotId) -> Option<SpotError> {
    match status {
        200..=299 => None,
        404 => Some(SpotError::NotFound(id.clone())),
        _ => Some(SpotError::Transport(format!("HTTP {status}"))),
    }
}

async fn fetch_spot_record(url: String, id: SpotId, format: SpotRecordFormat) -> Result<Spot, SpotError> {
    let response = gloo_net::http::Request::get(&url)
        .send()
        .await
        .map_err(|e| SpotError::Transport(e.to_string()))?;
    if let Some(err) = status_error(response.status(), &id) {
        return Err(err);
    }
    let body = response
        .text()
        .await
        .map_err(|e| SpotError::Transport(e.to_string()))?;
    decode_spot_record(&id, &body, format)
}

fn start_lookup(ticket: FetchTicket, lookup: &SpotLookup, pending: &PendingSpots) {
    let id = ticket.spot_id.clone();

    if lookup.directory.contains(&id) {
        tracing::debug!(spot_id = %id, "Spot served from inline directory");
        pending.push(ticket, lookup.directory.fetch_spot(&id));
        return;
    }

    let Some(url) = lookup.spots.endpoint_for(&id) else {
        tracing::warn!(spot_id = %id, "No spot endpoint configured");
        pending.push(ticket, Err(SpotError::NotFound(id)));
        return;
    };

    tracing::info!(spot_id = %id, url = %url, "Fetching spot record");
    let format = lookup.spots.format;
    let pending = pending.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let result = fetch_spot_record(url, id.clone(), format).await;
        if let Err(e) = &result {
            tracing::warn!(spot_id = %id, error = %e, "Spot lookup failed");
        }
        pending.push(ticket, result);
    });
}

/// Act on everything the session asked the host for
fn dispatch_session_events(
    mut session: ResMut<TourSession>,
    lookup: Res<SpotLookup>,
    pending: Res<PendingSpots>,
    mut navigate: MessageWriter<NavigateTo>,
) {
    for event in session.drain_events() {
        match event {
            SessionEvent::FetchRequested(ticket) => start_lookup(ticket, &lookup, &pending),
            SessionEvent::NavigationRequested(id) => {
                navigate.write(NavigateTo(id));
            }
            SessionEvent::StatusChanged(status) => {
                tracing::debug!(?status, "Session status changed");
            }
        }
    }
}

fn deliver_fetched_spots(mut session: ResMut<TourSession>, pending: Res<PendingSpots>) {
    let completed: Vec<FetchResult> = match pending.0.try_lock() {
        Ok(mut queue) => queue.drain(..).collect(),
        Err(_) => return,
    };
    for (ticket, result) in completed {
        let generation = ticket.generation.0;
        if !session.complete_fetch(ticket, result) {
            tracing::debug!(generation, "Discarded stale spot lookup");
        }
    }
}
