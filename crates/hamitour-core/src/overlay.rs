//! Model inspection overlay state
//!
//! Holds at most one [`ModelSession`]. Each open is stamped with a fresh
//! generation; load reports carrying an older ticket belong to a superseded
//! or closed session and are dropped.

use tracing::{debug, info, warn};

use crate::hotspot::{ModelPayload, SpeciesInfo};
use crate::resources::{Generation, GenerationCounter};

const FALLBACK_ERROR: &str = "Failed to load 3D model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelStatus {
    #[default]
    Closed,
    Opening,
    Loading,
    Ready,
    Error,
}

/// Identifies one open of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelTicket {
    pub generation: Generation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSession {
    pub ticket: ModelTicket,
    pub status: ModelStatus,
    pub url: String,
    pub view_scale: [f32; 3],
    pub view_offset: [f32; 3],
    pub info: SpeciesInfo,
    pub error_message: Option<String>,
}

#[derive(Debug, Default)]
pub struct ModelOverlay {
    generations: GenerationCounter,
    active: Option<ModelSession>,
}

impl ModelOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session, replacing any existing one
    pub fn open(&mut self, payload: &ModelPayload) -> ModelTicket {
        if let Some(previous) = self.active.take() {
            debug!(url = %previous.url, "Superseding open model");
        }
        let ticket = ModelTicket {
            generation: self.generations.advance(),
        };
        info!(url = %payload.model_url, generation = ticket.generation.0, "Opening model overlay");
        self.active = Some(ModelSession {
            ticket,
            status: ModelStatus::Opening,
            url: payload.model_url.clone(),
            view_scale: payload.view_scale,
            view_offset: payload.view_offset,
            info: payload.info.clone(),
            error_message: None,
        });
        ticket
    }

    fn current_mut(&mut self, ticket: ModelTicket) -> Option<&mut ModelSession> {
        match self.active.as_mut() {
            Some(session) if session.ticket == ticket => Some(session),
            _ => {
                debug!(generation = ticket.generation.0, "Dropping stale model report");
                None
            }
        }
    }

    /// Returns false when the ticket is stale
    pub fn begin_loading(&mut self, ticket: ModelTicket) -> bool {
        match self.current_mut(ticket) {
            Some(session) if session.status == ModelStatus::Opening => {
                session.status = ModelStatus::Loading;
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn finish(&mut self, ticket: ModelTicket) -> bool {
        match self.current_mut(ticket) {
            Some(session) => {
                session.status = ModelStatus::Ready;
                session.error_message = None;
                true
            }
            None => false,
        }
    }

    pub fn fail(&mut self, ticket: ModelTicket, message: &str) -> bool {
        match self.current_mut(ticket) {
            Some(session) => {
                let message = message.trim();
                warn!(url = %session.url, error = message, "Model failed to load");
                session.status = ModelStatus::Error;
                session.error_message = Some(if message.is_empty() {
                    FALLBACK_ERROR.to_string()
                } else {
                    message.to_string()
                });
                true
            }
            None => false,
        }
    }

    /// Close the overlay. Pending loads for the closed session become stale.
    pub fn close(&mut self) -> bool {
        match self.active.take() {
            Some(session) => {
                self.generations.advance();
                debug!(url = %session.url, "Closed model overlay");
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> Option<&ModelSession> {
        self.active.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> ModelStatus {
        self.active
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(ModelStatus::Closed)
    }
}
