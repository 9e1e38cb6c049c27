//! Viewer configuration: the embedded defaults plus browser query overrides

use anyhow::Context;
use hamitour_core::{SpotId, ViewerConfig};
use tracing::Level;

const EMBEDDED_CONFIG: &str = include_str!("../hamitour.toml");

/// Settings taken from the page URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserOverrides {
    /// `?spot=` - spot to open first
    pub spot: Option<SpotId>,
    /// `?spots=` - spot record endpoint template
    pub spots_endpoint: Option<String>,
    /// `?log=` - console log level
    pub log_level: Option<Level>,
}

impl BrowserOverrides {
    /// Read overrides from the current page's query string
    pub fn from_browser() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let search = window.location().search().unwrap_or_default();
        match web_sys::UrlSearchParams::new_with_str(&search) {
            Ok(params) => Self::from_lookup(|key| params.get(key)),
            Err(_) => Self::default(),
        }
    }

    /// Build overrides from a query parameter lookup
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            spot: non_empty("spot").map(SpotId::new),
            spots_endpoint: non_empty("spots"),
            log_level: non_empty("log").and_then(|level| level.parse().ok()),
        }
    }

    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(endpoint) = &self.spots_endpoint {
            tracing::info!(endpoint = %endpoint, "Using spot endpoint from URL parameter");
            config.spots.endpoint = Some(endpoint.clone());
        }
    }
}

/// Parse the embedded configuration and apply browser overrides
pub fn load_viewer_config(overrides: &BrowserOverrides) -> anyhow::Result<ViewerConfig> {
    let mut config =
        ViewerConfig::from_toml(EMBEDDED_CONFIG).context("embedded hamitour.toml is invalid")?;
    if cfg!(feature = "environment-reset") {
        config.teleport.environment_reset = true;
    }
    overrides.apply(&mut config);
    Ok(config)
}

/// Spot to open at startup: the URL's `?spot=` or the configured home spot
pub fn initial_spot(config: &ViewerConfig, overrides: &BrowserOverrides) -> Option<SpotId> {
    overrides.spot.clone().or_else(|| config.home_spot_id.clone())
}
