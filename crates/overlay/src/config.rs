use foundation::geom::Extent;
use serde::{Deserialize, Serialize};

use crate::placement::PlacementRules;

pub const DEFAULT_THROTTLE_INTERVAL_MS: u64 = picking::controller::DEFAULT_PICK_INTERVAL_MS;
pub const DEFAULT_HOVER_BOX: Extent = Extent::new(280.0, 160.0);
pub const DEFAULT_PINNED_BOX: Extent = Extent::new(350.0, 300.0);
pub const DEFAULT_VIEWPORT: Extent = Extent::new(1280.0, 720.0);
pub const DEFAULT_INTENT_LOG_CAPACITY: usize = 256;
pub const MAX_INTENT_LOG_CAPACITY: usize = 65_536;

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "config parse error: {err}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Tunables for the overlay controller. Every field has a default, so a
/// partial JSON document (or `{}`) is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Minimum spacing between hover picks.
    pub throttle_interval_ms: u64,
    /// `offset`, `margin` and `chrome_band` live at the top level.
    #[serde(flatten)]
    pub placement: PlacementRules,
    pub hover_box: Extent,
    pub pinned_box: Extent,
    /// Initial viewport; updated at runtime via `set_viewport`.
    pub viewport: Extent,
    pub intent_log_capacity: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: DEFAULT_THROTTLE_INTERVAL_MS,
            placement: PlacementRules::default(),
            hover_box: DEFAULT_HOVER_BOX,
            pinned_box: DEFAULT_PINNED_BOX,
            viewport: DEFAULT_VIEWPORT,
            intent_log_capacity: DEFAULT_INTENT_LOG_CAPACITY,
        }
    }
}

impl OverlayConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.placement;
        for (name, value) in [
            ("offset", rules.offset),
            ("margin", rules.margin),
            ("chrome_band", rules.chrome_band),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        for (name, extent) in [
            ("hover_box", self.hover_box),
            ("pinned_box", self.pinned_box),
            ("viewport", self.viewport),
        ] {
            if !extent.w.is_finite() || !extent.h.is_finite() || extent.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must have positive finite dimensions, got {}x{}",
                    extent.w, extent.h
                )));
            }
        }
        if !(1..=MAX_INTENT_LOG_CAPACITY).contains(&self.intent_log_capacity) {
            return Err(ConfigError::Invalid(format!(
                "intent_log_capacity must be within 1..={MAX_INTENT_LOG_CAPACITY}, got {}",
                self.intent_log_capacity
            )));
        }
        Ok(())
    }
}
