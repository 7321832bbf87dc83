//! Settings management
//!
//! Every field has a default, so a settings file only needs the values it
//! changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub simulation: SimulationSettings,
    pub exchange: ExchangeSettings,
    pub windows: WindowLayout,
    /// Stop after this many seconds; run until interrupted when absent.
    pub run_for_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub particle_count: usize,
    /// Velocity change per tick.
    pub gravity: f32,
    /// Peak per-axis noise displacement per tick.
    pub noise_amplitude: f32,
    /// Field time per elapsed millisecond.
    pub time_scale: f32,
    /// The viewport cube is `[-half_extent, half_extent]` on every axis.
    pub half_extent: f32,
    pub floor_y: f32,
    pub sea_level: f32,
    pub seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            particle_count: 150_000,
            gravity: -0.00005,
            noise_amplitude: 0.1,
            time_scale: 0.0002,
            half_extent: 2.5,
            floor_y: -2.5,
            sea_level: 2.5,
            seed: 0x5EED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Band inside the viewport edge that still counts as that edge.
    pub edge_threshold: f32,
    /// Screen pixels two windows may be offset and still count as adjacent.
    pub adjacency_tolerance_px: f32,
    pub poll_interval_ms: u64,
    /// LZ4-compress exit messages before writing them.
    pub compress: bool,
    pub store_quota_bytes: usize,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            edge_threshold: 0.1,
            adjacency_tolerance_px: 100.0,
            poll_interval_ms: 100,
            compress: true,
            store_quota_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Screen rectangle of one simulated viewport, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowSettings {
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowLayout(pub Vec<WindowSettings>);

impl Default for WindowLayout {
    /// Two windows side by side.
    fn default() -> Self {
        Self(vec![
            WindowSettings {
                title: "Drift".to_string(),
                x: 0.0,
                y: 0.0,
                width: 800.0,
                height: 600.0,
            },
            WindowSettings {
                title: "Drift".to_string(),
                x: 800.0,
                y: 0.0,
                width: 800.0,
                height: 600.0,
            },
        ])
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json(&text).map_err(|err| match err {
            SettingsError::Parse { source, .. } => SettingsError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(text).map_err(|source| SettingsError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let sim = &self.simulation;
        if sim.half_extent <= 0.0 {
            return Err(SettingsError::Invalid("half_extent must be positive".into()));
        }
        if sim.sea_level < sim.floor_y {
            return Err(SettingsError::Invalid(
                "sea_level must not be below floor_y".into(),
            ));
        }
        if self.exchange.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid("poll_interval_ms must be non-zero".into()));
        }
        if self.windows.0.is_empty() {
            return Err(SettingsError::Invalid("at least one window is required".into()));
        }
        Ok(())
    }
}
