//! Drift Services Layer
//!
//! Platform-facing pieces: settings and viewport input events.

pub mod input;
pub mod settings;

pub use input::ViewportEvent;
pub use settings::{Settings, SettingsError};
