//! # fenrelay-settings
//!
//! Settings are loaded in three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **User file**: `~/.fenrelay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `FENRELAY_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, load_settings_with, settings_path,
};
pub use types::*;
