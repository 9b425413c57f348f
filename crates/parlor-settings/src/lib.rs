//! # parlor-settings
//!
//! Configuration for the Parlor server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`ParlorSettings::default()`]
//! 2. **Settings file**: `~/.parlor/settings.json` or an explicit path,
//!    deep-merged over the defaults
//! 3. **Environment variables**: `PORT` and `PARLOR_*` overrides
//!
//! Loaded settings are validated before use; see [`ParlorSettings::validate`].
//! There is no global instance: the binary loads settings once and passes
//! them down.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
