//! # heatrelay-settings
//!
//! Configuration for the heatmap relay, loaded from three layers (in
//! priority order):
//!
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.heatrelay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `HEATRELAY_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings_from_path, settings_path,
};
pub use types::{LogFormat, LoggingSettings, RelaySettings, ServerSettings, UpstreamSettings};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RelaySettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = RelaySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.ws_port, 3001);
        assert_eq!(settings.server.http_port, 3000);
        assert_eq!(settings.upstream.url, "ws://localhost:5000");
        assert_eq!(settings.upstream.reconnect_delay_ms, 3000);
        assert_eq!(settings.server.initial_status_delay_ms, 100);
        assert!(!settings.server.forward_raw_frames);
    }
}
