//! Run settings
//!
//! Implements the 4-layer settings merge:
//! 1. Built-in defaults
//! 2. Settings file (`--config qxgen.toml`)
//! 3. `QX_*` environment variables
//! 4. CLI flags

mod defaults;
mod merge;
mod settings;

pub use defaults::{BuiltinDefaults, DEFAULT_REMOTE_URL, DEFAULT_USER_AGENT};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    is_settings_env_key, BackupSettings, FetchSettings, LoadedSettings, NotifySettings,
    PathSettings, Settings, SettingsError, SettingsOrigin, SettingsSource, SETTINGS_ENV_KEYS,
};
