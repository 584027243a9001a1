//! Configuration file support.
//!
//! Settings live in an INI file at `~/.config/patchline/config.ini` (or the
//! platform equivalent). Every key is optional; absent keys fall back to
//! defaults so a missing file is a valid configuration.
//!
//! ```ini
//! [official]
//! api_base = https://api.vendor.example
//! session_dir = /home/me/.local/share/patchline/sessions
//!
//! [storage]
//! data_dir = /srv/patchline
//!
//! [cache]
//! version_ttl_minutes = 30
//!
//! [platform]
//! os = linux
//! arch = amd64
//!
//! [logging]
//! level = info
//! ```

mod error;
mod file;
mod keys;

pub use error::{ConfigError, ConfigResult};
pub use file::{
    config_dir, config_file_path, default_data_dir, CacheSettings, ConfigFile, LoggingSettings,
    OfficialSettings, PlatformSettings, StorageSettings, DEFAULT_PROFILE,
    DEFAULT_VERSION_TTL_MINUTES,
};
pub use keys::ConfigKey;
