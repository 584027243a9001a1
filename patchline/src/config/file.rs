use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use crate::model::Platform;

use super::error::{ConfigError, ConfigResult};

/// Profile whose session file the vendor source reads by default.
pub const DEFAULT_PROFILE: &str = "default";

/// Lifetime of the aggregator's on-disk version cache.
pub const DEFAULT_VERSION_TTL_MINUTES: u64 = 30;

const DEFAULT_LOG_LEVEL: &str = "info";

/// `~/.config/patchline` or the platform equivalent.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchline")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

/// `~/.local/share/patchline` or the platform equivalent.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchline")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficialSettings {
    /// Vendor API root. The vendor source is only registered when set.
    pub api_base: Option<String>,
    pub user_agent: Option<String>,
    /// Directory of `<profile>.json` session files.
    pub session_dir: Option<PathBuf>,
    pub profile: String,
}

impl Default for OfficialSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            user_agent: None,
            session_dir: None,
            profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageSettings {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub version_ttl_minutes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            version_ttl_minutes: DEFAULT_VERSION_TTL_MINUTES,
        }
    }
}

/// Overrides for the platform artifacts are resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformSettings {
    pub os: Option<String>,
    pub arch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive; `PATCHLINE_LOG` overrides it.
    pub level: String,
    /// Directory for the rolling log file. `None` logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFile {
    pub official: OfficialSettings,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub platform: PlatformSettings,
    pub logging: LoggingSettings,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let get = |section: &str, key: &str| non_empty(ini.get_from(Some(section), key));

        let mut config = Self::default();

        config.official.api_base = get("official", "api_base");
        config.official.user_agent = get("official", "user_agent");
        config.official.session_dir = get("official", "session_dir").map(PathBuf::from);
        if let Some(profile) = get("official", "profile") {
            config.official.profile = profile;
        }

        config.storage.data_dir = get("storage", "data_dir").map(PathBuf::from);

        if let Some(ttl) = get("cache", "version_ttl_minutes") {
            config.cache.version_ttl_minutes =
                ttl.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "cache.version_ttl_minutes".to_string(),
                    value: ttl.clone(),
                    reason: "expected a whole number of minutes".to_string(),
                })?;
        }

        config.platform.os = get("platform", "os");
        config.platform.arch = get("platform", "arch");

        if let Some(level) = get("logging", "level") {
            config.logging.level = level;
        }
        config.logging.directory = get("logging", "directory").map(PathBuf::from);

        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_file_path())
    }

    /// Write the file, creating its directory. Unset values are omitted.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }

        let mut ini = Ini::new();
        {
            let mut section = ini.with_section(Some("official"));
            if let Some(api_base) = &self.official.api_base {
                section.set("api_base", api_base.as_str());
            }
            if let Some(user_agent) = &self.official.user_agent {
                section.set("user_agent", user_agent.as_str());
            }
            if let Some(dir) = &self.official.session_dir {
                section.set("session_dir", dir.to_string_lossy());
            }
            section.set("profile", self.official.profile.as_str());
        }
        if let Some(dir) = &self.storage.data_dir {
            ini.with_section(Some("storage"))
                .set("data_dir", dir.to_string_lossy());
        }
        ini.with_section(Some("cache")).set(
            "version_ttl_minutes",
            self.cache.version_ttl_minutes.to_string(),
        );
        {
            let mut section = ini.with_section(Some("platform"));
            if let Some(os) = &self.platform.os {
                section.set("os", os.as_str());
            }
            if let Some(arch) = &self.platform.arch {
                section.set("arch", arch.as_str());
            }
        }
        {
            let mut section = ini.with_section(Some("logging"));
            section.set("level", self.logging.level.as_str());
            if let Some(dir) = &self.logging.directory {
                section.set("directory", dir.to_string_lossy());
            }
        }

        ini.write_to_file(path).map_err(write_error)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Descriptor directory.
    pub fn mirrors_dir(&self) -> PathBuf {
        self.data_dir().join("mirrors")
    }

    /// Aggregator version cache and patch snapshot directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }

    pub fn session_dir(&self) -> PathBuf {
        self.official
            .session_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("sessions"))
    }

    pub fn version_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.version_ttl_minutes * 60)
    }

    /// The configured platform, host values filling any gap.
    pub fn platform(&self) -> Platform {
        let host = Platform::host();
        Platform::new(
            self.platform.os.clone().unwrap_or(host.os),
            self.platform.arch.clone().unwrap_or(host.arch),
        )
    }
}
