//! Addressable configuration keys for the `config` command.

use std::path::PathBuf;
use std::str::FromStr;

use super::error::{ConfigError, ConfigResult};
use super::file::ConfigFile;
use crate::official::DESKTOP_USER_AGENT;

/// A `section.key` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    OfficialApiBase,
    OfficialUserAgent,
    OfficialSessionDir,
    OfficialProfile,
    StorageDataDir,
    CacheVersionTtlMinutes,
    PlatformOs,
    PlatformArch,
    LoggingLevel,
    LoggingDirectory,
}

const ALL_KEYS: [ConfigKey; 10] = [
    ConfigKey::OfficialApiBase,
    ConfigKey::OfficialUserAgent,
    ConfigKey::OfficialSessionDir,
    ConfigKey::OfficialProfile,
    ConfigKey::StorageDataDir,
    ConfigKey::CacheVersionTtlMinutes,
    ConfigKey::PlatformOs,
    ConfigKey::PlatformArch,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingDirectory,
];

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::OfficialApiBase => "official.api_base",
            ConfigKey::OfficialUserAgent => "official.user_agent",
            ConfigKey::OfficialSessionDir => "official.session_dir",
            ConfigKey::OfficialProfile => "official.profile",
            ConfigKey::StorageDataDir => "storage.data_dir",
            ConfigKey::CacheVersionTtlMinutes => "cache.version_ttl_minutes",
            ConfigKey::PlatformOs => "platform.os",
            ConfigKey::PlatformArch => "platform.arch",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingDirectory => "logging.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split_once('.').map(|(s, _)| s).unwrap_or_default()
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split_once('.').map(|(_, k)| k).unwrap_or_default()
    }

    /// One-line help shown by `config list`.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigKey::OfficialApiBase => "Vendor patch API root; unset disables the official source",
            ConfigKey::OfficialUserAgent => "User agent sent to the vendor API",
            ConfigKey::OfficialSessionDir => "Directory holding <profile>.json session files",
            ConfigKey::OfficialProfile => "Launcher profile whose session is used",
            ConfigKey::StorageDataDir => "Root for mirror descriptors and caches",
            ConfigKey::CacheVersionTtlMinutes => "Minutes a merged version list stays fresh",
            ConfigKey::PlatformOs => "Operating system to resolve builds for",
            ConfigKey::PlatformArch => "CPU architecture to resolve builds for",
            ConfigKey::LoggingLevel => "Log filter, e.g. info or patchline=debug",
            ConfigKey::LoggingDirectory => "Directory for daily log files; unset logs to stderr only",
        }
    }

    /// The value actually used when the key is unset. Empty when the
    /// setting is simply off.
    pub fn effective(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::OfficialUserAgent => config
                .official
                .user_agent
                .clone()
                .unwrap_or_else(|| DESKTOP_USER_AGENT.to_string()),
            ConfigKey::OfficialSessionDir => config.session_dir().display().to_string(),
            ConfigKey::StorageDataDir => config.data_dir().display().to_string(),
            ConfigKey::PlatformOs => config.platform().os,
            ConfigKey::PlatformArch => config.platform().arch,
            _ => self.get(config),
        }
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::OfficialApiBase => config.official.api_base.clone().unwrap_or_default(),
            ConfigKey::OfficialUserAgent => config.official.user_agent.clone().unwrap_or_default(),
            ConfigKey::OfficialSessionDir => display_path(&config.official.session_dir),
            ConfigKey::OfficialProfile => config.official.profile.clone(),
            ConfigKey::StorageDataDir => display_path(&config.storage.data_dir),
            ConfigKey::CacheVersionTtlMinutes => config.cache.version_ttl_minutes.to_string(),
            ConfigKey::PlatformOs => config.platform.os.clone().unwrap_or_default(),
            ConfigKey::PlatformArch => config.platform.arch.clone().unwrap_or_default(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => display_path(&config.logging.directory),
        }
    }

    /// Set from text. An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ConfigKey::OfficialApiBase => {
                if let Some(url) = optional(value) {
                    url::Url::parse(&url).map_err(|e| invalid(&e.to_string()))?;
                }
                config.official.api_base = optional(value);
            }
            ConfigKey::OfficialUserAgent => config.official.user_agent = optional(value),
            ConfigKey::OfficialSessionDir => {
                config.official.session_dir = optional(value).map(PathBuf::from)
            }
            ConfigKey::OfficialProfile => {
                config.official.profile = optional(value).ok_or_else(|| invalid("profile cannot be empty"))?
            }
            ConfigKey::StorageDataDir => config.storage.data_dir = optional(value).map(PathBuf::from),
            ConfigKey::CacheVersionTtlMinutes => {
                config.cache.version_ttl_minutes = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("expected a whole number of minutes"))?
            }
            ConfigKey::PlatformOs => config.platform.os = optional(value),
            ConfigKey::PlatformArch => config.platform.arch = optional(value),
            ConfigKey::LoggingLevel => {
                config.logging.level = optional(value).ok_or_else(|| invalid("level cannot be empty"))?
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = optional(value).map(PathBuf::from)
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Platform;

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!(
            "cache.version_ttl_minutes".parse::<ConfigKey>().unwrap(),
            ConfigKey::CacheVersionTtlMinutes
        );
        assert_eq!("Platform.OS".parse::<ConfigKey>().unwrap(), ConfigKey::PlatformOs);
        assert!(matches!(
            "cache.size".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_names_split_into_section_and_key() {
        for key in ConfigKey::all() {
            assert_eq!(format!("{}.{}", key.section(), key.key_name()), key.name());
        }
        assert_eq!(ConfigKey::StorageDataDir.section(), "storage");
    }

    #[test]
    fn test_set_then_get() {
        let mut config = ConfigFile::default();
        ConfigKey::OfficialApiBase
            .set(&mut config, "https://api.example")
            .unwrap();
        ConfigKey::CacheVersionTtlMinutes.set(&mut config, " 12 ").unwrap();

        assert_eq!(ConfigKey::OfficialApiBase.get(&config), "https://api.example");
        assert_eq!(ConfigKey::CacheVersionTtlMinutes.get(&config), "12");

        ConfigKey::OfficialApiBase.set(&mut config, "").unwrap();
        assert_eq!(ConfigKey::OfficialApiBase.get(&config), "");
    }

    #[test]
    fn test_effective_fills_unset_keys() {
        let mut config = ConfigFile::default();
        ConfigKey::StorageDataDir.set(&mut config, "/srv/patchline").unwrap();

        assert_eq!(ConfigKey::OfficialSessionDir.get(&config), "");
        assert_eq!(
            ConfigKey::OfficialSessionDir.effective(&config),
            PathBuf::from("/srv/patchline").join("sessions").display().to_string()
        );
        assert_eq!(ConfigKey::OfficialUserAgent.effective(&config), DESKTOP_USER_AGENT);
        assert_eq!(ConfigKey::PlatformOs.effective(&config), Platform::host().os);
        assert_eq!(ConfigKey::OfficialApiBase.effective(&config), "");
        assert!(ConfigKey::all().iter().all(|key| !key.description().is_empty()));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::CacheVersionTtlMinutes.set(&mut config, "x").is_err());
        assert!(ConfigKey::OfficialApiBase.set(&mut config, "not a url").is_err());
        assert!(ConfigKey::OfficialProfile.set(&mut config, " ").is_err());
        assert_eq!(config, ConfigFile::default());
    }
}
