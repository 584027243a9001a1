//! Shared setup for commands that talk to sources.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use patchline::aggregator::SourceAggregator;
use patchline::config::ConfigFile;
use patchline::http::{HttpClient, ReqwestHttpClient};
use patchline::model::Platform;
use patchline::official::{FileSessionProvider, OfficialConfig, OfficialSource};
use patchline::source::VersionSource;
use patchline::store::DescriptorStore;

use crate::error::CliError;

/// Loaded configuration plus the objects built from it.
pub struct Context {
    pub config: ConfigFile,
    pub platform: Platform,
    pub http: Arc<dyn HttpClient>,
    pub store: DescriptorStore,
}

impl Context {
    pub fn load() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        Self::from_config(config)
    }

    pub fn from_config(config: ConfigFile) -> Result<Self, CliError> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
        let store = DescriptorStore::new(config.mirrors_dir());
        store.ensure_defaults()?;

        Ok(Self {
            platform: config.platform(),
            config,
            http,
            store,
        })
    }

    /// The vendor source, when an API base is configured.
    pub fn official_source(&self) -> Option<OfficialSource> {
        let api_base = self.config.official.api_base.as_deref()?;

        let mut official = OfficialConfig::new(api_base)
            .with_snapshot_path(self.config.cache_dir().join("patches.json"));
        if let Some(user_agent) = &self.config.official.user_agent {
            official = official.with_user_agent(user_agent.clone());
        }

        let sessions = Arc::new(FileSessionProvider::new(
            self.config.session_dir(),
            self.config.official.profile.clone(),
        ));

        Some(
            OfficialSource::new(official, self.http.clone(), sessions.clone(), sessions)
                .with_platform(self.platform.clone()),
        )
    }

    /// Aggregator over the vendor source and every stored mirror.
    pub fn aggregator(&self) -> Result<SourceAggregator, CliError> {
        let mut sources: Vec<Arc<dyn VersionSource>> = Vec::new();

        if let Some(official) = self.official_source() {
            sources.push(Arc::new(official));
        } else {
            debug!("No official API configured; using mirrors only");
        }
        for mirror in self.store.load_mirrors(self.http.clone(), &self.platform)? {
            sources.push(Arc::new(mirror));
        }

        Ok(SourceAggregator::new(self.platform.clone())
            .with_version_cache(
                self.config.cache_dir().join("versions.json"),
                self.config.version_ttl(),
            )
            .with_sources(sources))
    }
}

/// A token cancelled when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c() -> Result<CancellationToken, CliError> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    ctrlc::set_handler(move || trigger.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;
    Ok(cancel)
}

/// Spinner shown while waiting on the network.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
