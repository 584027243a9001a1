//! Collaborator traits consumed by the vendor source.
//!
//! Login and token issuance live outside this crate. The vendor source only
//! needs to obtain a currently valid session, to ask for a refresh when the
//! API rejects a token, and to know (without network access) whether any
//! official account is configured at all.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An authenticated vendor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub profile: String,
    pub access_token: String,
}

/// Provides and refreshes official sessions.
pub trait AuthProvider: Send + Sync {
    /// A currently valid session, or `None` when no official login exists.
    fn current_session<'a>(&'a self, cancel: &'a CancellationToken)
        -> BoxFuture<'a, Option<Session>>;

    /// Force a token refresh and return the new session.
    fn force_refresh<'a>(&'a self, cancel: &'a CancellationToken)
        -> BoxFuture<'a, Option<Session>>;
}

/// A configured launcher profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub is_official: bool,
    pub session_file: Option<PathBuf>,
}

impl Profile {
    /// True when the profile is official and its session file exists.
    pub fn has_official_session(&self) -> bool {
        self.is_official
            && self
                .session_file
                .as_deref()
                .map(Path::exists)
                .unwrap_or(false)
    }
}

/// Lists known profiles.
pub trait ProfileProvider: Send + Sync {
    fn profiles(&self) -> Vec<Profile>;
}

/// Session file contents written by the login flow.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    access_token: String,
    #[serde(default = "official_default")]
    official: bool,
}

fn official_default() -> bool {
    true
}

/// Sessions read from `<dir>/<profile>.json`.
///
/// The login flow owns these files; a refresh simply re-reads the file in
/// case the flow has rotated the token meanwhile.
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    session_dir: PathBuf,
    profile: String,
}

impl FileSessionProvider {
    pub fn new(session_dir: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            session_dir: session_dir.into(),
            profile: profile.into(),
        }
    }

    fn session_path(&self) -> PathBuf {
        self.session_dir.join(format!("{}.json", self.profile))
    }

    async fn read(&self) -> Option<Session> {
        let path = self.session_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No session file");
                return None;
            }
        };
        match serde_json::from_str::<SessionFile>(&contents) {
            Ok(file) if file.official && !file.access_token.is_empty() => Some(Session {
                profile: self.profile.clone(),
                access_token: file.access_token,
            }),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed session file");
                None
            }
        }
    }
}

impl AuthProvider for FileSessionProvider {
    fn current_session<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<Session>> {
        Box::pin(self.read())
    }

    fn force_refresh<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Option<Session>> {
        Box::pin(self.read())
    }
}

impl ProfileProvider for FileSessionProvider {
    fn profiles(&self) -> Vec<Profile> {
        vec![Profile {
            name: self.profile.clone(),
            is_official: true,
            session_file: Some(self.session_path()),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_session_round_trip() {
        let dir = TempDir::new().unwrap();
        let provider = FileSessionProvider::new(dir.path(), "main");
        let cancel = CancellationToken::new();

        assert!(provider.current_session(&cancel).await.is_none());
        assert!(!provider.profiles()[0].has_official_session());

        std::fs::write(dir.path().join("main.json"), r#"{"accessToken":"abc"}"#).unwrap();

        let session = provider.current_session(&cancel).await.unwrap();
        assert_eq!(session.access_token, "abc");
        assert_eq!(session.profile, "main");
        assert!(provider.profiles()[0].has_official_session());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_rotated_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.json");
        std::fs::write(&path, r#"{"accessToken":"old"}"#).unwrap();
        let provider = FileSessionProvider::new(dir.path(), "main");
        let cancel = CancellationToken::new();

        std::fs::write(&path, r#"{"accessToken":"new"}"#).unwrap();
        let session = provider.force_refresh(&cancel).await.unwrap();
        assert_eq!(session.access_token, "new");
    }

    #[tokio::test]
    async fn test_unofficial_or_malformed_session_ignored() {
        let dir = TempDir::new().unwrap();
        let provider = FileSessionProvider::new(dir.path(), "main");
        let cancel = CancellationToken::new();

        std::fs::write(dir.path().join("main.json"), r#"{"accessToken":"t","official":false}"#)
            .unwrap();
        assert!(provider.current_session(&cancel).await.is_none());

        std::fs::write(dir.path().join("main.json"), "not json").unwrap();
        assert!(provider.current_session(&cancel).await.is_none());
    }
}
