use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::descriptor::{is_safe_id, DescriptorError, MirrorDescriptor};
use crate::http::HttpClient;
use crate::mirror::MirrorSource;
use crate::model::Platform;

use super::error::{StoreError, StoreResult};

const DESCRIPTOR_EXTENSION: &str = "json";

/// One-file-per-mirror descriptor directory.
///
/// Files are named `{id}.json`. Loading never fails because of a bad file:
/// unparseable or invalid descriptors are logged and skipped.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    dir: PathBuf,
}

impl DescriptorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, DESCRIPTOR_EXTENSION))
    }

    /// Descriptor files in lexicographic order.
    fn files(&self) -> StoreResult<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            DESCRIPTOR_EXTENSION
        );
        let entries = glob::glob(&pattern).map_err(|e| StoreError::Glob(e.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable descriptor entry");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    fn read(path: &Path) -> StoreResult<MirrorDescriptor> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let mut descriptor = MirrorDescriptor::from_json(&json)?;

        // Disabled drafts may omit their id; the file name stands in.
        if descriptor.id.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                descriptor.id = stem.to_string();
            }
        }
        Ok(descriptor)
    }

    /// Load every valid descriptor, sorted ascending by priority.
    ///
    /// When two files declare the same id the lexicographically first file
    /// wins. The sort is stable, so equal priorities keep file order.
    pub fn load(&self) -> StoreResult<Vec<MirrorDescriptor>> {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();

        for path in self.files()? {
            match Self::read(&path) {
                Ok(descriptor) => {
                    if !seen.insert(descriptor.id.clone()) {
                        warn!(
                            id = %descriptor.id,
                            path = %path.display(),
                            "Duplicate mirror id, keeping the first file"
                        );
                        continue;
                    }
                    descriptors.push(descriptor);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid mirror descriptor");
                }
            }
        }

        descriptors.sort_by_key(|d| d.priority);
        debug!(count = descriptors.len(), dir = %self.dir.display(), "Loaded mirror descriptors");
        Ok(descriptors)
    }

    /// First run: create the descriptor directory. No mirrors ship by default.
    ///
    /// Returns `true` when the directory was created.
    pub fn ensure_defaults(&self) -> StoreResult<bool> {
        if self.dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        info!(dir = %self.dir.display(), "Created mirror descriptor directory");
        Ok(true)
    }

    /// Look up one descriptor by id among the valid files.
    pub fn get(&self, id: &str) -> StoreResult<Option<MirrorDescriptor>> {
        Ok(self.load()?.into_iter().find(|d| d.id == id))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).is_file()
    }

    /// Ids of all valid descriptors, sorted.
    pub fn list_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.load()?.into_iter().map(|d| d.id).collect();
        ids.sort();
        Ok(ids)
    }

    /// Write a descriptor to `{id}.json`, replacing the previous version.
    ///
    /// Fails when a differently named file already declares the same id.
    pub fn save(&self, descriptor: &MirrorDescriptor) -> StoreResult<PathBuf> {
        if !is_safe_id(&descriptor.id) {
            return Err(DescriptorError::InvalidId(descriptor.id.clone()).into());
        }
        descriptor.validate()?;

        let path = self.path_for(&descriptor.id);
        for other in self.files()? {
            if other == path {
                continue;
            }
            if let Ok(existing) = Self::read(&other) {
                if existing.id == descriptor.id {
                    return Err(StoreError::DuplicateId {
                        id: descriptor.id.clone(),
                        path: other,
                    });
                }
            }
        }

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let json = descriptor.to_json_pretty()?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json).map_err(|e| StoreError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| StoreError::io(&path, e))?;

        info!(id = %descriptor.id, path = %path.display(), "Saved mirror descriptor");
        Ok(path)
    }

    /// Remove `{id}.json`. Returns `false` when there was nothing to remove.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
        info!(id = %id, "Deleted mirror descriptor");
        Ok(true)
    }

    /// Enable or disable a mirror, keeping every other field.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> StoreResult<MirrorDescriptor> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let mut descriptor = Self::read(&path)?;
        descriptor.enabled = enabled;
        self.save(&descriptor)?;
        Ok(descriptor)
    }

    /// Build a mirror source for every valid descriptor, in priority order.
    pub fn load_mirrors(
        &self,
        http: Arc<dyn HttpClient>,
        platform: &Platform,
    ) -> StoreResult<Vec<MirrorSource>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|descriptor| MirrorSource::new(descriptor, http.clone()).with_platform(platform.clone()))
            .collect())
    }
}
