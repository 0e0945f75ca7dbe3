//! # Filesystem Resolver
//!
//! The only resolver that owns bytes: every artifact of a `hosted` (or
//! `proxy`) repository lives under that repository's base directory.
//!
//! ## Write Atomicity
//!
//! `store` streams the upload into a uniquely-named temp file in the target
//! directory while digesting it, writes both checksum sidecars to temp
//! names, then renames sidecars first and the artifact last. A reader can
//! never observe an artifact whose sidecars disagree with it, and a client
//! disconnect mid-upload leaves only a temp file that is cleaned up.
//! Writers to the same path are serialized by a per-path lock; readers
//! never block because they only ever see complete renamed files.
//!
//! ## Trash
//!
//! With `trash_enabled` (the default), non-forced deletes move the artifact
//! and its sidecars to `<basedir>/.trash/<path>` instead of unlinking.
//! `force = true` always removes permanently.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use citadel_core::coords::is_checksum;
use citadel_core::digest::DigestingWriter;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StorageError;
use crate::repository::{Repository, StorageRegistry};
use crate::resolvers::{ArtifactStream, LocationResolver, StoreOutcome};

/// Directory under a repository basedir holding soft-deleted artifacts.
pub const TRASH_DIR: &str = ".trash";

/// Lexically validate a repository-relative path and join it onto the
/// repository base directory. Absolute paths and `..` traversal are
/// rejected before any filesystem access.
pub(crate) fn repository_path(
    repository: &Repository,
    path: &str,
) -> Result<PathBuf, StorageError> {
    let relative = Path::new(path);
    if path.is_empty() || relative.is_absolute() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(StorageError::InvalidPath(path.to_string())),
        }
    }
    Ok(repository.basedir().join(relative))
}

pub struct FsResolver {
    registry: Arc<StorageRegistry>,
    write_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl FsResolver {
    pub fn new(registry: Arc<StorageRegistry>) -> Self {
        Self {
            registry,
            write_locks: DashMap::new(),
        }
    }

    fn write_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolve an existing path to its canonical form and verify it did not
    /// escape the repository root through symlinks.
    fn canonical_existing(
        &self,
        repository: &Repository,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<PathBuf, StorageError> {
        let joined = repository_path(repository, path)?;
        let canonical_base = repository
            .basedir()
            .canonicalize()
            .map_err(|_| StorageError::not_found(storage_id, repository_id, path))?;
        let canonical = joined
            .canonicalize()
            .map_err(|_| StorageError::not_found(storage_id, repository_id, path))?;
        if !canonical.starts_with(&canonical_base) {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(canonical)
    }

    /// Move a live file into the repository trash, preserving its
    /// repository-relative path.
    fn move_to_trash(
        &self,
        repository: &Repository,
        relative: &str,
        file: &Path,
    ) -> Result<(), StorageError> {
        let target = repository.basedir().join(TRASH_DIR).join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Replace any earlier trashed copy of the same path.
        if target.is_dir() {
            std::fs::remove_dir_all(&target)?;
        } else if target.exists() {
            std::fs::remove_file(&target)?;
        }
        std::fs::rename(file, target)?;
        Ok(())
    }

    fn remove_one(
        &self,
        repository: &Repository,
        relative: &str,
        file: &Path,
        force: bool,
    ) -> Result<(), StorageError> {
        if !force && repository.trash_enabled {
            self.move_to_trash(repository, relative, file)
        } else if file.is_dir() {
            std::fs::remove_dir_all(file).map_err(StorageError::from)
        } else {
            std::fs::remove_file(file).map_err(StorageError::from)
        }
    }
}

impl LocationResolver for FsResolver {
    fn resolve(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<ArtifactStream, StorageError> {
        let repository = self.registry.repository(storage_id, repository_id)?;
        let canonical = self.canonical_existing(repository, storage_id, repository_id, path)?;
        if canonical.is_dir() {
            return Err(StorageError::not_found(storage_id, repository_id, path));
        }
        let file = std::fs::File::open(&canonical)
            .map_err(|_| StorageError::not_found(storage_id, repository_id, path))?;
        ArtifactStream::from_file(file).map_err(StorageError::from)
    }

    fn store(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        source: &mut dyn Read,
    ) -> Result<StoreOutcome, StorageError> {
        let repository = self.registry.repository(storage_id, repository_id)?;
        let target = repository_path(repository, path)?;
        let dir = target
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        std::fs::create_dir_all(dir)?;
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?
            .to_string();

        let lock = self.write_lock(&target);
        let _guard = lock.lock().expect("artifact write lock poisoned");

        let token = Uuid::new_v4();
        let temp = dir.join(format!(".{file_name}.{token}.tmp"));
        let mut temps = vec![temp.clone()];

        let result = (|| -> Result<StoreOutcome, StorageError> {
            if is_checksum(path) {
                // Client-supplied sidecars are stored verbatim, undigested.
                let mut file = std::fs::File::create(&temp)?;
                std::io::copy(source, &mut file)?;
                std::fs::rename(&temp, &target)?;
                return Ok(StoreOutcome { digests: None });
            }

            let mut writer = DigestingWriter::new(std::fs::File::create(&temp)?);
            std::io::copy(source, &mut writer)?;
            let (_, digests) = writer.finalize()?;

            // Sidecars first, artifact last: a visible artifact always has
            // agreeing sidecars.
            for (extension, digest) in [("md5", &digests.md5), ("sha1", &digests.sha1)] {
                let sidecar_temp = dir.join(format!(".{file_name}.{extension}.{token}.tmp"));
                temps.push(sidecar_temp.clone());
                std::fs::write(&sidecar_temp, digest)?;
                std::fs::rename(&sidecar_temp, dir.join(format!("{file_name}.{extension}")))?;
            }
            std::fs::rename(&temp, &target)?;

            tracing::debug!(
                storage = storage_id,
                repository = repository_id,
                path,
                sha1 = %digests.sha1,
                "stored artifact"
            );
            Ok(StoreOutcome {
                digests: Some(digests),
            })
        })();

        if result.is_err() {
            for temp in temps {
                let _ = std::fs::remove_file(temp);
            }
        }
        result
    }

    fn delete(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        force: bool,
    ) -> Result<(), StorageError> {
        let repository = self.registry.repository(storage_id, repository_id)?;
        let canonical = self.canonical_existing(repository, storage_id, repository_id, path)?;

        if canonical.is_dir() {
            // Version-directory delete.
            return self.remove_one(repository, path, &canonical, force);
        }

        self.remove_one(repository, path, &canonical, force)?;
        for extension in ["md5", "sha1"] {
            let sidecar = PathBuf::from(format!("{}.{extension}", canonical.display()));
            if sidecar.exists() {
                self.remove_one(repository, &format!("{path}.{extension}"), &sidecar, force)?;
            }
        }
        tracing::debug!(
            storage = storage_id,
            repository = repository_id,
            path,
            force,
            "deleted artifact"
        );
        Ok(())
    }

    fn contains(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<bool, StorageError> {
        let repository = self.registry.repository(storage_id, repository_id)?;
        match self.canonical_existing(repository, storage_id, repository_id, path) {
            Ok(_) => Ok(true),
            Err(StorageError::ArtifactNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
