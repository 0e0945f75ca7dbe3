//! # Storages, Repositories & the Registry
//!
//! The configuration-time model: a [`Storage`] is a named container of
//! [`Repository`] entries rooted at a base directory. The
//! [`StorageRegistry`] is built once at process init and is immutable for
//! the process lifetime (except the `in_service` flag, which an operator
//! flips in configuration between restarts).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StorageError;

/// Backing strategy of a repository, selecting its location resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    #[default]
    Hosted,
    Group,
    Proxy,
}

/// Version policy gating deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPolicy {
    Release,
    Snapshot,
    #[default]
    Mixed,
}

fn default_true() -> bool {
    true
}

/// A single repository within a storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Repository {
    pub id: String,
    #[serde(rename = "type", default)]
    pub repository_type: RepositoryType,
    #[serde(default)]
    pub policy: RepositoryPolicy,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default)]
    pub allows_redeployment: bool,
    #[serde(default = "default_true")]
    pub trash_enabled: bool,
    #[serde(default)]
    pub checksum_headers_enabled: bool,
    /// Filesystem root of this repository. Defaults to
    /// `<storage.basedir>/<id>` when omitted; always set after registry
    /// construction.
    #[serde(default)]
    pub basedir: Option<PathBuf>,
    /// Ordered member list for group repositories. Entries are repository
    /// ids, optionally qualified as `storageId:repositoryId`.
    #[serde(default)]
    pub group_repositories: Vec<String>,
}

impl Repository {
    /// The resolved filesystem root. Panics only if the repository never
    /// went through [`StorageRegistry`] construction, which resolves it.
    pub fn basedir(&self) -> &Path {
        self.basedir
            .as_deref()
            .expect("repository basedir resolved at registry construction")
    }

    pub fn is_group(&self) -> bool {
        self.repository_type == RepositoryType::Group
    }
}

/// A named container of repositories rooted at a base directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Storage {
    pub id: String,
    pub basedir: PathBuf,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl Storage {
    /// Look up a repository by id.
    pub fn repository(&self, repository_id: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.id == repository_id)
    }
}

/// Immutable lookup table of all configured storages, built at startup.
#[derive(Debug, Default)]
pub struct StorageRegistry {
    storages: HashMap<String, Storage>,
}

impl StorageRegistry {
    /// Build the registry, resolving every repository basedir that the
    /// configuration left implicit.
    pub fn new(storages: Vec<Storage>) -> Self {
        let mut map = HashMap::with_capacity(storages.len());
        for mut storage in storages {
            for repository in &mut storage.repositories {
                if repository.basedir.is_none() {
                    repository.basedir = Some(storage.basedir.join(&repository.id));
                }
            }
            map.insert(storage.id.clone(), storage);
        }
        Self { storages: map }
    }

    /// Look up a storage, failing with [`StorageError::StorageNotFound`].
    pub fn storage(&self, storage_id: &str) -> Result<&Storage, StorageError> {
        self.storages
            .get(storage_id)
            .ok_or_else(|| StorageError::StorageNotFound(storage_id.to_string()))
    }

    /// Look up a repository within a storage.
    pub fn repository(
        &self,
        storage_id: &str,
        repository_id: &str,
    ) -> Result<&Repository, StorageError> {
        self.storage(storage_id)?
            .repository(repository_id)
            .ok_or_else(|| StorageError::RepositoryNotFound(repository_id.to_string()))
    }

    /// Like [`repository`](Self::repository), but additionally refuses
    /// repositories that are out of service.
    pub fn repository_in_service(
        &self,
        storage_id: &str,
        repository_id: &str,
    ) -> Result<&Repository, StorageError> {
        let repository = self.repository(storage_id, repository_id)?;
        if !repository.in_service {
            return Err(StorageError::RepositoryOutOfService(format!(
                "{storage_id}:{repository_id}"
            )));
        }
        Ok(repository)
    }

    pub fn storages(&self) -> impl Iterator<Item = &Storage> {
        self.storages.values()
    }
}
