//! # Group Resolver
//!
//! Serves a virtual repository that federates an ordered list of member
//! repositories. Resolution walks members in list order and returns the
//! first hit; the group itself owns no bytes, so writes and deletes are
//! structural errors.
//!
//! Membership may nest (a group containing a group) and may — through
//! configuration mistakes — form a cycle. Traversal is an explicit DFS
//! carrying a visited-set keyed by `(storageId, repositoryId)`; re-entering
//! a visited node is treated as a miss, not an error.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use crate::error::StorageError;
use crate::repository::{Repository, StorageRegistry};
use crate::resolvers::fs::FsResolver;
use crate::resolvers::{ArtifactStream, LocationResolver, StoreOutcome};

pub struct GroupResolver {
    registry: Arc<StorageRegistry>,
    fs: Arc<FsResolver>,
}

impl GroupResolver {
    pub fn new(registry: Arc<StorageRegistry>, fs: Arc<FsResolver>) -> Self {
        Self { registry, fs }
    }

    /// Member ids may be bare (`releases`, same storage) or qualified
    /// (`storage1:releases`).
    fn member_key(owning_storage: &str, member: &str) -> (String, String) {
        match member.split_once(':') {
            Some((storage_id, repository_id)) => {
                (storage_id.to_string(), repository_id.to_string())
            }
            None => (owning_storage.to_string(), member.to_string()),
        }
    }

    fn members<'a>(
        &self,
        storage_id: &str,
        repository: &'a Repository,
    ) -> Vec<(String, String)> {
        repository
            .group_repositories
            .iter()
            .map(|member| Self::member_key(storage_id, member))
            .collect()
    }

    fn resolve_visited(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Result<ArtifactStream, StorageError> {
        if !visited.insert((storage_id.to_string(), repository_id.to_string())) {
            // Cycle: treat the revisited node as empty.
            return Err(StorageError::not_found(storage_id, repository_id, path));
        }
        let repository = self.registry.repository(storage_id, repository_id)?;
        for (member_storage, member_repository) in self.members(storage_id, repository) {
            let member = self
                .registry
                .repository(&member_storage, &member_repository)?;
            let result = if member.is_group() {
                self.resolve_visited(&member_storage, &member_repository, path, visited)
            } else {
                self.fs.resolve(&member_storage, &member_repository, path)
            };
            match result {
                Ok(stream) => return Ok(stream),
                Err(StorageError::ArtifactNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::not_found(storage_id, repository_id, path))
    }

    fn contains_visited(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Result<bool, StorageError> {
        if !visited.insert((storage_id.to_string(), repository_id.to_string())) {
            return Ok(false);
        }
        let repository = self.registry.repository(storage_id, repository_id)?;
        for (member_storage, member_repository) in self.members(storage_id, repository) {
            let member = self
                .registry
                .repository(&member_storage, &member_repository)?;
            let found = if member.is_group() {
                self.contains_visited(&member_storage, &member_repository, path, visited)?
            } else {
                self.fs.contains(&member_storage, &member_repository, path)?
            };
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl LocationResolver for GroupResolver {
    fn resolve(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<ArtifactStream, StorageError> {
        let mut visited = HashSet::new();
        self.resolve_visited(storage_id, repository_id, path, &mut visited)
    }

    fn store(
        &self,
        _storage_id: &str,
        repository_id: &str,
        _path: &str,
        _source: &mut dyn Read,
    ) -> Result<StoreOutcome, StorageError> {
        Err(StorageError::WriteToGroupForbidden(repository_id.to_string()))
    }

    fn delete(
        &self,
        _storage_id: &str,
        repository_id: &str,
        _path: &str,
        _force: bool,
    ) -> Result<(), StorageError> {
        Err(StorageError::DeleteFromGroupForbidden(
            repository_id.to_string(),
        ))
    }

    fn contains(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<bool, StorageError> {
        let mut visited = HashSet::new();
        self.contains_visited(storage_id, repository_id, path, &mut visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Storage;
    use std::path::Path;

    const JAR: &str = "org/foo/foo/1.0/foo-1.0.jar";

    fn registry(basedir: &Path) -> Arc<StorageRegistry> {
        let storage: Storage = serde_json::from_value(serde_json::json!({
            "id": "storage0",
            "basedir": basedir.to_str().unwrap(),
            "repositories": [
                { "id": "r1", "type": "hosted" },
                { "id": "r2", "type": "hosted" },
                { "id": "offline", "type": "hosted", "inService": false },
                { "id": "g", "type": "group", "groupRepositories": ["r1", "r2"] },
                { "id": "nested", "type": "group", "groupRepositories": ["g", "r2"] },
                { "id": "cycle-a", "type": "group", "groupRepositories": ["cycle-b"] },
                { "id": "cycle-b", "type": "group", "groupRepositories": ["cycle-a", "r1"] }
            ]
        }))
        .unwrap();
        Arc::new(StorageRegistry::new(vec![storage]))
    }

    fn resolvers(basedir: &Path) -> (Arc<FsResolver>, GroupResolver) {
        let registry = registry(basedir);
        let fs = Arc::new(FsResolver::new(Arc::clone(&registry)));
        let group = GroupResolver::new(registry, Arc::clone(&fs));
        (fs, group)
    }

    fn store(fs: &FsResolver, repo: &str, bytes: &[u8]) {
        fs.store("storage0", repo, JAR, &mut &bytes[..]).unwrap();
    }

    #[test]
    fn first_member_wins() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, group) = resolvers(dir.path());
        store(&fs, "r1", b"from r1");
        store(&fs, "r2", b"from r2");

        let bytes = group
            .resolve("storage0", "g", JAR)
            .unwrap()
            .read_to_vec()
            .unwrap();
        assert_eq!(bytes, b"from r1");
    }

    #[test]
    fn falls_through_to_later_members() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, group) = resolvers(dir.path());
        store(&fs, "r2", b"from r2");

        let bytes = group
            .resolve("storage0", "g", JAR)
            .unwrap()
            .read_to_vec()
            .unwrap();
        assert_eq!(bytes, b"from r2");
    }

    #[test]
    fn miss_everywhere_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (_fs, group) = resolvers(dir.path());
        assert!(matches!(
            group.resolve("storage0", "g", JAR),
            Err(StorageError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn nested_group_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, group) = resolvers(dir.path());
        store(&fs, "r2", b"from r2");

        let bytes = group
            .resolve("storage0", "nested", JAR)
            .unwrap()
            .read_to_vec()
            .unwrap();
        assert_eq!(bytes, b"from r2");
    }

    #[test]
    fn cyclic_membership_terminates_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, group) = resolvers(dir.path());
        assert!(matches!(
            group.resolve("storage0", "cycle-a", JAR),
            Err(StorageError::ArtifactNotFound { .. })
        ));

        // A member after the cycle is still tried.
        store(&fs, "r1", b"beyond the cycle");
        let bytes = group
            .resolve("storage0", "cycle-a", JAR)
            .unwrap()
            .read_to_vec()
            .unwrap();
        assert_eq!(bytes, b"beyond the cycle");
    }

    #[test]
    fn store_on_group_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let (_fs, group) = resolvers(dir.path());
        let err = group
            .store("storage0", "g", JAR, &mut &b"x"[..])
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteToGroupForbidden(_)));
        assert!(format!("{err}").contains("group"));
    }

    #[test]
    fn delete_on_group_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let (_fs, group) = resolvers(dir.path());
        let err = group.delete("storage0", "g", JAR, false).unwrap_err();
        assert!(matches!(err, StorageError::DeleteFromGroupForbidden(_)));
    }

    #[test]
    fn contains_is_ordered_or() {
        let dir = tempfile::tempdir().unwrap();
        let (fs, group) = resolvers(dir.path());
        assert!(!group.contains("storage0", "g", JAR).unwrap());
        store(&fs, "r2", b"x");
        assert!(group.contains("storage0", "g", JAR).unwrap());
    }
}
