//! # Artifact Management Service
//!
//! The façade the HTTP layer talks to. Selects a location resolver by
//! repository type, gates writes through the validation pipeline, streams
//! bytes through the checksum engine, and keeps the checksum cache and
//! per-directory metadata indices in step with every store and delete.
//!
//! The resolver registry (`repository.type → resolver`) is assembled here
//! once at construction; there is no dynamic lookup anywhere else.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use citadel_core::coords::{self, ArtifactCoordinates, PathClass};
use citadel_core::digest::{parse_checksum_token, ChecksumAlgorithm, DigestingReader, ALGORITHMS};

use crate::cache::ChecksumCache;
use crate::error::StorageError;
use crate::metadata::{self, MetadataLevel, MetadataManager};
use crate::repository::{Repository, RepositoryType, StorageRegistry};
use crate::resolvers::fs::{repository_path, FsResolver};
use crate::resolvers::group::GroupResolver;
use crate::resolvers::{ArtifactStream, LocationResolver};
use crate::validation::{ValidationContext, ValidationPipeline};

pub struct ArtifactService {
    registry: Arc<StorageRegistry>,
    resolvers: HashMap<RepositoryType, Arc<dyn LocationResolver>>,
    cache: Arc<ChecksumCache>,
    metadata: MetadataManager,
    validators: ValidationPipeline,
}

impl ArtifactService {
    pub fn new(registry: Arc<StorageRegistry>, cache: Arc<ChecksumCache>) -> Self {
        let fs = Arc::new(FsResolver::new(Arc::clone(&registry)));
        let group = Arc::new(GroupResolver::new(Arc::clone(&registry), Arc::clone(&fs)));

        let mut resolvers: HashMap<RepositoryType, Arc<dyn LocationResolver>> = HashMap::new();
        resolvers.insert(RepositoryType::Hosted, fs.clone() as Arc<dyn LocationResolver>);
        // A proxy serves its local cache directory through the FS resolver.
        resolvers.insert(RepositoryType::Proxy, fs as Arc<dyn LocationResolver>);
        resolvers.insert(RepositoryType::Group, group as Arc<dyn LocationResolver>);

        Self {
            registry,
            resolvers,
            cache,
            metadata: MetadataManager::new(),
            validators: ValidationPipeline::standard(),
        }
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ChecksumCache> {
        &self.cache
    }

    /// Repository lookup for the HTTP layer's header decisions.
    pub fn repository(
        &self,
        storage_id: &str,
        repository_id: &str,
    ) -> Result<&Repository, StorageError> {
        self.registry.repository(storage_id, repository_id)
    }

    fn resolver_for(&self, repository: &Repository) -> &dyn LocationResolver {
        self.resolvers
            .get(&repository.repository_type)
            .expect("all repository types registered at construction")
            .as_ref()
    }

    fn cache_key(storage_id: &str, repository_id: &str, path: &str) -> String {
        format!("{storage_id}:{repository_id}:{path}")
    }

    /// Open a byte source for the artifact. Refuses out-of-service
    /// repositories. Metadata files are parsed through the metadata
    /// manager before being served: a corrupt index is logged and treated
    /// as absent, never handed out raw.
    pub fn resolve(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<ArtifactStream, StorageError> {
        let repository = self
            .registry
            .repository_in_service(storage_id, repository_id)?;
        if coords::is_metadata(path) && !repository.is_group() {
            self.require_readable_metadata(repository, storage_id, repository_id, path)?;
        }
        self.resolver_for(repository)
            .resolve(storage_id, repository_id, path)
    }

    /// Read-side gate for metadata files: `Ok` only when the on-disk index
    /// parses. A file that exists but is corrupt is logged and reported as
    /// absent; write paths still surface the corruption as an error.
    fn require_readable_metadata(
        &self,
        repository: &Repository,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<(), StorageError> {
        let absolute = repository_path(repository, path)?;
        let Some(dir) = absolute.parent() else {
            return Ok(());
        };
        match self.metadata.read(dir) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(StorageError::not_found(storage_id, repository_id, path)),
            Err(StorageError::MetadataCorrupt(reason)) => {
                tracing::warn!(
                    storage = storage_id,
                    repository = repository_id,
                    path,
                    reason = %reason,
                    "corrupt metadata treated as absent for read"
                );
                Err(StorageError::not_found(storage_id, repository_id, path))
            }
            Err(e) => Err(e),
        }
    }

    /// Read the complete artifact, refreshing the checksum cache from the
    /// streamed digests. Partial reads never reach the cache; this method
    /// is the only read path that updates it.
    pub fn read(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let stream = self.resolve(storage_id, repository_id, path)?;
        let mut reader = DigestingReader::new(stream);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if PathClass::of(path) == PathClass::Artifact {
            let digests = reader.finalize();
            self.cache
                .put_all(&Self::cache_key(storage_id, repository_id, path), &digests);
        }
        Ok(bytes)
    }

    /// Side-effect-free existence check.
    pub fn contains(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<bool, StorageError> {
        let repository = self.registry.repository(storage_id, repository_id)?;
        self.resolver_for(repository)
            .contains(storage_id, repository_id, path)
    }

    /// Store an upload: checksum sidecars verbatim, metadata through the
    /// metadata manager, artifacts through validation + digesting write +
    /// cache refresh + directory metadata update.
    pub fn store(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        source: &mut dyn Read,
    ) -> Result<(), StorageError> {
        let repository = self
            .registry
            .repository_in_service(storage_id, repository_id)?;
        if repository.is_group() {
            return Err(StorageError::WriteToGroupForbidden(
                repository_id.to_string(),
            ));
        }
        let resolver = self.resolver_for(repository);

        if coords::is_checksum(path) {
            // Uploaded sidecars are stored verbatim, without validation.
            resolver.store(storage_id, repository_id, path, source)?;
            return Ok(());
        }

        if coords::is_metadata(path) {
            return self.store_uploaded_metadata(repository, path, source);
        }

        let coordinates = ArtifactCoordinates::parse(path)?;
        let path_exists = resolver.contains(storage_id, repository_id, path)?;
        self.validators.validate(&ValidationContext {
            repository,
            coordinates: &coordinates,
            path_exists,
        })?;

        let outcome = resolver.store(storage_id, repository_id, path, source)?;
        if let Some(digests) = &outcome.digests {
            self.cache
                .put_all(&Self::cache_key(storage_id, repository_id, path), digests);
        }

        // g/a/v/file → the versions index lives in g/a.
        let absolute = repository_path(repository, path)?;
        let artifact_dir = absolute
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        self.metadata.add_version(
            artifact_dir,
            &coordinates.group_id,
            &coordinates.artifact_id,
            &coordinates.version,
            coordinates.is_snapshot(),
        )?;

        tracing::info!(
            storage = storage_id,
            repository = repository_id,
            path,
            "artifact deployed"
        );
        Ok(())
    }

    /// An uploaded `maven-metadata.xml` goes through the metadata manager
    /// so sidecars and the atomic-rename discipline apply to it too.
    fn store_uploaded_metadata(
        &self,
        repository: &Repository,
        path: &str,
        source: &mut dyn Read,
    ) -> Result<(), StorageError> {
        let mut xml = String::new();
        source.read_to_string(&mut xml).map_err(|e| {
            StorageError::MetadataCorrupt(format!("uploaded metadata is not UTF-8: {e}"))
        })?;
        let parsed = metadata::deserialize(&xml)
            .map_err(|reason| StorageError::MetadataCorrupt(format!("{path}: {reason}")))?;

        let absolute = repository_path(repository, path)?;
        let dir = absolute
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        self.metadata
            .store(dir, None, &parsed, MetadataLevel::ArtifactRootLevel)
    }

    /// Delete the artifact (or version directory), its sidecars, its cache
    /// entry, and its entry in the directory metadata.
    pub fn delete(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        force: bool,
    ) -> Result<(), StorageError> {
        let repository = self.registry.repository(storage_id, repository_id)?;
        let resolver = self.resolver_for(repository);

        let was_directory = !repository.is_group()
            && repository_path(repository, path).is_ok_and(|p| p.is_dir());

        resolver.delete(storage_id, repository_id, path, force)?;
        self.cache
            .invalidate(&Self::cache_key(storage_id, repository_id, path));

        // Metadata upkeep is best-effort, as in the original server: a
        // failure here never undoes a completed delete.
        if let Err(e) = self.remove_from_metadata(repository, path, was_directory) {
            tracing::warn!(
                storage = storage_id,
                repository = repository_id,
                path,
                error = %e,
                "metadata update after delete failed"
            );
        }
        Ok(())
    }

    fn remove_from_metadata(
        &self,
        repository: &Repository,
        path: &str,
        was_directory: bool,
    ) -> Result<(), StorageError> {
        if was_directory {
            // A deleted version directory: drop that version from the index
            // one level up.
            let absolute = repository_path(repository, path)?;
            let (Some(version), Some(parent)) = (
                absolute.file_name().and_then(|n| n.to_str()),
                absolute.parent(),
            ) else {
                return Ok(());
            };
            return self.metadata.remove_version(parent, version);
        }

        let Ok(coordinates) = ArtifactCoordinates::parse(path) else {
            // Sidecars, metadata files, and free-form paths carry no
            // version entry of their own.
            return Ok(());
        };
        let absolute = repository_path(repository, path)?;
        let Some(version_dir) = absolute.parent() else {
            return Ok(());
        };
        if version_directory_is_empty(version_dir)? {
            let Some(artifact_dir) = version_dir.parent() else {
                return Ok(());
            };
            self.metadata
                .remove_version(artifact_dir, &coordinates.version)?;
        }
        Ok(())
    }

    /// Server-side copy: the destination runs the full store chain
    /// (validators, metadata, cache). After the copy, the streamed digests
    /// are checked against the source's sidecars; a disagreement rolls the
    /// destination back and surfaces as a checksum mismatch.
    pub fn copy(
        &self,
        src_storage_id: &str,
        src_repository_id: &str,
        path: &str,
        dst_storage_id: &str,
        dst_repository_id: &str,
    ) -> Result<(), StorageError> {
        // Existence checks in the order the HTTP layer reports them.
        self.registry.storage(src_storage_id)?;
        self.registry.storage(dst_storage_id)?;
        self.registry.repository(src_storage_id, src_repository_id)?;
        self.registry.repository(dst_storage_id, dst_repository_id)?;

        let expected: Vec<(ChecksumAlgorithm, String)> = ALGORITHMS
            .iter()
            .filter_map(|&algorithm| {
                self.read_sidecar(src_storage_id, src_repository_id, path, algorithm)
                    .map(|token| (algorithm, token))
            })
            .collect();

        let mut stream = self.resolve(src_storage_id, src_repository_id, path)?;
        self.store(dst_storage_id, dst_repository_id, path, &mut stream)?;

        let dst_key = Self::cache_key(dst_storage_id, dst_repository_id, path);
        for (algorithm, token) in expected {
            let Some(computed) = self.cache.get(&dst_key, algorithm) else {
                continue;
            };
            if !computed.eq_ignore_ascii_case(&token) {
                let _ = self.delete(dst_storage_id, dst_repository_id, path, true);
                tracing::warn!(
                    path,
                    algorithm = %algorithm,
                    expected = %token,
                    computed = %computed,
                    "checksum mismatch on copy, destination rolled back"
                );
                return Err(StorageError::ChecksumMismatch {
                    path: path.to_string(),
                    expected: token,
                    computed,
                });
            }
        }

        tracing::info!(
            path,
            from = %format!("{src_storage_id}:{src_repository_id}"),
            to = %format!("{dst_storage_id}:{dst_repository_id}"),
            "artifact copied"
        );
        Ok(())
    }

    /// The digest advertised in `Checksum-MD5` / `Checksum-SHA1` response
    /// headers: the cached value when fresh, otherwise the sidecar file.
    /// A missing sidecar is never an error.
    pub fn checksum_header(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Option<String> {
        let key = Self::cache_key(storage_id, repository_id, path);
        if let Some(digest) = self.cache.get(&key, algorithm) {
            return Some(digest);
        }
        match self.read_sidecar(storage_id, repository_id, path, algorithm) {
            Some(token) => {
                if PathClass::of(path) == PathClass::Artifact {
                    self.cache.put(&key, algorithm, token.clone());
                }
                Some(token)
            }
            None => {
                tracing::warn!(
                    storage = storage_id,
                    repository = repository_id,
                    path,
                    algorithm = %algorithm,
                    "no checksum sidecar"
                );
                None
            }
        }
    }

    fn read_sidecar(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Option<String> {
        let sidecar_path = format!("{path}.{algorithm}");
        let stream = self
            .resolve(storage_id, repository_id, &sidecar_path)
            .ok()?;
        let bytes = stream.read_to_vec().ok()?;
        parse_checksum_token(&String::from_utf8_lossy(&bytes))
    }
}

/// Whether a version directory holds no artifact files any more (sidecars,
/// metadata, and temp files do not count).
fn version_directory_is_empty(dir: &Path) -> Result<bool, StorageError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.')
            || coords::is_checksum(&name)
            || coords::is_metadata(&name)
        {
            continue;
        }
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ChecksumCache;
    use crate::repository::Storage;
    use citadel_core::digest::digest_bytes;
    use std::time::Duration;

    const JAR: &str = "org/foo/foo/1.0/foo-1.0.jar";

    fn service(basedir: &Path) -> ArtifactService {
        let storage: Storage = serde_json::from_value(serde_json::json!({
            "id": "storage0",
            "basedir": basedir.to_str().unwrap(),
            "repositories": [
                { "id": "releases", "type": "hosted", "policy": "release",
                  "checksumHeadersEnabled": true },
                { "id": "releases-2", "type": "hosted", "policy": "release",
                  "allowsRedeployment": true },
                { "id": "snapshots", "type": "hosted", "policy": "snapshot" },
                { "id": "public", "type": "group",
                  "groupRepositories": ["releases", "snapshots"] },
                { "id": "offline", "type": "hosted", "inService": false }
            ]
        }))
        .unwrap();
        let registry = Arc::new(StorageRegistry::new(vec![storage]));
        let cache = Arc::new(ChecksumCache::new(
            Duration::from_secs(60),
            Duration::from_secs(3600),
        ));
        ArtifactService::new(registry, cache)
    }

    fn store(service: &ArtifactService, repo: &str, path: &str, bytes: &[u8]) {
        service
            .store("storage0", repo, path, &mut &bytes[..])
            .unwrap();
    }

    #[test]
    fn store_then_resolve_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"artifact body");

        let bytes = service.read("storage0", "releases", JAR).unwrap();
        assert_eq!(bytes, b"artifact body");
    }

    #[test]
    fn store_writes_sidecars_matching_content() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");

        let expected = digest_bytes(b"abc");
        let md5 = service
            .read("storage0", "releases", &format!("{JAR}.md5"))
            .unwrap();
        let sha1 = service
            .read("storage0", "releases", &format!("{JAR}.sha1"))
            .unwrap();
        assert_eq!(String::from_utf8(md5).unwrap(), expected.md5);
        assert_eq!(String::from_utf8(sha1).unwrap(), expected.sha1);
    }

    #[test]
    fn store_updates_directory_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");
        store(&service, "releases", "org/foo/foo/1.1/foo-1.1.jar", b"def");

        let xml = service
            .read("storage0", "releases", "org/foo/foo/maven-metadata.xml")
            .unwrap();
        let parsed = metadata::deserialize(&String::from_utf8(xml).unwrap()).unwrap();
        assert_eq!(parsed.group_id, "org.foo");
        assert_eq!(parsed.artifact_id, "foo");
        assert_eq!(parsed.versions, vec!["1.0", "1.1"]);
        assert_eq!(parsed.latest.as_deref(), Some("1.1"));
        assert_eq!(parsed.release.as_deref(), Some("1.1"));
    }

    #[test]
    fn store_refreshes_checksum_cache() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");

        let key = ArtifactService::cache_key("storage0", "releases", JAR);
        assert_eq!(
            service.cache().get(&key, ChecksumAlgorithm::Sha1).as_deref(),
            Some(digest_bytes(b"abc").sha1.as_str())
        );
    }

    #[test]
    fn snapshot_into_release_repository_rejected_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let path = "org/foo/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.jar";
        let err = service
            .store("storage0", "releases", path, &mut &b"x"[..])
            .unwrap_err();
        assert!(format!("{err}").contains("release policy"));
        assert!(!service.contains("storage0", "releases", path).unwrap());
        assert!(!dir
            .path()
            .join("releases/org/foo/foo/maven-metadata.xml")
            .exists());
    }

    #[test]
    fn release_into_snapshot_repository_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let err = service
            .store("storage0", "snapshots", JAR, &mut &b"x"[..])
            .unwrap_err();
        assert!(format!("{err}").contains("snapshot policy"));
    }

    #[test]
    fn redeployment_rejected_then_allowed_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"first");
        let err = service
            .store("storage0", "releases", JAR, &mut &b"second"[..])
            .unwrap_err();
        assert!(matches!(err, StorageError::RedeploymentForbidden(_)));

        store(&service, "releases-2", JAR, b"first");
        store(&service, "releases-2", JAR, b"second");
        assert_eq!(
            service.read("storage0", "releases-2", JAR).unwrap(),
            b"second"
        );
    }

    #[test]
    fn store_into_group_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let err = service
            .store("storage0", "public", JAR, &mut &b"x"[..])
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteToGroupForbidden(_)));
    }

    #[test]
    fn out_of_service_repository_refuses_reads_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(matches!(
            service.resolve("storage0", "offline", JAR),
            Err(StorageError::RepositoryOutOfService(_))
        ));
        assert!(matches!(
            service.store("storage0", "offline", JAR, &mut &b"x"[..]),
            Err(StorageError::RepositoryOutOfService(_))
        ));
    }

    #[test]
    fn group_resolution_prefers_first_member() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"from releases");
        store(
            &service,
            "snapshots",
            "org/foo/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.jar",
            b"from snapshots",
        );

        let via_group = service.read("storage0", "public", JAR).unwrap();
        assert_eq!(via_group, b"from releases");

        let snapshot_via_group = service
            .read(
                "storage0",
                "public",
                "org/foo/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.jar",
            )
            .unwrap();
        assert_eq!(snapshot_via_group, b"from snapshots");
    }

    #[test]
    fn delete_removes_artifact_sidecars_and_metadata_entry() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");
        store(&service, "releases", "org/foo/foo/1.1/foo-1.1.jar", b"def");

        service.delete("storage0", "releases", JAR, false).unwrap();

        for suffix in ["", ".md5", ".sha1"] {
            assert!(matches!(
                service.resolve("storage0", "releases", &format!("{JAR}{suffix}")),
                Err(StorageError::ArtifactNotFound { .. })
            ));
        }
        let xml = service
            .read("storage0", "releases", "org/foo/foo/maven-metadata.xml")
            .unwrap();
        let parsed = metadata::deserialize(&String::from_utf8(xml).unwrap()).unwrap();
        assert_eq!(parsed.versions, vec!["1.1"]);
    }

    #[test]
    fn delete_keeps_version_while_other_artifacts_remain() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");
        store(&service, "releases", "org/foo/foo/1.0/foo-1.0.pom", b"<project/>");

        service.delete("storage0", "releases", JAR, false).unwrap();

        let xml = service
            .read("storage0", "releases", "org/foo/foo/maven-metadata.xml")
            .unwrap();
        let parsed = metadata::deserialize(&String::from_utf8(xml).unwrap()).unwrap();
        assert_eq!(parsed.versions, vec!["1.0"]);
    }

    #[test]
    fn delete_version_directory_updates_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");
        store(&service, "releases", "org/foo/foo/1.1/foo-1.1.jar", b"def");

        service
            .delete("storage0", "releases", "org/foo/foo/1.0", true)
            .unwrap();

        let xml = service
            .read("storage0", "releases", "org/foo/foo/maven-metadata.xml")
            .unwrap();
        let parsed = metadata::deserialize(&String::from_utf8(xml).unwrap()).unwrap();
        assert_eq!(parsed.versions, vec!["1.1"]);
    }

    #[test]
    fn delete_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");

        let key = ArtifactService::cache_key("storage0", "releases", JAR);
        assert!(service.cache().get(&key, ChecksumAlgorithm::Md5).is_some());
        service.delete("storage0", "releases", JAR, false).unwrap();
        assert!(service.cache().get(&key, ChecksumAlgorithm::Md5).is_none());
    }

    #[test]
    fn copy_applies_destination_chain() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");

        service
            .copy("storage0", "releases", JAR, "storage0", "releases-2")
            .unwrap();

        assert_eq!(service.read("storage0", "releases-2", JAR).unwrap(), b"abc");
        let sha1 = service
            .read("storage0", "releases-2", &format!("{JAR}.sha1"))
            .unwrap();
        assert_eq!(String::from_utf8(sha1).unwrap(), digest_bytes(b"abc").sha1);

        let xml = service
            .read("storage0", "releases-2", "org/foo/foo/maven-metadata.xml")
            .unwrap();
        let parsed = metadata::deserialize(&String::from_utf8(xml).unwrap()).unwrap();
        assert_eq!(parsed.versions, vec!["1.0"]);
    }

    #[test]
    fn copy_missing_source_fails_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(matches!(
            service.copy("storage0", "releases", JAR, "storage0", "releases-2"),
            Err(StorageError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn copy_with_corrupt_source_sidecar_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");
        // Overwrite the source SHA-1 sidecar with a bogus digest.
        service
            .store(
                "storage0",
                "releases",
                &format!("{JAR}.sha1"),
                &mut &b"deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"[..],
            )
            .unwrap();

        let err = service
            .copy("storage0", "releases", JAR, "storage0", "releases-2")
            .unwrap_err();
        assert!(matches!(err, StorageError::ChecksumMismatch { .. }));
        assert!(!service.contains("storage0", "releases-2", JAR).unwrap());
    }

    #[test]
    fn checksum_header_prefers_cache_then_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");
        let expected = digest_bytes(b"abc");

        // Fresh from the store-time cache entry.
        assert_eq!(
            service
                .checksum_header("storage0", "releases", JAR, ChecksumAlgorithm::Md5)
                .as_deref(),
            Some(expected.md5.as_str())
        );

        // After invalidation it falls back to the sidecar file.
        let key = ArtifactService::cache_key("storage0", "releases", JAR);
        service.cache().invalidate(&key);
        assert_eq!(
            service
                .checksum_header("storage0", "releases", JAR, ChecksumAlgorithm::Sha1)
                .as_deref(),
            Some(expected.sha1.as_str())
        );
    }

    #[test]
    fn checksum_header_missing_sidecar_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert_eq!(
            service.checksum_header("storage0", "releases", JAR, ChecksumAlgorithm::Md5),
            None
        );
    }

    #[test]
    fn uploaded_metadata_goes_through_manager() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.foo</groupId>
  <artifactId>foo</artifactId>
  <versioning>
    <versions>
      <version>2.0</version>
    </versions>
    <lastUpdated>20240101000000</lastUpdated>
  </versioning>
</metadata>
"#;
        store(&service, "releases", "org/foo/foo/maven-metadata.xml", xml);

        // Manager-written sidecars exist and match the stored file.
        let stored = service
            .read("storage0", "releases", "org/foo/foo/maven-metadata.xml")
            .unwrap();
        let sha1 = service
            .read("storage0", "releases", "org/foo/foo/maven-metadata.xml.sha1")
            .unwrap();
        assert_eq!(
            String::from_utf8(sha1).unwrap(),
            digest_bytes(&stored).sha1
        );
    }

    #[test]
    fn corrupt_metadata_treated_as_absent_for_reads() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");

        // Corrupt the index on disk behind the manager's back.
        let index = dir.path().join("releases/org/foo/foo/maven-metadata.xml");
        std::fs::write(&index, "<metadata><broken").unwrap();

        assert!(matches!(
            service.read("storage0", "releases", "org/foo/foo/maven-metadata.xml"),
            Err(StorageError::ArtifactNotFound { .. })
        ));
        assert!(matches!(
            service.resolve("storage0", "releases", "org/foo/foo/maven-metadata.xml"),
            Err(StorageError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn corrupt_metadata_still_surfaces_for_writes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        store(&service, "releases", JAR, b"abc");

        let index = dir.path().join("releases/org/foo/foo/maven-metadata.xml");
        std::fs::write(&index, "<metadata><broken").unwrap();

        // The next deployment into the same directory must update the
        // index, and fails loudly rather than silently regenerating it.
        let err = service
            .store(
                "storage0",
                "releases",
                "org/foo/foo/1.1/foo-1.1.jar",
                &mut &b"def"[..],
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::MetadataCorrupt(_)));
    }

    #[test]
    fn uploaded_garbage_metadata_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let err = service
            .store(
                "storage0",
                "releases",
                "org/foo/foo/maven-metadata.xml",
                &mut &b"<broken"[..],
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::MetadataCorrupt(_)));
    }

    #[test]
    fn invalid_coordinates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let err = service
            .store("storage0", "releases", "foo.jar", &mut &b"x"[..])
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidCoordinates(_)));
    }
}
