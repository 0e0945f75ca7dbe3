//! # Metadata Manager
//!
//! Loads and persists the per-directory `maven-metadata.xml` version index.
//! Writes are atomic: the XML and both checksum sidecars land under temp
//! names first and are renamed sidecars-first, XML last, so a visible
//! metadata file always agrees with its sidecars byte-for-byte.
//!
//! A per-directory mutex serializes read-modify-write sequences; metadata
//! updates in unrelated directories proceed in parallel.
//!
//! The XML is written UTF-8 with a fixed child order (`groupId`,
//! `artifactId`, `versioning { latest, release, versions, lastUpdated }`)
//! so that identical logical content always produces identical bytes and
//! therefore identical checksums.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use citadel_core::coords::METADATA_FILE_NAME;
use citadel_core::digest::digest_bytes;
use dashmap::DashMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use uuid::Uuid;

use crate::error::StorageError;

/// Which index file a metadata store targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLevel {
    /// `<artifact dir>/maven-metadata.xml` — the versions index.
    ArtifactRootLevel,
    /// `<artifact dir>/<version>/maven-metadata.xml` — snapshot builds.
    VersionLevel,
    /// Plugin-group index; written at the directory root like
    /// [`ArtifactRootLevel`](MetadataLevel::ArtifactRootLevel).
    PluginGroupLevel,
}

/// The version index of one `(groupId, artifactId)` directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryMetadata {
    pub group_id: String,
    pub artifact_id: String,
    pub latest: Option<String>,
    pub release: Option<String>,
    /// Unique, in deployment order.
    pub versions: Vec<String>,
    /// UTC `yyyyMMddHHmmss`; monotonically non-decreasing per file.
    pub last_updated: String,
}

/// Serializes read-modify-write cycles per metadata directory.
#[derive(Default)]
pub struct MetadataManager {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl MetadataManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Read the metadata file of `dir`. Absent file ⇒ `Ok(None)`; a file
    /// that exists but does not parse ⇒ [`StorageError::MetadataCorrupt`].
    pub fn read(&self, dir: &Path) -> Result<Option<DirectoryMetadata>, StorageError> {
        let lock = self.lock_for(dir);
        let _guard = lock.lock().expect("metadata lock poisoned");
        read_file(dir)
    }

    /// Write `metadata` (and regenerated sidecars) for `dir` at the given
    /// level. `version` is required for
    /// [`MetadataLevel::VersionLevel`] and ignored otherwise.
    pub fn store(
        &self,
        dir: &Path,
        version: Option<&str>,
        metadata: &DirectoryMetadata,
        level: MetadataLevel,
    ) -> Result<(), StorageError> {
        let target_dir = match level {
            MetadataLevel::VersionLevel => {
                let version = version.ok_or_else(|| {
                    StorageError::InvalidPath(
                        "version-level metadata store requires a version".to_string(),
                    )
                })?;
                dir.join(version)
            }
            MetadataLevel::ArtifactRootLevel | MetadataLevel::PluginGroupLevel => {
                dir.to_path_buf()
            }
        };
        let lock = self.lock_for(&target_dir);
        let _guard = lock.lock().expect("metadata lock poisoned");
        write_file(&target_dir, metadata)
    }

    /// Add a freshly deployed version to the index of `dir`, creating the
    /// index when absent. Updates the `latest` marker, and the `release`
    /// marker for non-snapshot versions.
    pub fn add_version(
        &self,
        dir: &Path,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        snapshot: bool,
    ) -> Result<(), StorageError> {
        let lock = self.lock_for(dir);
        let _guard = lock.lock().expect("metadata lock poisoned");

        let mut metadata = read_file(dir)?.unwrap_or_else(|| DirectoryMetadata {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            ..DirectoryMetadata::default()
        });
        if !metadata.versions.iter().any(|v| v == version) {
            metadata.versions.push(version.to_string());
        }
        metadata.latest = Some(version.to_string());
        if !snapshot {
            metadata.release = Some(version.to_string());
        }
        write_file(dir, &metadata)
    }

    /// Remove a version from the index of `dir` and rewrite it at artifact
    /// root level. A missing index or missing version is a no-op.
    pub fn remove_version(&self, dir: &Path, version: &str) -> Result<(), StorageError> {
        let lock = self.lock_for(dir);
        let _guard = lock.lock().expect("metadata lock poisoned");

        let Some(mut metadata) = read_file(dir)? else {
            return Ok(());
        };
        let before = metadata.versions.len();
        metadata.versions.retain(|v| v != version);
        if metadata.versions.len() == before {
            return Ok(());
        }
        if metadata.latest.as_deref() == Some(version) {
            metadata.latest = metadata.versions.last().cloned();
        }
        if metadata.release.as_deref() == Some(version) {
            metadata.release = metadata
                .versions
                .iter()
                .rev()
                .find(|v| !citadel_core::coords::is_snapshot_version(v))
                .cloned();
        }
        write_file(dir, &metadata)
    }
}

fn read_file(dir: &Path) -> Result<Option<DirectoryMetadata>, StorageError> {
    let path = dir.join(METADATA_FILE_NAME);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    deserialize(&contents)
        .map(Some)
        .map_err(|reason| StorageError::MetadataCorrupt(format!("{}: {reason}", path.display())))
}

fn write_file(dir: &Path, metadata: &DirectoryMetadata) -> Result<(), StorageError> {
    std::fs::create_dir_all(dir)?;

    // lastUpdated never decreases, even against a clock that stepped back.
    let mut stamped = metadata.clone();
    dedup_versions(&mut stamped.versions);
    let now = Utc::now().format("%Y%m%d%H%M%S").to_string();
    stamped.last_updated = match read_file(dir) {
        Ok(Some(existing)) if existing.last_updated > now => existing.last_updated,
        _ => now,
    };

    let xml = serialize(&stamped)?;
    let digests = digest_bytes(&xml);

    let token = Uuid::new_v4();
    let xml_path = dir.join(METADATA_FILE_NAME);
    let xml_temp = dir.join(format!(".{METADATA_FILE_NAME}.{token}.tmp"));
    let result = (|| -> Result<(), StorageError> {
        std::fs::write(&xml_temp, &xml)?;
        for (extension, digest) in [("md5", &digests.md5), ("sha1", &digests.sha1)] {
            let sidecar = dir.join(format!("{METADATA_FILE_NAME}.{extension}"));
            let temp = dir.join(format!(".{METADATA_FILE_NAME}.{extension}.{token}.tmp"));
            std::fs::write(&temp, digest)?;
            std::fs::rename(&temp, &sidecar)?;
        }
        // The XML lands last: whatever is visible matches its sidecars.
        std::fs::rename(&xml_temp, &xml_path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&xml_temp);
    }
    result
}

fn dedup_versions(versions: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    versions.retain(|v| seen.insert(v.clone()));
}

fn io_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StorageError {
    StorageError::Io(std::io::Error::other(e))
}

pub(crate) fn serialize(metadata: &DirectoryMetadata) -> Result<Vec<u8>, StorageError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;

    let text_element = |writer: &mut Writer<Vec<u8>>,
                        name: &str,
                        value: &str|
     -> Result<(), StorageError> {
        writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(io_err)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(io_err)?;
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(io_err)?;
        Ok(())
    };

    writer
        .write_event(Event::Start(BytesStart::new("metadata")))
        .map_err(io_err)?;
    text_element(&mut writer, "groupId", &metadata.group_id)?;
    text_element(&mut writer, "artifactId", &metadata.artifact_id)?;
    writer
        .write_event(Event::Start(BytesStart::new("versioning")))
        .map_err(io_err)?;
    if let Some(latest) = &metadata.latest {
        text_element(&mut writer, "latest", latest)?;
    }
    if let Some(release) = &metadata.release {
        text_element(&mut writer, "release", release)?;
    }
    writer
        .write_event(Event::Start(BytesStart::new("versions")))
        .map_err(io_err)?;
    for version in &metadata.versions {
        text_element(&mut writer, "version", version)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("versions")))
        .map_err(io_err)?;
    text_element(&mut writer, "lastUpdated", &metadata.last_updated)?;
    writer
        .write_event(Event::End(BytesEnd::new("versioning")))
        .map_err(io_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("metadata")))
        .map_err(io_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

pub(crate) fn deserialize(contents: &str) -> Result<DirectoryMetadata, String> {
    let mut reader = Reader::from_str(contents);
    let mut metadata = DirectoryMetadata::default();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if stack.is_empty() {
                    if name != "metadata" {
                        return Err(format!("unexpected root element <{name}>"));
                    }
                    saw_root = true;
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match stack.last().map(String::as_str) {
                    Some("groupId") => metadata.group_id = text.to_string(),
                    Some("artifactId") => metadata.artifact_id = text.to_string(),
                    Some("latest") => metadata.latest = Some(text.to_string()),
                    Some("release") => metadata.release = Some(text.to_string()),
                    Some("version") => metadata.versions.push(text.to_string()),
                    Some("lastUpdated") => metadata.last_updated = text.to_string(),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
    if !saw_root {
        return Err("no <metadata> root element".to_string());
    }
    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack.join("><")));
    }
    dedup_versions(&mut metadata.versions);
    Ok(metadata)
}
