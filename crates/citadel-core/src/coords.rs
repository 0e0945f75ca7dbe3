//! # Artifact Coordinates & Path Classification
//!
//! Decomposes repository-relative paths of the form
//! `g1/g2/.../artifactId/version/artifactId-version[-classifier].ext`
//! into structured [`ArtifactCoordinates`], and classifies paths as
//! artifacts, checksum sidecars, or directory metadata.
//!
//! ## Snapshot Detection
//!
//! A version is a snapshot when it ends with `-SNAPSHOT` or carries a
//! timestamped snapshot suffix (`yyyyMMdd.HHmmss-buildNumber`, e.g.
//! `1.0-20240131.123456-3`). Both forms deploy into a `-SNAPSHOT`
//! version directory.

use std::str::FromStr;

use crate::digest::ChecksumAlgorithm;
use crate::error::CoreError;

/// Terminal filename of a per-directory version index.
pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// Classification of a repository-relative path, used for `Content-Type`
/// selection and store-time routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// A regular artifact file.
    Artifact,
    /// A checksum sidecar (`.md5` / `.sha1`).
    Checksum(ChecksumAlgorithm),
    /// A `maven-metadata.xml` directory index.
    Metadata,
}

impl PathClass {
    /// Classify a repository-relative path.
    ///
    /// Checksum classification wins over metadata: `maven-metadata.xml.sha1`
    /// is a checksum sidecar, not metadata.
    pub fn of(path: &str) -> PathClass {
        if let Some((_, algorithm)) = checksum_base(path) {
            PathClass::Checksum(algorithm)
        } else if is_metadata(path) {
            PathClass::Metadata
        } else {
            PathClass::Artifact
        }
    }

    /// The `Content-Type` value served for paths of this class.
    pub fn content_type(&self) -> &'static str {
        match self {
            PathClass::Checksum(_) => "text/plain",
            PathClass::Metadata => "application/xml",
            PathClass::Artifact => "application/octet-stream",
        }
    }
}

/// Whether the path names a checksum sidecar (`.md5` or `.sha1`).
pub fn is_checksum(path: &str) -> bool {
    checksum_base(path).is_some()
}

/// Whether the terminal filename is `maven-metadata.xml`.
pub fn is_metadata(path: &str) -> bool {
    file_name(path) == METADATA_FILE_NAME
}

/// Split a checksum sidecar path into the artifact path it covers and the
/// algorithm, e.g. `a/b/c.jar.sha1` → `("a/b/c.jar", Sha1)`.
///
/// Returns `None` when the path is not a sidecar.
pub fn checksum_base(path: &str) -> Option<(&str, ChecksumAlgorithm)> {
    let (base, extension) = path.rsplit_once('.')?;
    let algorithm = ChecksumAlgorithm::from_str(extension).ok()?;
    Some((base, algorithm))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Structured decomposition of a Maven-style artifact path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCoordinates {
    /// Group id with `.` separators (path form uses `/`). May be empty for
    /// the minimal three-segment form.
    pub group_id: String,
    pub artifact_id: String,
    /// The version directory name, e.g. `1.0` or `1.0-SNAPSHOT`.
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl ArtifactCoordinates {
    /// Parse a repository-relative artifact path.
    ///
    /// Fails with [`CoreError::InvalidCoordinates`] when the path has fewer
    /// than three segments, lacks an extension, or the filename does not
    /// start with `artifactId-version`.
    pub fn parse(path: &str) -> Result<ArtifactCoordinates, CoreError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 3 {
            return Err(CoreError::InvalidCoordinates(format!(
                "expected at least artifactId/version/file, got {path:?}"
            )));
        }

        let file = segments[segments.len() - 1];
        let version = segments[segments.len() - 2];
        let artifact_id = segments[segments.len() - 3];
        let group_id = segments[..segments.len() - 3].join(".");

        let after_artifact = file
            .strip_prefix(artifact_id)
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(|| {
                CoreError::InvalidCoordinates(format!(
                    "filename {file:?} does not start with {artifact_id}-"
                ))
            })?;

        // The filename carries the directory version, or its base for
        // timestamped snapshot files (1.0-SNAPSHOT dir, 1.0-20240131.123456-3 file).
        let base = version.strip_suffix("-SNAPSHOT").unwrap_or(version);
        let remainder = after_artifact
            .strip_prefix(version)
            .or_else(|| after_artifact.strip_prefix(base))
            .ok_or_else(|| {
                CoreError::InvalidCoordinates(format!(
                    "filename {file:?} does not carry version {version:?}"
                ))
            })?;

        let (classifier, extension) = split_classifier_and_extension(remainder)
            .ok_or_else(|| {
                CoreError::InvalidCoordinates(format!(
                    "filename {file:?} has no extension after the version"
                ))
            })?;

        Ok(ArtifactCoordinates {
            group_id,
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier: classifier.map(str::to_string),
            extension: extension.to_string(),
        })
    }

    /// Whether these coordinates denote a snapshot version.
    pub fn is_snapshot(&self) -> bool {
        is_snapshot_version(&self.version)
    }
}

impl std::fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", self.extension)
    }
}

/// Interpret the filename remainder after `artifactId-version`:
/// `".ext"` (possibly compound, e.g. `.tar.gz`), or
/// `"-<timestamp>-<build>[-<classifier>].ext"`, or `"-<classifier>.ext"`.
fn split_classifier_and_extension(remainder: &str) -> Option<(Option<&str>, &str)> {
    if let Some(extension) = remainder.strip_prefix('.') {
        if extension.is_empty() {
            return None;
        }
        return Some((None, extension));
    }
    let tail = remainder.strip_prefix('-')?;
    let tail = match timestamp_prefix_len(tail) {
        Some(len) => &tail[len..],
        None => tail,
    };
    if let Some(extension) = tail.strip_prefix('.') {
        // Timestamped file without classifier.
        if extension.is_empty() {
            return None;
        }
        return Some((None, extension));
    }
    let tail = tail.strip_prefix('-').unwrap_or(tail);
    let (classifier, extension) = tail.rsplit_once('.')?;
    if classifier.is_empty() || extension.is_empty() {
        return None;
    }
    Some((Some(classifier), extension))
}

/// Whether a version string denotes a snapshot: `-SNAPSHOT` suffix or a
/// timestamped suffix `yyyyMMdd.HHmmss-buildNumber`.
pub fn is_snapshot_version(version: &str) -> bool {
    if version.ends_with("-SNAPSHOT") {
        return true;
    }
    let bytes = version.as_bytes();
    for start in 0..bytes.len() {
        if !version.is_char_boundary(start) {
            continue;
        }
        if start > 0 && bytes[start - 1] != b'-' {
            continue;
        }
        if let Some(len) = timestamp_prefix_len(&version[start..]) {
            if start + len == version.len() {
                return true;
            }
        }
    }
    false
}

/// Length of a `yyyyMMdd.HHmmss-<build>` prefix of `s`, if present.
fn timestamp_prefix_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() < 17 {
        return None;
    }
    if !bytes[..8].iter().all(u8::is_ascii_digit) || bytes[8] != b'.' {
        return None;
    }
    if !bytes[9..15].iter().all(u8::is_ascii_digit) || bytes[15] != b'-' {
        return None;
    }
    let build_digits = bytes[16..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if build_digits == 0 {
        return None;
    }
    Some(16 + build_digits)
}
