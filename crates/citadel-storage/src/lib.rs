//! # citadel-storage — Artifact Storage Subsystem
//!
//! The storage half of the Citadel artifact repository:
//!
//! - [`repository`] — storages, repositories, and the immutable
//!   [`StorageRegistry`](repository::StorageRegistry) built at startup.
//! - [`config`] — JSON server configuration.
//! - [`cache`] — the TTL-bounded checksum cache with its background
//!   sweeper.
//! - [`metadata`] — the per-directory `maven-metadata.xml` manager.
//! - [`validation`] — the ordered store-time validator chain
//!   (release / snapshot / redeployment rules).
//! - [`resolvers`] — the filesystem and group location resolvers behind a
//!   common contract.
//! - [`service`] — the [`ArtifactService`](service::ArtifactService)
//!   façade orchestrating all of the above for the HTTP layer.
//!
//! ## Consistency Model
//!
//! Artifact writes are temp-file + rename with sidecars renamed before the
//! artifact, so a visible artifact always agrees with its sidecars. Within
//! a single path, completed stores and deletes are linearizable; across
//! paths no ordering is guaranteed. Readers opened before a store or
//! delete keep their already-opened stream.

pub mod cache;
pub mod config;
pub mod error;
pub mod metadata;
pub mod repository;
pub mod resolvers;
pub mod service;
pub mod validation;

pub use cache::ChecksumCache;
pub use config::{CacheConfig, ConfigError, ServerConfig};
pub use error::StorageError;
pub use metadata::{DirectoryMetadata, MetadataLevel, MetadataManager};
pub use repository::{Repository, RepositoryPolicy, RepositoryType, Storage, StorageRegistry};
pub use resolvers::{ArtifactStream, LocationResolver};
pub use service::ArtifactService;
