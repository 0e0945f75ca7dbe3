//! # Version Validation Pipeline
//!
//! An ordered chain of validators applied before a deployment is admitted.
//! Validators are independent; the pipeline runs them in insertion order
//! and the first failure short-circuits with its specific error.

use citadel_core::ArtifactCoordinates;

use crate::error::StorageError;
use crate::repository::{Repository, RepositoryPolicy};

/// Everything a validator may inspect about a pending deployment.
pub struct ValidationContext<'a> {
    pub repository: &'a Repository,
    pub coordinates: &'a ArtifactCoordinates,
    /// Whether the target path already exists in the repository.
    pub path_exists: bool,
}

/// A single store-time rule.
pub trait VersionValidator: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<(), StorageError>;
}

/// Rejects snapshot versions in release-policy repositories.
pub struct ReleaseVersionValidator;

impl VersionValidator for ReleaseVersionValidator {
    fn name(&self) -> &'static str {
        "release-version"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<(), StorageError> {
        if ctx.repository.policy == RepositoryPolicy::Release && ctx.coordinates.is_snapshot() {
            return Err(StorageError::VersionPolicyViolation(format!(
                "release policy rejects snapshot artifact {}",
                ctx.coordinates
            )));
        }
        Ok(())
    }
}

/// Rejects release versions in snapshot-policy repositories.
pub struct SnapshotVersionValidator;

impl VersionValidator for SnapshotVersionValidator {
    fn name(&self) -> &'static str {
        "snapshot-version"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<(), StorageError> {
        if ctx.repository.policy == RepositoryPolicy::Snapshot && !ctx.coordinates.is_snapshot() {
            return Err(StorageError::VersionPolicyViolation(format!(
                "snapshot policy rejects release artifact {}",
                ctx.coordinates
            )));
        }
        Ok(())
    }
}

/// Rejects overwrites of already-deployed release artifacts when the
/// repository forbids redeployment. Snapshots are exempt: redeploying a
/// snapshot is always allowed.
pub struct RedeploymentValidator;

impl VersionValidator for RedeploymentValidator {
    fn name(&self) -> &'static str {
        "redeployment"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<(), StorageError> {
        if !ctx.repository.allows_redeployment
            && ctx.path_exists
            && !ctx.coordinates.is_snapshot()
        {
            return Err(StorageError::RedeploymentForbidden(
                ctx.coordinates.to_string(),
            ));
        }
        Ok(())
    }
}

/// The ordered validator chain.
pub struct ValidationPipeline {
    validators: Vec<Box<dyn VersionValidator>>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// The standard chain: release policy, snapshot policy, redeployment.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.push(Box::new(ReleaseVersionValidator));
        pipeline.push(Box::new(SnapshotVersionValidator));
        pipeline.push(Box::new(RedeploymentValidator));
        pipeline
    }

    pub fn push(&mut self, validator: Box<dyn VersionValidator>) {
        self.validators.push(validator);
    }

    /// Run all validators in order; the first failure wins.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> Result<(), StorageError> {
        for validator in &self.validators {
            validator.validate(ctx).map_err(|e| {
                tracing::debug!(validator = validator.name(), error = %e, "deployment rejected");
                e
            })?;
        }
        Ok(())
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::standard()
    }
}
