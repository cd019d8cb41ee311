use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ArtifactCache, CacheKey, CachedArtifact, Result};
use crate::config::ConfigError;

/// An ordered chain of tiers sharing one artifact root
///
/// Reads return the first hit and do not copy it into earlier tiers. Writes
/// and deletes reach every tier; the first failure is reported after all
/// tiers have been tried.
#[derive(Debug)]
pub struct CombinedArtifactCache {
    tiers: Vec<Arc<dyn ArtifactCache>>,
}

impl CombinedArtifactCache {
    pub fn new(tiers: Vec<Arc<dyn ArtifactCache>>) -> std::result::Result<Self, ConfigError> {
        let Some(first) = tiers.first() else {
            return Err(ConfigError::NoTiers);
        };
        let expected = first.artifact_root().to_path_buf();
        if let Some(other) = tiers.iter().find(|tier| tier.artifact_root() != expected) {
            return Err(ConfigError::MismatchedRoots {
                expected,
                found: other.artifact_root().to_path_buf(),
            });
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Arc<dyn ArtifactCache>] {
        &self.tiers
    }

    fn for_each_tier(&self, op: impl Fn(&dyn ArtifactCache) -> Result<()>) -> Result<()> {
        let mut first_err = None;
        for tier in &self.tiers {
            if let Err(e) = op(tier.as_ref()) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl ArtifactCache for CombinedArtifactCache {
    fn artifact_root(&self) -> &Path {
        // Non-empty by construction
        self.tiers[0].artifact_root()
    }

    fn has(&self, key: &CacheKey) -> bool {
        self.tiers.iter().any(|tier| tier.has(key))
    }

    fn try_insert(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<()> {
        self.for_each_tier(|tier| tier.try_insert(key, paths))
    }

    fn use_cached_files(&self, key: &CacheKey) -> Option<CachedArtifact> {
        self.tiers.iter().find_map(|tier| tier.use_cached_files(key))
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.for_each_tier(|tier| tier.delete(key))
    }

    fn prune(&self, max_age_hours: u64) -> Result<usize> {
        let mut removed = 0;
        for tier in &self.tiers {
            removed += tier.prune(max_age_hours)?;
        }
        Ok(removed)
    }
}
