use std::fmt;
use std::path::{Path, PathBuf};

use super::{CacheKey, Result};

/// Files restored from a cache hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub key: CacheKey,
    /// Extracted files, as absolute paths under the artifact root
    pub paths: Vec<PathBuf>,
}

/// A tier of the artifact cache
///
/// Every operation must be safe to run from independent processes sharing the
/// same backing store. Reads never fail: a missing, corrupt or unreachable
/// artifact is a miss, since recomputing is always correct. Writes surface
/// their errors, since a silently failed write leaves tiers disagreeing.
pub trait ArtifactCache: fmt::Debug + Send + Sync {
    /// Root that cached paths are archived relative to and extracted into
    fn artifact_root(&self) -> &Path;

    fn has(&self, key: &CacheKey) -> bool;

    /// Archive `paths` and store them under `key`, replacing any previous artifact
    fn try_insert(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<()>;

    /// Extract the artifact for `key` into the artifact root
    fn use_cached_files(&self, key: &CacheKey) -> Option<CachedArtifact>;

    fn delete(&self, key: &CacheKey) -> Result<()>;

    /// Remove artifacts older than `max_age_hours`, returning how many went away
    fn prune(&self, max_age_hours: u64) -> Result<usize>;
}
