use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::staging::{StagedArchive, TarballStore, TMP_PREFIX};
use super::{ArtifactCache, CacheError, CacheKey, CachedArtifact, Result, StagingArea};

/// Durable artifact store on the local filesystem
///
/// Layout: `{cache_root}/{id}/{hash}.tar.gz` (or `.tar` when uncompressed).
/// Writes go to a temp file inside the cache root and are then renamed over
/// the destination, so readers only ever see complete archives. Concurrent
/// writers of the same key each rename atomically; the last one wins.
#[derive(Debug)]
pub struct LocalArtifactCache {
    store: TarballStore,
    cache_root: PathBuf,
}

impl LocalArtifactCache {
    /// Open (creating if needed) a cache rooted at `cache_root`
    ///
    /// A leading `~` in `cache_root` expands to the home directory.
    pub fn new(
        artifact_root: impl Into<PathBuf>,
        cache_root: impl AsRef<Path>,
        compression: u32,
    ) -> Result<Self> {
        let cache_root = expand_user(cache_root.as_ref());
        std::fs::create_dir_all(&cache_root).map_err(|e| CacheError::io(&cache_root, e))?;

        Ok(Self {
            store: TarballStore::new(artifact_root.into(), compression),
            cache_root,
        })
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Where the artifact for `key` lives, whether or not it exists
    pub fn cache_file_for_key(&self, key: &CacheKey) -> PathBuf {
        self.cache_root
            .join(&key.id)
            .join(format!("{}.{}", key.hash, self.store.extension()))
    }

    fn commit(&self, key: &CacheKey, tmp: tempfile::NamedTempFile) -> Result<PathBuf> {
        let dest = self.cache_file_for_key(key);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        tmp.persist(&dest)
            .map_err(|e| CacheError::io(&dest, e.error))?;
        debug!("Stored artifact {} at {}", key, dest.display());
        Ok(dest)
    }

    fn is_archive(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&format!(".{}", self.store.extension())))
    }
}

impl ArtifactCache for LocalArtifactCache {
    fn artifact_root(&self) -> &Path {
        self.store.artifact_root()
    }

    fn has(&self, key: &CacheKey) -> bool {
        self.cache_file_for_key(key).is_file()
    }

    fn try_insert(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<()> {
        self.stage(key, paths).map(|_| ())
    }

    fn use_cached_files(&self, key: &CacheKey) -> Option<CachedArtifact> {
        let tarfile = self.cache_file_for_key(key);
        if !tarfile.exists() {
            return None;
        }
        match self.store.extract(key, &tarfile) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Error while reading from local artifact cache: {}", e);
                None
            }
        }
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        let path = self.cache_file_for_key(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Removes stored archives and orphaned temp files older than the cutoff
    fn prune(&self, max_age_hours: u64) -> Result<usize> {
        let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut candidates = Vec::new();
        let entries =
            std::fs::read_dir(&self.cache_root).map_err(|e| CacheError::io(&self.cache_root, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let Ok(children) = std::fs::read_dir(&path) else {
                    continue;
                };
                candidates.extend(
                    children
                        .flatten()
                        .map(|child| child.path())
                        .filter(|child| self.is_archive(child) || is_orphan(child)),
                );
            } else if is_orphan(&path) {
                candidates.push(path);
            }
        }

        let mut removed = 0;
        for path in candidates {
            let modified = std::fs::metadata(&path).and_then(|meta| meta.modified());
            if matches!(modified, Ok(modified) if modified <= cutoff) {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(CacheError::io(path, e)),
                }
            }
        }
        debug!(
            "Pruned {} artifacts older than {}h from {}",
            removed,
            max_age_hours,
            self.cache_root.display()
        );
        Ok(removed)
    }
}

impl StagingArea for LocalArtifactCache {
    fn compression(&self) -> u32 {
        self.store.compression()
    }

    fn stage(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<StagedArchive> {
        let tmp = self.store.write_tmp(&self.cache_root, key, paths)?;
        self.commit(key, tmp).map(StagedArchive::Stored)
    }

    /// Extracts before committing, so a corrupt download is never stored
    fn store_and_extract(&self, key: &CacheKey, src: &mut dyn Read) -> Result<CachedArtifact> {
        let tmp = self.store.download_tmp(&self.cache_root, key, src)?;
        let artifact = self.store.extract(key, tmp.path())?;
        self.commit(key, tmp)?;
        Ok(artifact)
    }
}

fn is_orphan(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TMP_PREFIX))
}

pub(crate) fn expand_user(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
