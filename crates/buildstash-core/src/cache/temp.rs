use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::staging::{StagedArchive, TarballStore};
use super::{ArtifactCache, CacheError, CacheKey, CachedArtifact, Result, StagingArea};

/// A staging buffer that never keeps anything
///
/// Archives are built and unpacked in a private scratch directory that is
/// removed with the cache. Lookups always miss.
#[derive(Debug)]
pub struct TempArtifactCache {
    store: TarballStore,
    scratch: TempDir,
}

impl TempArtifactCache {
    pub fn new(artifact_root: impl Into<PathBuf>, compression: u32) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("buildstash-staging-")
            .tempdir()
            .map_err(|e| CacheError::io(std::env::temp_dir(), e))?;

        Ok(Self {
            store: TarballStore::new(artifact_root.into(), compression),
            scratch,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

impl ArtifactCache for TempArtifactCache {
    fn artifact_root(&self) -> &Path {
        self.store.artifact_root()
    }

    fn has(&self, _key: &CacheKey) -> bool {
        false
    }

    fn try_insert(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<()> {
        self.stage(key, paths).map(|_| ())
    }

    fn use_cached_files(&self, _key: &CacheKey) -> Option<CachedArtifact> {
        None
    }

    fn delete(&self, _key: &CacheKey) -> Result<()> {
        Ok(())
    }

    fn prune(&self, _max_age_hours: u64) -> Result<usize> {
        Ok(0)
    }
}

impl StagingArea for TempArtifactCache {
    fn compression(&self) -> u32 {
        self.store.compression()
    }

    fn stage(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<StagedArchive> {
        self.store
            .write_tmp(self.scratch.path(), key, paths)
            .map(StagedArchive::Scratch)
    }

    fn store_and_extract(&self, key: &CacheKey, src: &mut dyn Read) -> Result<CachedArtifact> {
        let tmp = self.store.download_tmp(self.scratch.path(), key, src)?;
        self.store.extract(key, tmp.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_reports_hits() {
        let artifacts = TempDir::new().unwrap();
        std::fs::write(artifacts.path().join("out.txt"), "out").unwrap();
        let cache = TempArtifactCache::new(artifacts.path(), 5).unwrap();
        let key = CacheKey::new("foo", "deadbeef");

        cache.try_insert(&key, &[PathBuf::from("out.txt")]).unwrap();

        assert!(!cache.has(&key));
        assert!(cache.use_cached_files(&key).is_none());
        cache.delete(&key).unwrap();
    }

    #[test]
    fn test_staged_archive_lives_until_dropped() {
        let artifacts = TempDir::new().unwrap();
        std::fs::write(artifacts.path().join("out.txt"), "out").unwrap();
        let cache = TempArtifactCache::new(artifacts.path(), 0).unwrap();
        let key = CacheKey::new("foo", "deadbeef");

        let staged = cache.stage(&key, &[PathBuf::from("out.txt")]).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.starts_with(cache.scratch_dir()));
        assert!(path.is_file());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_store_and_extract_from_reader() {
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("out.txt"), "payload").unwrap();
        let producer = TempArtifactCache::new(source.path(), 5).unwrap();
        let key = CacheKey::new("foo", "deadbeef");
        let staged = producer.stage(&key, &[PathBuf::from("out.txt")]).unwrap();
        let bytes = std::fs::read(staged.path()).unwrap();

        let target = TempDir::new().unwrap();
        let consumer = TempArtifactCache::new(target.path(), 5).unwrap();
        let artifact = consumer
            .store_and_extract(&key, &mut bytes.as_slice())
            .unwrap();

        assert_eq!(artifact.paths, vec![target.path().join("out.txt")]);
        assert_eq!(
            std::fs::read_to_string(target.path().join("out.txt")).unwrap(),
            "payload"
        );
    }
}
