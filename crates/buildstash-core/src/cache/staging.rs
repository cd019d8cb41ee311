use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::tarball::{archive_extension, Tarball};
use super::{ArtifactCache, CacheError, CacheKey, CachedArtifact, Result};

/// Chunk size for streaming archive bytes to disk
pub const READ_SIZE_BYTES: usize = 4 * 1024 * 1024;

/// Prefix of in-flight temp files; never matched by a cache lookup
pub(crate) const TMP_PREFIX: &str = ".tmp-";

/// A local tier that can build and unpack archives for a remote tier
///
/// Lets a remote cache materialize archives before upload and extract
/// downloads without ever owning durable storage itself.
pub trait StagingArea: ArtifactCache {
    /// gzip level, 0 for plain tar
    fn compression(&self) -> u32;

    /// Build the archive for `paths` and hand it over for upload
    fn stage(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<StagedArchive>;

    /// Stream an archive from `src` to disk and extract it
    fn store_and_extract(&self, key: &CacheKey, src: &mut dyn Read) -> Result<CachedArtifact>;
}

/// An archive produced by [`StagingArea::stage`]
#[derive(Debug)]
pub enum StagedArchive {
    /// Committed to durable storage
    Stored(PathBuf),
    /// Scratch copy, removed on drop
    Scratch(NamedTempFile),
}

impl StagedArchive {
    pub fn path(&self) -> &Path {
        match self {
            StagedArchive::Stored(path) => path,
            StagedArchive::Scratch(file) => file.path(),
        }
    }
}

/// Archive building and extraction shared by the local tiers
#[derive(Debug, Clone)]
pub(crate) struct TarballStore {
    artifact_root: PathBuf,
    compression: u32,
}

impl TarballStore {
    pub(crate) fn new(artifact_root: PathBuf, compression: u32) -> Self {
        Self {
            artifact_root,
            compression,
        }
    }

    pub(crate) fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    pub(crate) fn compression(&self) -> u32 {
        self.compression
    }

    pub(crate) fn extension(&self) -> &'static str {
        archive_extension(self.compression)
    }

    /// A uniquely named temp file inside `dir`
    ///
    /// Created next to its final destination so the later rename stays on one
    /// filesystem and is atomic.
    pub(crate) fn tmp_in(&self, dir: &Path, key: &CacheKey, role: &str) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .suffix(&format!("-{}.{}", key.id, role))
            .tempfile_in(dir)
            .map_err(|e| CacheError::io(dir, e))
    }

    /// Archive `paths` into a fresh temp file in `dir`
    pub(crate) fn write_tmp(
        &self,
        dir: &Path,
        key: &CacheKey,
        paths: &[PathBuf],
    ) -> Result<NamedTempFile> {
        let tmp = self.tmp_in(dir, key, "write")?;
        self.tarball(tmp.path()).collect(tmp.as_file(), paths)?;
        Ok(tmp)
    }

    /// Copy `src` into a fresh temp file in `dir`, chunk by chunk
    pub(crate) fn download_tmp(
        &self,
        dir: &Path,
        key: &CacheKey,
        src: &mut dyn Read,
    ) -> Result<NamedTempFile> {
        let mut tmp = self.tmp_in(dir, key, "read")?;
        let mut buffer = vec![0u8; READ_SIZE_BYTES];
        loop {
            let read = match src.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CacheError::io(tmp.path(), e)),
            };
            tmp.write_all(&buffer[..read])
                .map_err(|e| CacheError::io(tmp.path(), e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        Ok(tmp)
    }

    pub(crate) fn extract(&self, key: &CacheKey, tarfile: &Path) -> Result<CachedArtifact> {
        let paths = self.tarball(tarfile).extract()?;
        Ok(CachedArtifact {
            key: key.clone(),
            paths,
        })
    }

    fn tarball<'a>(&'a self, path: &'a Path) -> Tarball<'a> {
        Tarball::new(path, &self.artifact_root, self.compression)
    }
}
