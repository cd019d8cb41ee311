use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{CacheError, Result};

/// Extension of uncompressed archives
pub const TAR_EXT: &str = "tar";

/// Extension of gzip-compressed archives
pub const TAR_GZ_EXT: &str = "tar.gz";

/// Archive extension for a compression level (0 disables gzip)
pub fn archive_extension(compression: u32) -> &'static str {
    if compression > 0 {
        TAR_GZ_EXT
    } else {
        TAR_EXT
    }
}

/// A tar archive of paths under an artifact root
#[derive(Debug, Clone, Copy)]
pub struct Tarball<'a> {
    path: &'a Path,
    artifact_root: &'a Path,
    compression: u32,
}

impl<'a> Tarball<'a> {
    pub fn new(path: &'a Path, artifact_root: &'a Path, compression: u32) -> Self {
        Self {
            path,
            artifact_root,
            compression,
        }
    }

    /// Write `paths` into `file` (already open at `self.path`)
    ///
    /// Entries are named relative to the artifact root; directories are added
    /// recursively.
    pub fn collect(&self, file: &File, paths: &[PathBuf]) -> Result<()> {
        let writer = BufWriter::new(file);
        if self.compression > 0 {
            let encoder = GzEncoder::new(writer, Compression::new(self.compression.min(9)));
            let encoder = self.append_all(encoder, paths)?;
            let mut writer = encoder.finish().map_err(|e| CacheError::io(self.path, e))?;
            writer.flush().map_err(|e| CacheError::io(self.path, e))?;
        } else {
            let mut writer = self.append_all(writer, paths)?;
            writer.flush().map_err(|e| CacheError::io(self.path, e))?;
        }
        file.sync_all().map_err(|e| CacheError::io(self.path, e))
    }

    /// Unpack into the artifact root, returning the extracted files
    pub fn extract(&self) -> Result<Vec<PathBuf>> {
        let file = File::open(self.path).map_err(|e| CacheError::io(self.path, e))?;
        let reader = BufReader::new(file);
        if self.compression > 0 {
            self.unpack(GzDecoder::new(reader))
        } else {
            self.unpack(reader)
        }
    }

    fn append_all<W: Write>(&self, writer: W, paths: &[PathBuf]) -> Result<W> {
        let mut builder = tar::Builder::new(writer);
        for path in paths {
            let (absolute, relative) = self.relativize(path)?;
            let appended = if absolute.is_dir() {
                builder.append_dir_all(&relative, &absolute)
            } else {
                builder.append_path_with_name(&absolute, &relative)
            };
            appended.map_err(|e| CacheError::io(&absolute, e))?;
        }
        builder.into_inner().map_err(|e| CacheError::io(self.path, e))
    }

    fn unpack<R: Read>(&self, reader: R) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(self.artifact_root)
            .map_err(|e| CacheError::io(self.artifact_root, e))?;

        let mut archive = tar::Archive::new(reader);
        let mut extracted = Vec::new();
        let entries = archive.entries().map_err(|e| CacheError::io(self.path, e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| CacheError::io(self.path, e))?;
            let name = entry
                .path()
                .map_err(|e| CacheError::io(self.path, e))?
                .into_owned();
            let unpacked = entry
                .unpack_in(self.artifact_root)
                .map_err(|e| CacheError::io(self.artifact_root.join(&name), e))?;
            if !unpacked {
                return Err(CacheError::PathOutsideRoot {
                    path: name,
                    root: self.artifact_root.to_path_buf(),
                });
            }
            if entry.header().entry_type().is_file() {
                extracted.push(self.artifact_root.join(normalize(&name)));
            }
        }
        Ok(extracted)
    }

    fn relativize(&self, path: &Path) -> Result<(PathBuf, PathBuf)> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.artifact_root.join(path)
        };
        let relative = absolute
            .strip_prefix(self.artifact_root)
            .map_err(|_| CacheError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: self.artifact_root.to_path_buf(),
            })?;
        let relative = if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative.to_path_buf()
        };
        if relative.components().any(|c| c == Component::ParentDir) {
            return Err(CacheError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: self.artifact_root.to_path_buf(),
            });
        }
        Ok((absolute, relative))
    }
}

fn normalize(name: &Path) -> PathBuf {
    name.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
