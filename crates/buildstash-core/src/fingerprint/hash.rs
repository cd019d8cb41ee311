use std::path::Path;

use super::{FingerprintError, Result};

/// Width of the dependency digest appended to transitive fingerprints.
pub const DEPS_HASH_WIDTH: usize = 12;

/// Compute the Blake3 hex digest of a byte slice
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Compute Blake3 hash of file content
///
/// A missing or unreadable file is an error, never an empty digest: a
/// fingerprint over stale content would address the wrong artifact.
pub fn hash_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|source| FingerprintError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&content))
}

/// Feed a length-prefixed byte string into a running hasher
///
/// Every variable-length input goes through here so that adjacent inputs
/// cannot shift bytes between each other and still hash the same.
pub(crate) fn update_framed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Feed the content of a file, framed, into a running hasher
pub(crate) fn update_with_file(hasher: &mut blake3::Hasher, path: &Path) -> Result<()> {
    let content = std::fs::read(path).map_err(|source| FingerprintError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    update_framed(hasher, &content);
    Ok(())
}

/// Digest a collection of hashes independently of their order
pub fn combine_hashes<I, S>(hashes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<S> = hashes.into_iter().collect();
    sorted.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

    let mut hasher = blake3::Hasher::new();
    for hash in &sorted {
        update_framed(&mut hasher, hash.as_ref().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
