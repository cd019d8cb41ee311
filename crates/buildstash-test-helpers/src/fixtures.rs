//! Filesystem and network fixtures

use std::net::TcpListener;
use std::path::{Path, PathBuf};

/// Write `contents` to `root/rel`, creating parent directories
pub fn write_file(root: &Path, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn read_file(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// A URL on a local port that nothing listens on
///
/// Connections are refused immediately, so pings fail fast.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
