//! Local artifact cache behavior across processes and crashes

use buildstash_core::cache::{ArtifactCache, CacheKey, LocalArtifactCache, StagingArea};
use buildstash_test_helpers::fixtures::{read_file, write_file};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_insert_then_read_back() {
    let artifacts = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("c");
    let cache = LocalArtifactCache::new(artifacts.path(), &cache_root, 5).unwrap();
    let key = CacheKey::new("foo", "deadbeef");
    write_file(artifacts.path(), "out.txt", "hello artifact");

    cache.try_insert(&key, &[PathBuf::from("out.txt")]).unwrap();

    assert!(cache_root.join("foo").join("deadbeef.tar.gz").is_file());
    assert!(cache.has(&key));

    std::fs::remove_file(artifacts.path().join("out.txt")).unwrap();
    let artifact = cache.use_cached_files(&key).unwrap();
    assert_eq!(artifact.key, key);
    assert_eq!(artifact.paths, vec![artifacts.path().join("out.txt")]);
    assert_eq!(read_file(artifacts.path().join("out.txt")), "hello artifact");
}

#[test]
fn test_directories_are_archived_recursively() {
    let artifacts = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = LocalArtifactCache::new(artifacts.path(), cache_dir.path(), 0).unwrap();
    let key = CacheKey::new("classes", "cafebabe");
    write_file(artifacts.path(), "out/classes/A.class", "A");
    write_file(artifacts.path(), "out/classes/pkg/B.class", "B");

    cache
        .try_insert(&key, &[artifacts.path().join("out/classes")])
        .unwrap();
    assert!(cache_dir.path().join("classes").join("cafebabe.tar").is_file());

    std::fs::remove_dir_all(artifacts.path().join("out")).unwrap();
    let mut paths = cache.use_cached_files(&key).unwrap().paths;
    paths.sort();
    assert_eq!(
        paths,
        vec![
            artifacts.path().join("out/classes/A.class"),
            artifacts.path().join("out/classes/pkg/B.class"),
        ]
    );
    assert_eq!(read_file(artifacts.path().join("out/classes/pkg/B.class")), "B");
}

#[test]
fn test_reinsert_replaces_wholesale() {
    let artifacts = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = LocalArtifactCache::new(artifacts.path(), cache_dir.path(), 5).unwrap();
    let key = CacheKey::new("foo", "deadbeef");
    write_file(artifacts.path(), "a.txt", "a");
    write_file(artifacts.path(), "b.txt", "b");

    cache
        .try_insert(&key, &[PathBuf::from("a.txt"), PathBuf::from("b.txt")])
        .unwrap();
    cache.try_insert(&key, &[PathBuf::from("b.txt")]).unwrap();

    let artifact = cache.use_cached_files(&key).unwrap();
    assert_eq!(artifact.paths, vec![artifacts.path().join("b.txt")]);
}

#[test]
fn test_crash_before_rename_leaves_no_entry() {
    let artifacts = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = LocalArtifactCache::new(artifacts.path(), cache_dir.path(), 5).unwrap();
    let key = CacheKey::new("foo", "deadbeef");

    // What a writer killed mid-archive leaves behind
    write_file(cache_dir.path(), ".tmp-abc123-foo.write", b"\x1f\x8b partial");
    write_file(cache_dir.path(), "foo/.tmp-def456-foo.read", b"\x1f\x8b partial");

    assert!(!cache.has(&key));
    assert!(cache.use_cached_files(&key).is_none());

    assert_eq!(cache.prune(0).unwrap(), 2);
    assert!(!cache_dir.path().join(".tmp-abc123-foo.write").exists());
}

#[test]
fn test_corrupt_archive_is_a_miss() {
    let artifacts = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = LocalArtifactCache::new(artifacts.path(), cache_dir.path(), 5).unwrap();
    let key = CacheKey::new("foo", "deadbeef");
    write_file(cache_dir.path(), "foo/deadbeef.tar.gz", "definitely not gzip");

    assert!(cache.has(&key));
    assert!(cache.use_cached_files(&key).is_none());
}

#[test]
fn test_corrupt_download_is_not_stored() {
    let artifacts = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = LocalArtifactCache::new(artifacts.path(), cache_dir.path(), 5).unwrap();
    let key = CacheKey::new("foo", "deadbeef");

    let result = cache.store_and_extract(&key, &mut &b"garbage bytes"[..]);

    assert!(result.is_err());
    assert!(!cache.has(&key));
}

#[test]
fn test_racing_writers_leave_one_complete_archive() {
    let cache_dir = TempDir::new().unwrap();
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();
    write_file(root_a.path(), "out.txt", "from writer a");
    write_file(root_b.path(), "out.txt", "from writer b");
    let key = CacheKey::new("foo", "deadbeef");

    let writers: Vec<_> = [root_a.path(), root_b.path()]
        .into_iter()
        .map(|root| Arc::new(LocalArtifactCache::new(root, cache_dir.path(), 5).unwrap()))
        .collect();
    let handles: Vec<_> = writers
        .iter()
        .map(|cache| {
            let cache = Arc::clone(cache);
            let key = key.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    cache.try_insert(&key, &[PathBuf::from("out.txt")]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reader_root = TempDir::new().unwrap();
    let reader = LocalArtifactCache::new(reader_root.path(), cache_dir.path(), 5).unwrap();
    reader.use_cached_files(&key).unwrap();
    let content = read_file(reader_root.path().join("out.txt"));
    assert!(content == "from writer a" || content == "from writer b");
}

#[test]
fn test_path_outside_artifact_root_is_rejected() {
    let artifacts = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = LocalArtifactCache::new(artifacts.path(), cache_dir.path(), 5).unwrap();
    let outside = write_file(elsewhere.path(), "out.txt", "x");

    let result = cache.try_insert(&CacheKey::new("foo", "deadbeef"), &[outside]);

    assert!(result.is_err());
    assert!(!cache.has(&CacheKey::new("foo", "deadbeef")));
}
