use assert_cmd::Command;
use buildstash_test_helpers::fixtures::{read_file, write_file};
use buildstash_test_helpers::FakeRestServer;
use predicates::prelude::*;
use tempfile::TempDir;

fn buildstash_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("buildstash"))
}

/// A command running in `work` with a local cache under `cache`
fn local_cmd(work: &TempDir, cache: &TempDir) -> Command {
    let mut cmd = buildstash_cmd();
    cmd.current_dir(work.path())
        .arg("--artifact-root")
        .arg(work.path())
        .arg("--read-from")
        .arg(cache.path())
        .arg("--write-to")
        .arg(cache.path());
    cmd
}

// ============================================================================
// INIT
// ============================================================================

#[test]
fn test_init_creates_config_file() {
    let work = TempDir::new().unwrap();

    buildstash_cmd()
        .current_dir(work.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("buildstash.yaml"));

    let config = read_file(work.path().join("buildstash.yaml"));
    assert!(config.contains("artifactRoot"));
    assert!(config.contains("compression"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let work = TempDir::new().unwrap();
    write_file(work.path(), "buildstash.yaml", "compression: 1\n");

    buildstash_cmd()
        .current_dir(work.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// FINGERPRINT
// ============================================================================

#[test]
fn test_fingerprint_tracks_file_content() {
    let work = TempDir::new().unwrap();
    write_file(work.path(), "src/Main.java", "class Main {}");

    let run = || {
        let output = buildstash_cmd()
            .current_dir(work.path())
            .args(["fingerprint", "src/Main.java"])
            .output()
            .unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    };

    let first = run();
    assert_eq!(first.len(), 64);
    assert_eq!(first, run());

    write_file(work.path(), "src/Main.java", "class Main { int x; }");
    assert_ne!(first, run());
}

#[test]
fn test_fingerprint_missing_file_fails() {
    let work = TempDir::new().unwrap();

    buildstash_cmd()
        .current_dir(work.path())
        .args(["fingerprint", "missing.java"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.java"));
}

// ============================================================================
// LOCAL CACHE
// ============================================================================

#[test]
fn test_put_has_get_delete_cycle() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_file(work.path(), "out.txt", "built output");

    local_cmd(&work, &cache)
        .args(["has", "foo", "deadbeef"])
        .assert()
        .success()
        .stdout("miss\n");

    local_cmd(&work, &cache)
        .args(["put", "foo", "deadbeef", "out.txt"])
        .assert()
        .success();
    assert!(cache.path().join("foo/deadbeef.tar.gz").is_file());

    local_cmd(&work, &cache)
        .args(["has", "foo", "deadbeef"])
        .assert()
        .success()
        .stdout("hit\n");

    std::fs::remove_file(work.path().join("out.txt")).unwrap();
    local_cmd(&work, &cache)
        .args(["get", "foo", "deadbeef"])
        .assert()
        .success()
        .stdout(predicate::str::contains("out.txt"));
    assert_eq!(read_file(work.path().join("out.txt")), "built output");

    local_cmd(&work, &cache)
        .args(["delete", "foo", "deadbeef"])
        .assert()
        .success();
    local_cmd(&work, &cache)
        .args(["has", "foo", "deadbeef"])
        .assert()
        .success()
        .stdout("miss\n");
}

#[test]
fn test_put_absolute_path_under_default_root() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let output = write_file(work.path(), "out.txt", "built output")
        .canonicalize()
        .unwrap();

    buildstash_cmd()
        .current_dir(work.path())
        .arg("--write-to")
        .arg(cache.path())
        .args(["put", "foo", "deadbeef"])
        .arg(&output)
        .assert()
        .success();

    std::fs::remove_file(&output).unwrap();
    buildstash_cmd()
        .current_dir(work.path())
        .arg("--read-from")
        .arg(cache.path())
        .args(["get", "foo", "deadbeef"])
        .assert()
        .success();
    assert_eq!(read_file(&output), "built output");
}

#[test]
fn test_get_miss_fails() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    local_cmd(&work, &cache)
        .args(["get", "foo", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No cached artifact"));
}

#[test]
fn test_uncompressed_from_config_file() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_file(work.path(), "out.txt", "x");
    write_file(
        work.path(),
        "buildstash.yaml",
        format!(
            "artifactRoot: {root}\nwriteTo: {cache}\ncompression: 0\ntaskName: compile\n",
            root = work.path().display(),
            cache = cache.path().display(),
        ),
    );

    buildstash_cmd()
        .current_dir(work.path())
        .args(["put", "foo", "deadbeef", "out.txt"])
        .assert()
        .success();

    assert!(cache.path().join("compile/foo/deadbeef.tar").is_file());
}

#[test]
fn test_prune_reports_count() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_file(work.path(), "out.txt", "x");
    local_cmd(&work, &cache)
        .args(["put", "foo", "deadbeef", "out.txt"])
        .assert()
        .success();

    local_cmd(&work, &cache)
        .args(["prune", "--max-age-hours", "24"])
        .assert()
        .success()
        .stdout("Pruned 0 artifact(s)\n");
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

#[test]
fn test_missing_cache_setting_fails() {
    let work = TempDir::new().unwrap();

    buildstash_cmd()
        .current_dir(work.path())
        .args(["has", "foo", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("readFrom"));
}

#[test]
fn test_invalid_spec_fails_fast() {
    let work = TempDir::new().unwrap();

    buildstash_cmd()
        .current_dir(work.path())
        .args(["--write-to", "relative/dir", "put", "foo", "deadbeef", "out.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid artifact cache spec"));
}

// ============================================================================
// REMOTE CACHE
// ============================================================================

#[test]
fn test_put_to_remote_then_get_elsewhere() {
    let server = FakeRestServer::start();
    let producer = TempDir::new().unwrap();
    write_file(producer.path(), "out.txt", "shared");

    buildstash_cmd()
        .current_dir(producer.path())
        .arg("--artifact-root")
        .arg(producer.path())
        .args(["--write-to", server.url(), "put", "foo", "deadbeef", "out.txt"])
        .assert()
        .success();
    assert!(server.contains("/foo/deadbeef.tar.gz"));

    let consumer = TempDir::new().unwrap();
    buildstash_cmd()
        .current_dir(consumer.path())
        .arg("--artifact-root")
        .arg(consumer.path())
        .args(["--read-from", server.url(), "get", "foo", "deadbeef"])
        .assert()
        .success();
    assert_eq!(read_file(consumer.path().join("out.txt")), "shared");
}
