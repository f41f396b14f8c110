//! Filesystem helpers against a scratch directory.

use std::io::Write;

use graceful_util::fs;

#[test]
fn existence_and_kind() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("state.json");
    std::fs::write(&file, b"{}").unwrap();

    assert!(fs::exists(&file));
    assert!(fs::symlink_exists(&file));
    assert!(!fs::is_dir(&file));
    assert!(fs::is_dir(dir.path()));
    assert!(!fs::exists(dir.path().join("missing")));
}

#[cfg(unix)]
#[test]
fn dangling_symlink_only_visible_to_lstat() {
    let dir = tempfile::tempdir().unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();

    assert!(fs::symlink_exists(&link));
    assert!(!fs::exists(&link));
}

#[test]
fn empty_dir_detection() {
    let dir = tempfile::tempdir().unwrap();
    assert!(fs::is_empty_dir(dir.path()).unwrap());

    std::fs::write(dir.path().join("x"), b"x").unwrap();
    assert!(!fs::is_empty_dir(dir.path()).unwrap());

    assert!(fs::is_empty_dir(dir.path().join("missing")).is_err());
}

#[cfg(unix)]
#[test]
fn exec_binary_requires_all_exec_bits() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("tool");
    std::fs::write(&bin, b"#!/bin/sh\n").unwrap();

    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o644)).unwrap();
    assert!(!fs::is_exec_binary(&bin));
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o744)).unwrap();
    assert!(!fs::is_exec_binary(&bin));
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    assert!(fs::is_exec_binary(&bin));

    assert!(!fs::is_exec_binary(dir.path()));
}

#[test]
fn mkdir_all_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a/b/c");

    fs::mkdir_all(&nested).unwrap();
    assert!(fs::is_dir(&nested));
    fs::mkdir_all(&nested).unwrap();
}

#[test]
fn file_digest_tracks_content() {
    let mut a = tempfile::NamedTempFile::new().unwrap();
    let mut b = tempfile::NamedTempFile::new().unwrap();
    a.write_all(b"flush me").unwrap();
    b.write_all(b"flush me").unwrap();

    let digest = fs::file_digest(a.path()).unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(digest, fs::file_digest(b.path()).unwrap());
    assert_eq!(digest, blake3_hex(b"flush me"));

    b.write_all(b"!").unwrap();
    assert_ne!(digest, fs::file_digest(b.path()).unwrap());
}

fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
