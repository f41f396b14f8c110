//! Filesystem queries.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// True when `path` exists, following symlinks.
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// True when `path` itself exists, even as a dangling symlink.
pub fn symlink_exists(path: impl AsRef<Path>) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

pub fn is_dir(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

pub fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    Ok(std::fs::read_dir(path)?.next().is_none())
}

/// A regular file with every execute bit set.
#[cfg(unix)]
pub fn is_exec_binary(path: impl AsRef<Path>) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| !m.is_dir() && m.permissions().mode() & 0o111 == 0o111)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_exec_binary(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Create `path` and its parents unless it already exists.
pub fn mkdir_all(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
}

/// Hex-encoded BLAKE3 digest of the file contents.
pub fn file_digest(path: impl AsRef<Path>) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
