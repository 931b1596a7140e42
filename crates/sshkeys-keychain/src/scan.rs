use crate::classify::classify;
use crate::error::KeychainError;
use crate::key::Key;
use ssh_key::PublicKey;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Walks `root` and returns every usable private key below it.
///
/// Entries come back depth-first, sorted by file name within a directory.
/// A missing `root` yields an empty list. A regular file that cannot be
/// read aborts the whole scan.
pub fn scan(root: &Path) -> Result<Vec<Key>, KeychainError> {
    match fs::symlink_metadata(root) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(root = %root.display(), "key directory does not exist");
            return Ok(Vec::new());
        }
        Err(err) => return Err(KeychainError::io(root, err)),
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let data = fs::read(path).map_err(|err| KeychainError::io(path, err))?;

        let classification = classify(&data);
        if !classification.is_usable() {
            debug!(path = %path.display(), "skipping non-key file");
            continue;
        }
        let Some(private_key) = classification.into_private_key() else {
            continue;
        };

        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        let comment = read_comment(path);
        match Key::new(name, path.to_path_buf(), private_key, comment) {
            Some(key) => keys.push(key),
            None => debug!(path = %path.display(), "public key cannot be encoded"),
        }
    }

    info!(root = %root.display(), count = keys.len(), "scanned private keys");
    Ok(keys)
}

fn walk_error(root: &Path, err: walkdir::Error) -> KeychainError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop"));
    KeychainError::io(path, source)
}

fn public_key_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// Comment of the `<path>.pub` sibling. Missing or broken files give "".
fn read_comment(path: &Path) -> String {
    let Ok(text) = fs::read_to_string(public_key_path(path)) else {
        return String::new();
    };
    let Some(line) = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
    else {
        return String::new();
    };
    match PublicKey::from_openssh(line) {
        Ok(key) => key.comment().to_string(),
        Err(_) => String::new(),
    }
}
