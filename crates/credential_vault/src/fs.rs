use std::{
    fs,
    io::{ErrorKind, Write},
    path::Path,
};

use tempfile::NamedTempFile;

use crate::error::{Result, VaultError};

/// Replaces `path` with `bytes` through a sibling temp file and a rename.
///
/// Readers observe either the previous content or the complete new content.
/// The temp file is created with mode 0600 on Unix and keeps it after the rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    fs::create_dir_all(dir).map_err(|e| VaultError::storage(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| VaultError::storage(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| VaultError::storage(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| VaultError::storage(tmp.path(), e))?;

    tmp.persist(path)
        .map_err(|e| VaultError::storage(path, e.error))?;

    // make the rename itself durable
    #[cfg(unix)]
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(error = %e, dir = %dir.display(), "Failed to sync vault directory");
    }

    Ok(())
}

/// Reads `path`, mapping "not found" to `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VaultError::storage(path, e)),
    }
}

/// Removes `path`. Returns whether a file was actually removed.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(VaultError::storage(path, e)),
    }
}
