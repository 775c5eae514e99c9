//! The archiving pipeline: filename derivation, attachment extraction,
//! per-message processing, and the poll loop.

pub mod attachments;
pub mod postprocess;
pub mod processor;
pub mod sanitize;
pub mod service;
pub mod timestamp;

use std::io::Write;
use std::path::Path;

use crate::error::{Result, StashError};

/// Write `data` to `path` via write-to-temp-then-rename, so a crash mid-write
/// can never leave a truncated file. Replaces an existing file at `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| StashError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| StashError::io(path, e))?;
    tmp.persist(path).map_err(|e| StashError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        // No leftover temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
