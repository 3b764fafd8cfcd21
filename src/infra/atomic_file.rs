use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{EtlError, Result};

/// Removes a temporary file on drop unless disarmed
pub struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temporary file {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Sibling path used while an artifact is being written: `<name>.tmp`
pub fn staging_path(final_path: &Path) -> Result<PathBuf> {
    let file_name = final_path.file_name().ok_or_else(|| {
        EtlError::Config(format!("output path '{}' has no file name", final_path.display()))
    })?;
    let mut staged = OsString::from(file_name);
    staged.push(".tmp");
    Ok(final_path.with_file_name(staged))
}

/// Create the parent directory of an output path if it is missing
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| EtlError::output(dir, e))
        }
        _ => Ok(()),
    }
}

/// Move a staged file onto its destination, replacing any previous file
pub fn publish(staged: &Path, final_path: &Path) -> Result<()> {
    fs::rename(staged, final_path).map_err(|e| EtlError::output(final_path, e))
}

/// Write bytes to a temporary sibling, then rename over the destination
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    let tmp_path = staging_path(path)?;
    let mut guard = TempFileGuard::new(tmp_path.clone());

    let mut file = fs::File::create(&tmp_path).map_err(|e| EtlError::output(&tmp_path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| EtlError::output(&tmp_path, e))?;
    drop(file);

    publish(&tmp_path, path)?;
    guard.disarm();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_staging_path_appends_suffix() {
        let staged = staging_path(Path::new("out/clean_events.parquet")).unwrap();
        assert_eq!(staged, PathBuf::from("out/clean_events.parquet.tmp"));
    }

    #[test]
    fn test_guard_removes_file_unless_disarmed() {
        let dir = tempdir().unwrap();
        let dropped = dir.path().join("a.tmp");
        let kept = dir.path().join("b.tmp");
        fs::write(&dropped, b"x").unwrap();
        fs::write(&kept, b"x").unwrap();

        drop(TempFileGuard::new(dropped.clone()));
        let mut guard = TempFileGuard::new(kept.clone());
        guard.disarm();
        drop(guard);

        assert!(!dropped.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_write_atomic_creates_dirs_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.prom");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!staging_path(&path).unwrap().exists());
    }
}
