//! Atomic file writes.
//!
//! A write goes to a uniquely named hidden sibling first, is synced to disk,
//! and only then replaces the target. A reader of the target therefore sees
//! either the old complete content or the new complete content.
//!
//! There is no cross-process locking: two concurrent writers race at the
//! final rename and the last rename wins.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write `bytes` to `target` atomically.
///
/// This function:
/// 1. Writes to a temporary sibling (`.{name}.tmp-{uuid}`) and fsyncs it
/// 2. Renames the temporary file onto `target`
/// 3. Only if that rename is refused, removes `target` and renames again
///
/// If any step fails the temporary file is removed.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp_path = write_temp(target, bytes)?;
    commit_temp(&temp_path, target)
}

/// First phase: write `bytes` to a fresh temporary sibling of `target`.
///
/// Returns the temporary path. The target is not touched.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the
/// temporary file cannot be written.
pub fn write_temp(target: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let temp_path = temp_sibling(target);
    let result = (|| {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(temp_path)
}

/// Second phase: move a temporary file produced by [`write_temp`] onto `target`.
///
/// # Errors
///
/// Returns an error if the rename fails and the existing target cannot be
/// replaced either. The temporary file is cleaned up in that case.
pub fn commit_temp(temp_path: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(temp_path, target).is_ok() {
        return Ok(());
    }

    // Some platforms refuse to rename over an existing file.
    let retried = match fs::remove_file(target) {
        Ok(()) => fs::rename(temp_path, target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::rename(temp_path, target),
        Err(e) => Err(e),
    };
    if retried.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    retried
}

/// Unique hidden temporary path next to `target`.
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().to_string());
    let unique = uuid::Uuid::new_v4().simple().to_string();
    target.with_file_name(format!(".{name}.tmp-{unique}"))
}
