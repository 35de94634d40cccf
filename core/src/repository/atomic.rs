//! Temp-file + fsync + rename write primitive, grounded on
//! `gpu_stats_persistence.rs::save`: never truncate the canonical path in
//! place, always land a fully-written file via rename.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::CoreResult;

const DEFAULT_FILE_MODE: u32 = 0o600;

/// Writes `contents` to `path` atomically, using the default `0600` mode.
pub fn write_atomic(path: &Path, contents: &[u8]) -> CoreResult<()> {
    write_atomic_with_mode(path, contents, DEFAULT_FILE_MODE)
}

/// Writes `contents` to `path` atomically with an explicit file mode.
///
/// A uniquely named temp file is created in the same directory as `path` (so
/// the final rename is same-filesystem and therefore atomic), written,
/// `fsync`ed, then renamed over the canonical path. Any leftover temp file
/// from a partial previous attempt is harmless and overwritten by name reuse
/// next time; this function always generates a fresh name.
pub fn write_atomic_with_mode(path: &Path, contents: &[u8], mode: u32) -> CoreResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    set_dir_mode(parent)?;

    let tmp_path = unique_temp_path(parent, path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn unique_temp_path(parent: &Path, target: &Path) -> std::path::PathBuf {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tmp");
    let unique = uuid::Uuid::new_v4();
    parent.join(format!(".{file_name}.{unique}.tmp"))
}

#[cfg(unix)]
fn set_dir_mode(dir: &Path) -> CoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(dir)?.permissions();
    perms.set_mode(0o700);
    fs::set_permissions(dir, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_mode(_dir: &Path) -> CoreResult<()> {
    Ok(())
}

/// Reads a whole file, returning `None` if it does not exist (the
/// "missing file is empty state" discipline `gpu_stats_persistence.rs`
/// uses for graceful first-run behavior).
pub fn read_if_exists(path: &Path) -> CoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Opens (without creating) a file strictly for locking purposes.
pub fn open_for_lock(path: &Path) -> CoreResult<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(DEFAULT_FILE_MODE)
        .open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_atomic(&path, b"{}").unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn overwrites_existing_file_fully() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_atomic(&path, b"{\"a\":1}").unwrap();
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.json");
        assert!(read_if_exists(&path).unwrap().is_none());
    }
}
