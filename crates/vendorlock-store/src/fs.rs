//! Filesystem primitives
//!
//! Renames fall back to copy-then-delete when source and destination are on
//! different devices. Single files are written with the temp→rename pattern so
//! readers never see a partial write.

use crate::errors::{io_error_at, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[cfg(unix)]
const EXDEV: i32 = 18;
#[cfg(windows)]
const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE

fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EXDEV)
}

/// Rename `src` to `dst`, copying across devices when a plain rename cannot
pub fn rename_with_fallback(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            if meta.is_dir() {
                copy_dir(src, dst)?;
                fs::remove_dir_all(src)
            } else {
                fs::copy(src, dst)?;
                fs::remove_file(src)
            }
        }
        Err(err) => Err(err),
    }
}

/// Recursively copy a directory tree, preserving symlinks on unix
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let to = dst.join(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            fs::create_dir_all(&to)?;
        } else if ft.is_symlink() {
            copy_symlink(entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
pub(crate) fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

/// Atomically write bytes to a file
///
/// The temp file lives in the target's directory so the final rename never
/// crosses a device.
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| io_error_at("create_parent_dir", &parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)
        .map_err(|e| io_error_at("create_temp_file", &parent, e))?;
    tmp.write_all(content)
        .map_err(|e| io_error_at("write_temp_file", tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| io_error_at("rename_temp_file", target, e.error))?;
    Ok(())
}

/// Path of a project root beneath `base`, one directory per slash segment
pub fn project_path(base: &Path, root: &str) -> PathBuf {
    root.split('/')
        .filter(|seg| !seg.is_empty())
        .fold(base.to_path_buf(), |acc, seg| acc.join(seg))
}

/// Does `dir` contain a `.git` file or directory
pub fn has_dot_git(dir: &Path) -> bool {
    fs::symlink_metadata(dir.join(".git")).is_ok()
}

/// Does anything exist at `path` (without following a final symlink)
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove a file, symlink or directory tree
pub fn remove_any(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Vendor.lock");

        atomic_write(&target, b"hello").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Vendor.lock");

        atomic_write(&target, b"first").unwrap();
        atomic_write(&target, b"second").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"second");
        let count = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rename_with_fallback_moves_tree() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/f.txt"), "x").unwrap();
        let dst = temp_dir.path().join("dst");

        rename_with_fallback(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("a/b/f.txt")).unwrap(), "x");
    }

    #[test]
    fn test_rename_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = rename_with_fallback(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("dst"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_copy_dir() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("nested/empty")).unwrap();
        fs::write(src.join("nested/f.rs"), "fn main() {}").unwrap();
        let dst = temp_dir.path().join("dst");

        copy_dir(&src, &dst).unwrap();

        assert!(dst.join("nested/empty").is_dir());
        assert_eq!(
            fs::read_to_string(dst.join("nested/f.rs")).unwrap(),
            "fn main() {}"
        );
        assert!(src.exists());
    }

    #[test]
    fn test_project_path_and_dot_git() {
        let temp_dir = TempDir::new().unwrap();
        let p = project_path(temp_dir.path(), "example.com/user/repo");
        assert_eq!(p, temp_dir.path().join("example.com").join("user").join("repo"));

        assert!(!has_dot_git(temp_dir.path()));
        fs::create_dir(temp_dir.path().join(".git")).unwrap();
        assert!(has_dot_git(temp_dir.path()));
    }
}
