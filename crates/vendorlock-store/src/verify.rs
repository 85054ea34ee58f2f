//! Tree digests and vendor tree verification.

use crate::errors::{digest_error, io_error_at, Result};
use crate::fs::{exists, project_path};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use vendorlock_core::model::{VersionedDigest, HASH_VERSION};
use vendorlock_core::VendorStatus;
use walkdir::{DirEntry, WalkDir};

/// Version control metadata directories, never part of a project's content
pub const VCS_DIRS: [&str; 4] = [".git", ".hg", ".svn", ".bzr"];

const TAG_DIR: u8 = b'd';
const TAG_FILE: u8 = b'f';
const TAG_SYMLINK: u8 = b'l';

/// Directories excluded from a digest: VCS metadata and nested vendor trees
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_str().unwrap_or_default();
    name == "vendor" || VCS_DIRS.contains(&name)
}

fn slash_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip the `\r` of every `\r\n` pair so checkouts with either line ending
/// hash the same
fn normalize_line_endings(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut iter = content.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Compute the content digest of the tree rooted at `dir`
///
/// Entries are visited in sorted order; each contributes its slash-separated
/// relative path, a type tag, and its content (symlink target for links).
///
/// # Errors
///
/// Fails if `dir` is not a directory or any entry cannot be read.
pub fn digest_from_directory(dir: &Path) -> Result<VersionedDigest> {
    let meta = fs::metadata(dir).map_err(|e| io_error_at("digest_tree", dir, e))?;
    if !meta.is_dir() {
        return Err(digest_error(dir, "cannot digest a non-directory"));
    }

    let mut hasher = Sha256::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = entry.map_err(|e| digest_error(dir, e.to_string()))?;
        if entry.depth() == 0 {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| digest_error(entry.path(), e.to_string()))?;

        hasher.update(slash_path(rel).as_bytes());
        hasher.update([0u8]);

        let ft = entry.file_type();
        if ft.is_dir() {
            hasher.update([TAG_DIR]);
        } else if ft.is_symlink() {
            let target = fs::read_link(entry.path())
                .map_err(|e| io_error_at("read_link", entry.path(), e))?;
            let target = target.to_string_lossy().replace('\\', "/");
            hasher.update([TAG_SYMLINK]);
            hasher.update((target.len() as u64).to_le_bytes());
            hasher.update(target.as_bytes());
        } else {
            let content =
                fs::read(entry.path()).map_err(|e| io_error_at("read_file", entry.path(), e))?;
            let content = normalize_line_endings(&content);
            hasher.update([TAG_FILE]);
            hasher.update((content.len() as u64).to_le_bytes());
            hasher.update(&content);
        }
    }

    Ok(VersionedDigest::new(HASH_VERSION, hasher.finalize().to_vec()))
}

fn status_for(path: &Path, wanted: Option<&VersionedDigest>) -> Result<VendorStatus> {
    if !exists(path) {
        return Ok(VendorStatus::NotInTree);
    }
    let wanted = match wanted {
        Some(d) if !d.is_empty() => d,
        _ => return Ok(VendorStatus::EmptyDigestInLock),
    };
    if wanted.hash_version != HASH_VERSION {
        return Ok(VendorStatus::HashVersionMismatch);
    }
    if !path.is_dir() {
        return Ok(VendorStatus::DigestMismatchInLock);
    }
    let actual = digest_from_directory(path)?;
    Ok(if actual == *wanted {
        VendorStatus::NoMismatch
    } else {
        VendorStatus::DigestMismatchInLock
    })
}

/// Compare the vendor tree at `vendor_root` against the digests the lock
/// expects
///
/// Every wanted project gets a status. Anything else under the vendor root
/// that is neither a project root nor a parent of one is reported as
/// [`VendorStatus::NotInLock`], keyed by its slash-separated relative path.
/// A `.git` directly under the vendor root is ignored.
pub fn check_dep_tree(
    vendor_root: &Path,
    wanted: &BTreeMap<String, Option<VersionedDigest>>,
) -> Result<BTreeMap<String, VendorStatus>> {
    let mut status = BTreeMap::new();

    for (root, digest) in wanted {
        let path = project_path(vendor_root, root);
        status.insert(root.clone(), status_for(&path, digest.as_ref())?);
    }

    if !vendor_root.is_dir() {
        return Ok(status);
    }

    // Every proper parent path of a wanted root, e.g. "example.com" and
    // "example.com/user" for "example.com/user/repo".
    let parents: BTreeSet<String> = wanted
        .keys()
        .flat_map(|root| {
            let segs: Vec<&str> = root.split('/').collect();
            (1..segs.len())
                .map(|n| segs[..n].join("/"))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut walker = WalkDir::new(vendor_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| digest_error(vendor_root, e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(vendor_root)
            .map_err(|e| digest_error(entry.path(), e.to_string()))?;
        let rel = slash_path(rel);

        if entry.depth() == 1 && rel == ".git" {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        if wanted.contains_key(&rel) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        if parents.contains(&rel) && entry.file_type().is_dir() {
            continue;
        }

        status.insert(rel, VendorStatus::NotInLock);
        if entry.file_type().is_dir() {
            walker.skip_current_dir();
        }
    }

    Ok(status)
}
