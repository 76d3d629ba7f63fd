use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::is_image_file;
use crate::run::RunToken;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub skip_hidden: bool,
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            follow_links: true,
        }
    }
}

/// Recursively collects image files under one or more roots.
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    options: ScanOptions,
}

impl FolderScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scans each root fully, in the order given. Each root's files are sorted
    /// by name; roots are not interleaved.
    ///
    /// A file reached through more than one root (repeated or nested roots,
    /// symlinked aliases) is kept only where it is first seen.
    ///
    /// Stops early once `cancel` is superseded. The partial list returned then
    /// is incomplete and should be discarded by the caller.
    pub fn scan(&self, roots: &[PathBuf], cancel: &RunToken) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();

        for root in roots {
            if cancel.is_cancelled() {
                break;
            }
            for path in self.scan_root(root, cancel) {
                if seen.insert(identity(&path)) {
                    files.push(path);
                } else {
                    log::debug!("Skipping {:?}: already found under an earlier root", path);
                }
            }
        }

        files
    }

    pub fn scan_root(&self, root: &Path, cancel: &RunToken) -> Vec<PathBuf> {
        if !root.is_dir() {
            log::warn!("Skipping {:?}: not a directory", root);
            return Vec::new();
        }

        let skip_hidden = self.options.skip_hidden;
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.options.follow_links)
            .into_iter()
            .filter_entry(|entry| !(skip_hidden && is_hidden(entry)));

        for entry in walker {
            if cancel.is_cancelled() {
                log::debug!("Scan of {:?} cancelled after {} files", root, files.len());
                return files;
            }

            // Unreadable directories and symlink loops are skipped
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("Skipping entry under {:?}: {}", root, e);
                    continue;
                }
            };

            if entry.file_type().is_file() && is_image_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort_by(|a, b| compare_file_names(a, b));
        files
    }
}

/// Canonical form of `path`, or the path itself when it cannot be resolved.
fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Case-insensitive natural ordering on file names ("img2" before "img10"),
/// with the full path as tie-breaker so the order is total.
pub fn compare_file_names(a: &Path, b: &Path) -> Ordering {
    let name_a = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let name_b = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();

    natord::compare_ignore_case(&name_a, &name_b).then_with(|| a.cmp(b))
}
