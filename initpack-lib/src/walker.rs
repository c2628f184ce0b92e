use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::entry::{Entry, EntryKind};
use crate::error::{CpioError, Result};

/// Lazily enumerates every directory and regular file below a root.
///
/// Each directory's immediate contents are yielded before any of them is
/// descended into: subdirectories first, then files, both sorted by name.
/// Descent is depth first in the same sorted order. The root itself is not
/// yielded. Symlinks are not followed; they and other special files are
/// skipped with a warning.
pub struct TreeWalker {
    root: PathBuf,
    ready: VecDeque<Entry>,
    pending_dirs: Vec<PathBuf>,
    failed: bool,
}

impl TreeWalker {
    /// Fails with `NotFound` when `root` is missing or not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(CpioError::NotFound(root));
        }
        Ok(TreeWalker {
            pending_dirs: vec![root.clone()],
            root,
            ready: VecDeque::new(),
            failed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads one directory level, queues its entries and schedules its
    /// subdirectories for descent.
    fn expand(&mut self, dir: &Path) -> Result<()> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        let listing = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for ent in listing {
            let ent = ent.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                let msg = e.to_string();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
                CpioError::Io { path, source }
            })?;

            let file_type = ent.file_type();
            if file_type.is_dir() {
                dirs.push(ent.into_path());
            } else if file_type.is_file() {
                files.push(ent.into_path());
            } else {
                warn!(path = %ent.path().display(), "skipping special file");
            }
        }

        for path in &dirs {
            let entry = self.entry(path, EntryKind::Directory)?;
            self.ready.push_back(entry);
        }
        for path in &files {
            let entry = self.entry(path, EntryKind::File)?;
            self.ready.push_back(entry);
        }

        // Stack: the first subdirectory must come out first.
        self.pending_dirs.extend(dirs.into_iter().rev());
        Ok(())
    }

    fn entry(&self, path: &Path, kind: EntryKind) -> Result<Entry> {
        Ok(Entry {
            relative_path: relative_name(&self.root, path)?,
            kind,
            source: path.to_path_buf(),
        })
    }
}

impl Iterator for TreeWalker {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(Ok(entry));
            }
            let dir = self.pending_dirs.pop()?;
            if let Err(e) = self.expand(&dir) {
                self.failed = true;
                self.ready.clear();
                self.pending_dirs.clear();
                return Some(Err(e));
            }
        }
    }
}

/// POSIX-style path of `path` relative to `root`.
pub fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| CpioError::InvalidName(path.to_path_buf()))?;

    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(s) => {
                let s = s
                    .to_str()
                    .ok_or_else(|| CpioError::InvalidName(path.to_path_buf()))?;
                parts.push(s);
            }
            Component::CurDir => {}
            _ => return Err(CpioError::InvalidName(path.to_path_buf())),
        }
    }

    if parts.is_empty() {
        return Err(CpioError::InvalidName(path.to_path_buf()));
    }
    Ok(parts.join("/"))
}
