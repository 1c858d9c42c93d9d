//! Template and overlay tree copying
//!
//! Maps every file under a source tree onto the same relative path under a
//! target tree. Templates are only added where nothing exists yet; overlays
//! always replace their counterpart. File granularity only, no merging.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

/// How a source file is placed onto the target tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Leave an existing target file untouched
    SkipIfExists,
    /// Always write, replacing any existing target file
    Overwrite,
}

/// Errors for tree copying
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("failed to {op} {}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk {}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid file pattern")]
    Glob(#[from] globset::Error),
}

/// A file read from the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    /// Path relative to the source root
    pub relative_path: PathBuf,
    /// Verbatim file content
    pub content: Vec<u8>,
}

/// Result of placing one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placed {
    /// Target written
    Written,
    /// Target existed and the policy left it alone
    Skipped,
    /// Target already had identical content
    Unchanged,
}

/// What a copy did, by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

impl CopyReport {
    pub fn is_empty(&self) -> bool {
        self.copied.is_empty() && self.skipped.is_empty() && self.unchanged.is_empty()
    }
}

/// Copies a source tree onto a target tree with one placement policy
#[derive(Debug)]
pub struct TreeCopier {
    source: PathBuf,
    target: PathBuf,
    placement: Placement,
    filter: Option<GlobSet>,
}

impl TreeCopier {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>, placement: Placement) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            placement,
            filter: None,
        }
    }

    /// Only copy files whose relative path matches one of `patterns`
    pub fn with_filter(mut self, patterns: &[&str]) -> Result<Self, CopyError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.filter = Some(builder.build()?);
        Ok(self)
    }

    /// Read every participating source file, sorted by path.
    ///
    /// A missing source root yields no entries.
    pub fn entries(&self) -> Result<Vec<OverlayEntry>, CopyError> {
        if !self.source.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.source)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry.map_err(|source| CopyError::Walk {
                root: self.source.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative_path) = entry.path().strip_prefix(&self.source) else {
                continue;
            };
            if let Some(filter) = &self.filter {
                if !filter.is_match(relative_path) {
                    continue;
                }
            }

            let content = fs::read(entry.path()).map_err(|source| CopyError::Io {
                op: "read",
                path: entry.path().to_path_buf(),
                source,
            })?;
            entries.push(OverlayEntry {
                relative_path: relative_path.to_path_buf(),
                content,
            });
        }

        Ok(entries)
    }

    /// Copy the tree, returning which files were copied or skipped
    pub fn copy(&self) -> Result<CopyReport, CopyError> {
        let mut report = CopyReport::default();
        for entry in self.entries()? {
            match place(&entry, &self.target, self.placement)? {
                Placed::Written => {
                    debug!("copied {}", entry.relative_path.display());
                    report.copied.push(entry.relative_path);
                }
                Placed::Skipped => {
                    debug!("{} already exists, skipping", entry.relative_path.display());
                    report.skipped.push(entry.relative_path);
                }
                Placed::Unchanged => report.unchanged.push(entry.relative_path),
            }
        }
        Ok(report)
    }
}

/// Place one entry under `target_root` according to `placement`.
///
/// Overwriting a file with identical bytes is reported as unchanged and
/// leaves the file alone.
pub fn place(entry: &OverlayEntry, target_root: &Path, placement: Placement) -> Result<Placed, CopyError> {
    let target = target_root.join(&entry.relative_path);

    if target.exists() {
        if placement == Placement::SkipIfExists {
            return Ok(Placed::Skipped);
        }
        if fs::read(&target).is_ok_and(|existing| existing == entry.content) {
            return Ok(Placed::Unchanged);
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| CopyError::Io {
            op: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target, &entry.content).map_err(|source| CopyError::Io {
        op: "write",
        path: target.clone(),
        source,
    })?;
    Ok(Placed::Written)
}
