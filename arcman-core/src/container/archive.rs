//! ``src/container/archive.rs``
//! ============================================================================
//! # `ArchiveContainer`: An Opened Archive as a Navigable Namespace
//!
//! Sniffs the format by content, then builds the member index in one
//! forward pass over the entry stream — archives are not assumed
//! randomly re-listable, so the index is eager and immutable for the
//! container's lifetime. Entry names are normalized on the way in;
//! undecodable or escaping names are skipped and logged, never fatal.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::container::format::{ArchiveFormat, TarCompression, normalize_entry_name};
use crate::container::namespace::Namespace;
use crate::error::AppError;
use crate::model::path_tree::PathTree;

/// One opened archive: its path, sniffed format, and parsed member index.
#[derive(Debug)]
pub struct ArchiveContainer {
    path: PathBuf,
    format: ArchiveFormat,
    index: PathTree,

    /// Paths recorded as explicit directory entries, so empty directories
    /// stay enterable.
    dirs: HashSet<PathBuf>,
    member_count: usize,
}

impl ArchiveContainer {
    /// Open the archive at `path` and index its members.
    ///
    /// Fails with `UnsupportedFormat` when the content sniff matches
    /// nothing, and `CannotOpen` when the sniffed format cannot read its
    /// own header or entry stream.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let format = ArchiveFormat::sniff_file(&path)
            .map_err(|e| AppError::cannot_open(&path, e))?
            .ok_or_else(|| AppError::UnsupportedFormat(path.clone()))?;

        let mut container = Self {
            index: PathTree::new(&path),
            dirs: HashSet::new(),
            member_count: 0,
            path,
            format,
        };

        match format {
            ArchiveFormat::Tar(compression) => container.index_tar(compression)?,
            ArchiveFormat::Zip => container.index_zip()?,
        }

        info!(
            path = %container.path.display(),
            format = format.label(),
            members = container.member_count,
            "opened archive container"
        );

        Ok(container)
    }

    fn index_tar(&mut self, compression: TarCompression) -> Result<(), AppError> {
        let file = File::open(&self.path).map_err(|e| AppError::cannot_open(&self.path, e))?;
        let reader: Box<dyn Read> = match compression {
            TarCompression::None => Box::new(file),
            TarCompression::Gzip => Box::new(GzDecoder::new(file)),
        };

        let mut archive = tar::Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| AppError::cannot_open(&self.path, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| AppError::cannot_open(&self.path, e))?;

            let raw = match entry.path() {
                Ok(p) => p.into_owned(),
                Err(e) => {
                    warn!(archive = %self.path.display(), error = %e, "unreadable entry name");
                    continue;
                }
            };
            let Some(raw) = raw.to_str() else {
                warn!(archive = %self.path.display(), "undecodable entry name");
                continue;
            };

            let is_dir = entry.header().entry_type().is_dir();
            self.insert_member(raw, is_dir)?;
        }

        Ok(())
    }

    fn index_zip(&mut self) -> Result<(), AppError> {
        let file = File::open(&self.path).map_err(|e| AppError::cannot_open(&self.path, e))?;
        let archive =
            zip::ZipArchive::new(file).map_err(|e| AppError::cannot_open(&self.path, e))?;

        let names: Vec<String> = archive.file_names().map(ToString::to_string).collect();
        for raw in names {
            let is_dir = raw.ends_with('/') || raw.ends_with('\\');
            self.insert_member(&raw, is_dir)?;
        }

        Ok(())
    }

    fn insert_member(&mut self, raw: &str, is_dir: bool) -> Result<(), AppError> {
        let Some(rel) = normalize_entry_name(raw) else {
            warn!(archive = %self.path.display(), name = raw, "skipping unusable entry name");
            return Ok(());
        };

        let abs = self.path.join(rel);
        if is_dir {
            self.dirs.insert(abs.clone());
        }
        self.index.add(&abs)?;
        self.member_count += 1;

        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Number of members accepted into the index.
    #[must_use]
    pub const fn member_count(&self) -> usize {
        self.member_count
    }

    #[must_use]
    pub fn list_children(&self, path: &Path) -> Vec<String> {
        self.index.children_names(path).unwrap_or_default()
    }

    /// Directory-like: the archive root, an explicit directory entry, or
    /// any node with children.
    #[must_use]
    pub fn is_enterable(&self, path: &Path) -> bool {
        path == self.path
            || self.dirs.contains(path)
            || self
                .index
                .children_names(path)
                .map(|children| !children.is_empty())
                .unwrap_or(false)
    }

    /// Archive namespaces have no inode identity; fall back to
    /// case-insensitive path equality.
    #[must_use]
    pub fn same_file(&self, a: &Path, b: &Path) -> bool {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    }

    #[must_use]
    pub fn count_items(&self, path: &Path, limit: Option<usize>) -> usize {
        self.index.count_subtree(path, limit).unwrap_or(0)
    }
}

impl Namespace for ArchiveContainer {
    fn list_children(&self, path: &Path) -> Vec<String> {
        Self::list_children(self, path)
    }

    fn is_enterable(&self, path: &Path) -> bool {
        Self::is_enterable(self, path)
    }
}
