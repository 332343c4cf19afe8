//! ``src/engine/extract.rs``
//! ============================================================================
//! # Extraction Engine: Selective Forward Pass Over an Entry Stream
//!
//! Reconciles an optional selection tree against an archive's entries in
//! one pass, in native stream order. A fresh stream is opened for the
//! pass — the index built at open time cannot be rewound. Every entry is
//! written independently: a bad entry costs only itself, and only a dead
//! stream aborts the operation. Escaping pathnames are rejected before
//! the selection is even consulted.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::container::archive::ArchiveContainer;
use crate::container::format::{ArchiveFormat, TarCompression, normalize_entry_name};
use crate::error::AppError;
use crate::model::path_tree::PathTree;

/// What one extraction pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractReport {
    /// Files written.
    pub written: usize,

    /// Directories created from directory entries.
    pub dirs: usize,

    /// Entries passed over: unselected, unusable name, or unsupported kind.
    pub skipped: usize,

    /// Entries that failed individually and were left behind.
    pub failed: usize,
}

/// Extract `archive` into `dest`.
///
/// With a selection tree, only member paths the tree contains are
/// materialized; without one, everything is. `cancel` is honoured between
/// entries — never mid-entry, the stream cannot be resumed safely.
pub fn extract(
    archive: &ArchiveContainer,
    selection: Option<&PathTree>,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractReport, AppError> {
    fs::create_dir_all(dest)?;

    info!(
        archive = %archive.path().display(),
        dest = %dest.display(),
        selective = selection.is_some(),
        "extraction started"
    );

    let report = match archive.format() {
        ArchiveFormat::Tar(compression) => {
            extract_tar(archive, compression, selection, dest, cancel)?
        }
        ArchiveFormat::Zip => extract_zip(archive, selection, dest, cancel)?,
    };

    info!(
        archive = %archive.path().display(),
        written = report.written,
        dirs = report.dirs,
        skipped = report.skipped,
        failed = report.failed,
        "extraction finished"
    );

    Ok(report)
}

fn extract_tar(
    archive: &ArchiveContainer,
    compression: TarCompression,
    selection: Option<&PathTree>,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractReport, AppError> {
    // Fresh stream position for the pass.
    let file = File::open(archive.path()).map_err(|e| AppError::corrupted(archive.path(), e))?;
    let reader: Box<dyn Read> = match compression {
        TarCompression::None => Box::new(file),
        TarCompression::Gzip => Box::new(GzDecoder::new(file)),
    };

    let mut tar = tar::Archive::new(reader);
    let entries = tar
        .entries()
        .map_err(|e| AppError::corrupted(archive.path(), e))?;

    let mut report = ExtractReport::default();
    for entry in entries {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        // The stream itself failing aborts the whole pass.
        let mut entry = entry.map_err(|e| AppError::corrupted(archive.path(), e))?;

        let Some(rel) = entry
            .path()
            .ok()
            .and_then(|p| p.to_str().map(ToString::to_string))
            .and_then(|raw| normalize_entry_name(&raw))
        else {
            warn!(archive = %archive.path().display(), "skipping entry with unusable name");
            report.skipped += 1;
            continue;
        };

        if !is_selected(selection, &archive.path().join(&rel)) {
            report.skipped += 1;
            continue;
        }

        let target = dest.join(&rel);
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&target)?;
            report.dirs += 1;
        } else if entry_type.is_file() {
            let mode = entry.header().mode().ok();
            match write_file_entry(&mut entry, &target, mode) {
                Ok(bytes) => {
                    debug!(entry = %rel.display(), bytes, "extracted");
                    report.written += 1;
                }
                Err(e) => {
                    warn!(entry = %rel.display(), error = %e, "entry extraction failed");
                    report.failed += 1;
                }
            }
        } else {
            debug!(entry = %rel.display(), ?entry_type, "skipping non-file entry");
            report.skipped += 1;
        }
    }

    Ok(report)
}

fn extract_zip(
    archive: &ArchiveContainer,
    selection: Option<&PathTree>,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractReport, AppError> {
    let file = File::open(archive.path()).map_err(|e| AppError::corrupted(archive.path(), e))?;
    let mut zip =
        zip::ZipArchive::new(file).map_err(|e| AppError::corrupted(archive.path(), e))?;

    let mut report = ExtractReport::default();
    for i in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut entry = match zip.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(archive = %archive.path().display(), index = i, error = %e, "unreadable entry");
                report.failed += 1;
                continue;
            }
        };

        let raw = entry.name().to_string();
        let Some(rel) = normalize_entry_name(&raw) else {
            warn!(archive = %archive.path().display(), name = raw, "skipping entry with unusable name");
            report.skipped += 1;
            continue;
        };

        if !is_selected(selection, &archive.path().join(&rel)) {
            report.skipped += 1;
            continue;
        }

        let target = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            report.dirs += 1;
        } else {
            let mode = entry.unix_mode();
            match write_file_entry(&mut entry, &target, mode) {
                Ok(bytes) => {
                    debug!(entry = %rel.display(), bytes, "extracted");
                    report.written += 1;
                }
                Err(e) => {
                    warn!(entry = %rel.display(), error = %e, "entry extraction failed");
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Membership against the container-rooted selection path. A path outside
/// the selection root is simply not selected.
fn is_selected(selection: Option<&PathTree>, abs: &Path) -> bool {
    match selection {
        None => true,
        Some(tree) => tree.contains(abs).unwrap_or(false),
    }
}

/// Stream one entry payload into a fresh file, creating parents first.
fn write_file_entry<R: Read>(reader: &mut R, target: &Path, mode: Option<u32>) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = File::create(target)?;
    let bytes = io::copy(reader, &mut out)?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o777));
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(bytes)
}
