//! ``src/engine/create.rs``
//! ============================================================================
//! # Creation Engine: Bundle a Selection Into a New Archive
//!
//! Walks the selection tree's endpoint sequence and streams each file
//! into the archive writer sequentially. Directories are never written
//! as members — they are implied by file paths. Size, mtime, and
//! permission bits are carried over from filesystem metadata.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::container::Container;
use crate::container::format::{ArchiveFormat, TarCompression};
use crate::error::AppError;
use crate::model::path_tree::PathTree;

/// What one creation pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CreateReport {
    /// Files streamed into the archive.
    pub files: usize,

    /// Selected paths passed over (directories, vanished files).
    pub skipped: usize,
}

/// Create a new archive at `dest` from the selection over `container`.
///
/// Only the filesystem can be the source of a new archive; the
/// destination format follows the filename extension.
pub fn create(
    container: &Container,
    selection: &PathTree,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<CreateReport, AppError> {
    if !container.is_filesystem() {
        return Err(AppError::NonFilesystemSource);
    }

    let format = ArchiveFormat::from_extension(dest)
        .ok_or_else(|| AppError::UnsupportedFormat(dest.to_path_buf()))?;

    info!(
        dest = %dest.display(),
        format = format.label(),
        root = %selection.root_path().display(),
        "archive creation started"
    );

    let report = match format {
        ArchiveFormat::Tar(TarCompression::None) => {
            let file = File::create(dest)?;
            let mut builder = tar::Builder::new(file);
            let report = append_tar_members(&mut builder, selection, cancel)?;
            builder.finish()?;
            report
        }
        ArchiveFormat::Tar(TarCompression::Gzip) => {
            let file = File::create(dest)?;
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let report = append_tar_members(&mut builder, selection, cancel)?;
            builder.into_inner()?.finish()?;
            report
        }
        ArchiveFormat::Zip => create_zip(selection, dest, cancel)?,
    };

    info!(
        dest = %dest.display(),
        files = report.files,
        skipped = report.skipped,
        "archive creation finished"
    );

    Ok(report)
}

fn append_tar_members<W: Write>(
    builder: &mut tar::Builder<W>,
    selection: &PathTree,
    cancel: &CancellationToken,
) -> Result<CreateReport, AppError> {
    let root = selection.root_path();
    let mut report = CreateReport::default();

    for path in selection.leaves() {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "selected path vanished");
                report.skipped += 1;
                continue;
            }
        };
        if meta.is_dir() {
            report.skipped += 1;
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .map_err(|_| AppError::out_of_range(&path, root))?;

        // append_path_with_name carries size, mtime, and mode from the
        // file's metadata.
        builder.append_path_with_name(&path, rel)?;
        report.files += 1;
    }

    Ok(report)
}

fn create_zip(
    selection: &PathTree,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<CreateReport, AppError> {
    let root = selection.root_path();
    let file = File::create(dest)?;
    let mut writer = zip::ZipWriter::new(file);

    let mut report = CreateReport::default();
    for path in selection.leaves() {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "selected path vanished");
                report.skipped += 1;
                continue;
            }
        };
        if meta.is_dir() {
            report.skipped += 1;
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .map_err(|_| AppError::out_of_range(&path, root))?;
        let member_name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let mut options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(meta.permissions().mode());
        }
        if let Ok(modified) = meta.modified()
            && let Ok(mtime) = zip::DateTime::try_from(time::OffsetDateTime::from(modified))
        {
            options = options.last_modified_time(mtime);
        }

        writer
            .start_file(member_name, options)
            .map_err(|e| AppError::cannot_open(dest, e))?;
        let mut input = File::open(&path)?;
        io::copy(&mut input, &mut writer)?;
        report.files += 1;
    }

    writer.finish().map_err(|e| AppError::cannot_open(dest, e))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::archive::ArchiveContainer;

    fn scratch_source() -> (tempfile::TempDir, PathTree) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::create_dir_all(dir.path().join("blank")).unwrap();
        fs::write(dir.path().join("docs/guide.md"), b"# guide").unwrap();
        fs::write(dir.path().join("docs/notes.txt"), b"notes").unwrap();
        fs::write(dir.path().join("top.txt"), b"top").unwrap();

        let mut selection = PathTree::new(dir.path());
        for marked in ["docs/guide.md", "docs/notes.txt", "top.txt"] {
            selection.add(&dir.path().join(marked)).unwrap();
        }

        (dir, selection)
    }

    #[test]
    fn created_tar_reproduces_the_selected_pathnames() {
        let (dir, selection) = scratch_source();
        let dest = dir.path().join("out.tar");

        let report = create(
            &Container::filesystem(),
            &selection,
            &dest,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(report.files, 3);

        // Reopen through the container and compare the member index.
        let reopened = ArchiveContainer::open(&dest).unwrap();
        assert_eq!(reopened.member_count(), 3);
        for member in ["docs/guide.md", "docs/notes.txt", "top.txt"] {
            assert!(
                reopened.is_enterable(&reopened.path().join("docs")),
                "docs should be implied"
            );
            let listed = reopened.list_children(
                &reopened
                    .path()
                    .join(Path::new(member).parent().unwrap_or(Path::new(""))),
            );
            let name = Path::new(member).file_name().unwrap().to_str().unwrap();
            assert!(listed.iter().any(|n| n == name), "missing member {member}");
        }
    }

    #[test]
    fn created_zip_reproduces_the_selected_pathnames() {
        let (dir, selection) = scratch_source();
        let dest = dir.path().join("out.zip");

        let report = create(
            &Container::filesystem(),
            &selection,
            &dest,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(report.files, 3);

        let reopened = ArchiveContainer::open(&dest).unwrap();
        assert_eq!(reopened.member_count(), 3);
        let mut docs = reopened.list_children(&reopened.path().join("docs"));
        docs.sort();
        assert_eq!(docs, vec!["guide.md", "notes.txt"]);
    }

    #[test]
    fn gzip_tar_destination_is_compressed_and_reopenable() {
        let (dir, selection) = scratch_source();
        let dest = dir.path().join("out.tar.gz");

        create(
            &Container::filesystem(),
            &selection,
            &dest,
            &CancellationToken::new(),
        )
        .unwrap();

        let header = fs::read(&dest).unwrap();
        assert_eq!(&header[..2], &[0x1F, 0x8B]);

        let reopened = ArchiveContainer::open(&dest).unwrap();
        assert_eq!(reopened.member_count(), 3);
    }

    #[test]
    fn selected_directories_are_implied_not_written() {
        let (dir, mut selection) = scratch_source();
        // Whole (empty) directory selected: nothing to stream.
        selection.add(&dir.path().join("blank")).unwrap();

        let dest = dir.path().join("out.tar");
        let report = create(
            &Container::filesystem(),
            &selection,
            &dest,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.files, 3);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn archives_cannot_source_new_archives() {
        let (dir, selection) = scratch_source();
        let inner = dir.path().join("inner.tar");
        create(
            &Container::filesystem(),
            &selection,
            &inner,
            &CancellationToken::new(),
        )
        .unwrap();

        let archive = Container::Archive(ArchiveContainer::open(&inner).unwrap());
        let result = create(
            &archive,
            &selection,
            &dir.path().join("again.tar"),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(AppError::NonFilesystemSource)));
    }

    #[test]
    fn unknown_destination_extension_is_refused() {
        let (dir, selection) = scratch_source();
        let result = create(
            &Container::filesystem(),
            &selection,
            &dir.path().join("out.rar"),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(AppError::UnsupportedFormat(_))));
    }
}
