//! ``src/container/format.rs``
//! ============================================================================
//! # `ArchiveFormat`: Format Registry and Entry-Name Normalization
//!
//! Tagged registry of the supported archive formats. Opening goes by
//! content sniff (magic bytes, never the filename); creation goes by the
//! destination extension. Entry pathnames from either format pass through
//! one normalization gate before they reach a tree or the filesystem.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Compression codec wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
}

/// A supported archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar(TarCompression),
    Zip,
}

impl ArchiveFormat {
    /// Identify a format from the first bytes of a stream.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data {
            [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] => Some(Self::Zip),
            [0x1F, 0x8B, ..] => Some(Self::Tar(TarCompression::Gzip)),
            _ => {
                if is_tar_header(data) {
                    Some(Self::Tar(TarCompression::None))
                } else {
                    None
                }
            }
        }
    }

    /// Sniff a file on disk by reading its header block.
    pub fn sniff_file(path: &Path) -> io::Result<Option<Self>> {
        let file = File::open(path)?;
        let mut header = Vec::with_capacity(512);
        file.take(512).read_to_end(&mut header)?;
        Ok(Self::sniff(&header))
    }

    /// Format for a new archive, chosen from the destination filename.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::Tar(TarCompression::Gzip))
        } else if name.ends_with(".tar") {
            Some(Self::Tar(TarCompression::None))
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tar(TarCompression::None) => "tar",
            Self::Tar(TarCompression::Gzip) => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

/// Both POSIX ("ustar\0") and GNU ("ustar ") magic at offset 257.
fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 262 && &data[257..262] == b"ustar"
}

/// Normalize one archive entry pathname into a clean relative path.
///
/// Separators are unified, a trailing separator is stripped, and empty or
/// `.` segments vanish. Returns `None` — the entry must be skipped — for
/// names that are empty after cleaning, start with a separator, or
/// contain a `..` segment; such names can escape the extraction root.
#[must_use]
pub fn normalize_entry_name(raw: &str) -> Option<PathBuf> {
    let name = raw.replace('\\', "/");

    if name.starts_with('/') {
        return None;
    }

    let mut segments = Vec::new();
    for seg in name.split('/') {
        match seg {
            "" | "." => {}
            ".." => return None,
            seg => segments.push(seg),
        }
    }

    if segments.is_empty() {
        return None;
    }

    Some(segments.iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_zip_magic() {
        let header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00];
        assert_eq!(ArchiveFormat::sniff(&header), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn sniff_gzip_magic() {
        let header = [0x1F, 0x8B, 0x08, 0x00];
        assert_eq!(
            ArchiveFormat::sniff(&header),
            Some(ArchiveFormat::Tar(TarCompression::Gzip))
        );
    }

    #[test]
    fn sniff_plain_tar_magic() {
        let mut header = [0u8; 512];
        header[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(
            ArchiveFormat::sniff(&header),
            Some(ArchiveFormat::Tar(TarCompression::None))
        );
    }

    #[test]
    fn sniff_unknown_bytes() {
        let header = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(ArchiveFormat::sniff(&header), None);
    }

    #[test]
    fn sniff_truncated_tar_header() {
        let header = [0u8; 256];
        assert_eq!(ArchiveFormat::sniff(&header), None);
    }

    #[test]
    fn creation_format_from_extension() {
        assert_eq!(
            ArchiveFormat::from_extension(Path::new("/out/backup.tar")),
            Some(ArchiveFormat::Tar(TarCompression::None))
        );
        assert_eq!(
            ArchiveFormat::from_extension(Path::new("/out/backup.tar.gz")),
            Some(ArchiveFormat::Tar(TarCompression::Gzip))
        );
        assert_eq!(
            ArchiveFormat::from_extension(Path::new("/out/backup.TGZ")),
            Some(ArchiveFormat::Tar(TarCompression::Gzip))
        );
        assert_eq!(
            ArchiveFormat::from_extension(Path::new("/out/backup.zip")),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(ArchiveFormat::from_extension(Path::new("/out/backup.rar")), None);
    }

    #[test]
    fn entry_names_are_cleaned() {
        assert_eq!(
            normalize_entry_name("dir/sub/file.txt"),
            Some(PathBuf::from("dir/sub/file.txt"))
        );
        assert_eq!(normalize_entry_name("dir/"), Some(PathBuf::from("dir")));
        assert_eq!(
            normalize_entry_name("./dir//file"),
            Some(PathBuf::from("dir/file"))
        );
        assert_eq!(
            normalize_entry_name("win\\style\\name"),
            Some(PathBuf::from("win/style/name"))
        );
    }

    #[test]
    fn escaping_entry_names_are_rejected() {
        assert_eq!(normalize_entry_name("/etc/passwd"), None);
        assert_eq!(normalize_entry_name("../outside"), None);
        assert_eq!(normalize_entry_name("dir/../../outside"), None);
        assert_eq!(normalize_entry_name(""), None);
        assert_eq!(normalize_entry_name("."), None);
    }
}
