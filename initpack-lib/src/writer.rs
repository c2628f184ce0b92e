use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::entry::{Entry, EntryKind, encode_entry};
use crate::error::{IoContext, Result};
use crate::header::HeaderEncoding;
use crate::walker::TreeWalker;

/// Counts gathered while an archive is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub directories: u64,
    pub files: u64,
    /// Sum of file sizes, without padding.
    pub content_bytes: u64,
    /// Total bytes written, trailer included.
    pub archive_bytes: u64,
}

impl ArchiveSummary {
    /// Records in the archive, trailer included.
    pub fn records(&self) -> u64 {
        self.directories + self.files + 1
    }
}

/// Appends records to a sink and terminates the archive.
///
/// `finish` consumes the writer, so nothing can be appended after the
/// trailer.
pub struct CpioWriter<W: Write> {
    out: W,
    out_path: PathBuf,
    encoding: HeaderEncoding,
    summary: ArchiveSummary,
}

impl<W: Write> CpioWriter<W> {
    /// `out_path` is only used to label errors.
    pub fn new(out: W, out_path: impl Into<PathBuf>, encoding: HeaderEncoding) -> Self {
        CpioWriter {
            out,
            out_path: out_path.into(),
            encoding,
            summary: ArchiveSummary::default(),
        }
    }

    pub fn append(&mut self, entry: &Entry) -> Result<()> {
        let (header, written) = encode_entry(entry, self.encoding, &mut self.out, &self.out_path)?;
        debug!(
            name = %entry.relative_path,
            mode = %format!("{:o}", header.mode),
            size = header.filesize,
            "wrote record"
        );

        match entry.kind {
            EntryKind::Directory => self.summary.directories += 1,
            EntryKind::File => self.summary.files += 1,
            EntryKind::Trailer => {}
        }
        self.summary.content_bytes += u64::from(header.filesize);
        self.summary.archive_bytes += written;
        Ok(())
    }

    /// Writes the trailer, flushes, and hands the sink back.
    pub fn finish(mut self) -> Result<(W, ArchiveSummary)> {
        self.append(&Entry::trailer())?;
        self.out.flush().at(&self.out_path)?;
        Ok((self.out, self.summary))
    }
}

/// Writes every entry under `root` followed by the trailer into `out`.
pub fn write_archive<W: Write>(
    root: &Path,
    out: W,
    out_path: &Path,
    encoding: HeaderEncoding,
) -> Result<(W, ArchiveSummary)> {
    let walker = TreeWalker::new(root)?;
    let mut writer = CpioWriter::new(out, out_path, encoding);
    for entry in walker {
        writer.append(&entry?)?;
    }
    writer.finish()
}

/// Builds a complete archive of `root` at `output`, replacing any existing
/// file.
///
/// The root is checked before `output` is touched. A failure after that
/// leaves a truncated archive behind.
pub fn build_archive(
    root: &Path,
    output: &Path,
    encoding: HeaderEncoding,
) -> Result<ArchiveSummary> {
    let walker = TreeWalker::new(root)?;

    let file = File::create(output).at(output)?;
    let mut writer = CpioWriter::new(BufWriter::new(file), output, encoding);
    for entry in walker {
        writer.append(&entry?)?;
    }
    let (out, summary) = writer.finish()?;
    out.into_inner().map_err(|e| e.into_error()).at(output)?;

    info!(
        output = %output.display(),
        records = summary.records(),
        bytes = summary.archive_bytes,
        "archive complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CpioError;
    use crate::header::{BINARY_HEADER_LEN, TRAILER_NAME};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_directory_is_only_a_trailer() {
        let temp = TempDir::new().unwrap();
        let (bytes, summary) =
            write_archive(temp.path(), Vec::new(), Path::new("mem"), HeaderEncoding::Binary)
                .unwrap();

        assert_eq!(summary.records(), 1);
        // 56 + 11 = 67, padded to 68
        assert_eq!(bytes.len(), 68);
        assert_eq!(summary.archive_bytes, 68);
        assert_eq!(&bytes[BINARY_HEADER_LEN..BINARY_HEADER_LEN + 11], b"TRAILER!!!\0");
        assert_eq!(TRAILER_NAME.len() + 1, 11);
    }

    #[test]
    fn summary_counts_entries() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/one"), "12345").unwrap();
        fs::write(root.join("two"), "xy").unwrap();

        let (bytes, summary) =
            write_archive(root, Vec::new(), Path::new("mem"), HeaderEncoding::Newc).unwrap();

        assert_eq!(summary.directories, 2);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.content_bytes, 7);
        assert_eq!(summary.archive_bytes, bytes.len() as u64);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn build_replaces_existing_output() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir(&root).unwrap();
        let output = temp.path().join("initramfs.cpio");
        fs::write(&output, vec![0xAA; 4096]).unwrap();

        let summary = build_archive(&root, &output, HeaderEncoding::Binary).unwrap();

        assert_eq!(fs::metadata(&output).unwrap().len(), summary.archive_bytes);
        assert_eq!(summary.archive_bytes, 68);
    }

    #[test]
    fn missing_root_leaves_output_untouched() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.cpio");

        let err = build_archive(&temp.path().join("missing"), &output, HeaderEncoding::Binary)
            .unwrap_err();

        assert!(matches!(err, CpioError::NotFound(_)));
        assert!(!output.exists());
    }

    #[test]
    fn unwritable_output_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("no/such/dir/out.cpio");

        let err = build_archive(temp.path(), &output, HeaderEncoding::Binary).unwrap_err();
        assert!(matches!(err, CpioError::Io { .. }));
    }
}
