use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CpioError, IoContext, Result};
use crate::header::{Header, HeaderEncoding, MODE_DIR, MODE_FILE, TRAILER_NAME, pad_len};

const ZEROS: [u8; 4] = [0; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Trailer,
}

impl EntryKind {
    pub fn mode(self) -> u32 {
        match self {
            EntryKind::Directory => MODE_DIR,
            EntryKind::File => MODE_FILE,
            EntryKind::Trailer => 0,
        }
    }
}

/// One item to place in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// `/`-separated path relative to the archive root.
    pub relative_path: String,
    pub kind: EntryKind,
    /// Where the content is read from. Empty for the trailer.
    pub source: PathBuf,
}

impl Entry {
    pub fn trailer() -> Self {
        Entry {
            relative_path: TRAILER_NAME.to_string(),
            kind: EntryKind::Trailer,
            source: PathBuf::new(),
        }
    }

    pub fn namesize(&self) -> u32 {
        // Walker and trailer names are far below u32::MAX.
        (self.relative_path.len() + 1) as u32
    }
}

/// Writes one complete, padded record for `entry`. Returns the header that
/// was written and the record's length on disk.
///
/// File content is read fully into memory before anything is written, so a
/// source that cannot be read leaves `out` untouched for this record.
pub fn encode_entry<W: Write + ?Sized>(
    entry: &Entry,
    encoding: HeaderEncoding,
    out: &mut W,
    out_path: &Path,
) -> Result<(Header, u64)> {
    let content = match entry.kind {
        EntryKind::File => read_content(&entry.source)?,
        EntryKind::Directory | EntryKind::Trailer => Vec::new(),
    };

    let (header, record) =
        encode_record(entry.kind.mode(), &entry.relative_path, &content, encoding);
    out.write_all(&record).at(out_path)?;

    Ok((header, record.len() as u64))
}

/// Header, NUL-terminated name and content, each boundary padded to 4 bytes.
///
/// The header's `namesize` and `filesize` are derived from `name` and
/// `content`; `content` must fit in a u32.
pub(crate) fn encode_record(
    mode: u32,
    name: &str,
    content: &[u8],
    encoding: HeaderEncoding,
) -> (Header, Vec<u8>) {
    let header = Header::new(mode, content.len() as u32, (name.len() + 1) as u32);
    let name_end = encoding.header_len() + name.len() + 1;
    let mut buf = Vec::with_capacity(record_len(encoding, name.len(), content.len()));

    buf.extend_from_slice(&header.encode(encoding));
    buf.extend_from_slice(name.as_bytes());
    buf.push(0);
    buf.extend_from_slice(&ZEROS[..pad_len(name_end)]);

    if !content.is_empty() {
        buf.extend_from_slice(content);
        buf.extend_from_slice(&ZEROS[..pad_len(content.len())]);
    }

    (header, buf)
}

/// Size on disk of a record with the given name and content lengths.
pub fn record_len(encoding: HeaderEncoding, name_len: usize, content_len: usize) -> usize {
    let name_end = encoding.header_len() + name_len + 1;
    name_end + pad_len(name_end) + content_len + pad_len(content_len)
}

fn read_content(path: &Path) -> Result<Vec<u8>> {
    let size = fs::metadata(path).at(path)?.len();
    check_size(path, size)?;

    let content = fs::read(path).at(path)?;
    // The file may have grown since it was stat'ed.
    check_size(path, content.len() as u64)?;
    Ok(content)
}

fn check_size(path: &Path, size: u64) -> Result<()> {
    if u32::try_from(size).is_err() {
        return Err(CpioError::TooLarge {
            path: path.to_path_buf(),
            size,
        });
    }
    Ok(())
}
