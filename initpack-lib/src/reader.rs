use std::io::{ErrorKind, Read};
use std::path::PathBuf;

use crate::error::{CpioError, Result};
use crate::header::{HeaderEncoding, MAGIC, NEWC_MAGIC, TRAILER_NAME, pad_len};

/// One parsed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub mode: u32,
    pub nlink: u32,
    pub filesize: u32,
    pub namesize: u32,
    pub data: Vec<u8>,
}

impl Record {
    pub fn is_trailer(&self) -> bool {
        self.name == TRAILER_NAME
    }
}

/// Reads records back from an archive, up to and including the trailer.
///
/// Every header, name and content segment is consumed together with its
/// alignment padding, so each read starts exactly where the previous record
/// ended. Running out of input before the trailer is an error.
pub struct RecordReader<R: Read> {
    inner: R,
    encoding: HeaderEncoding,
    label: PathBuf,
    offset: u64,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R, encoding: HeaderEncoding) -> Self {
        RecordReader {
            inner,
            encoding,
            label: PathBuf::from("<archive>"),
            offset: 0,
            done: false,
        }
    }

    /// Names the source in error messages.
    pub fn with_label(mut self, label: impl Into<PathBuf>) -> Self {
        self.label = label.into();
        self
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_bytes(&mut self, len: usize, what: &str) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                CpioError::Malformed(format!("truncated {what} at offset {}", self.offset))
            } else {
                CpioError::Io {
                    path: self.label.clone(),
                    source: e,
                }
            }
        })?;
        self.offset += len as u64;
        Ok(buf)
    }

    fn skip_padding(&mut self, len: usize) -> Result<()> {
        let pad = self.read_bytes(pad_len(len), "padding")?;
        if pad.iter().any(|b| *b != 0) {
            return Err(CpioError::Malformed(format!(
                "non-zero padding before offset {}",
                self.offset
            )));
        }
        Ok(())
    }

    fn read_record(&mut self) -> Result<Record> {
        let start = self.offset;
        let header_len = self.encoding.header_len();
        let raw = self.read_bytes(header_len, "header")?;
        let fields = decode_fields(&raw, self.encoding)
            .ok_or_else(|| CpioError::Malformed(format!("bad header at offset {start}")))?;

        let [magic, _ino, mode, _uid, _gid, nlink, _mtime, filesize, _, _, _, _, namesize, _check] =
            fields;
        if magic != MAGIC {
            return Err(CpioError::Malformed(format!(
                "bad magic {magic:#x} at offset {start}"
            )));
        }
        if namesize == 0 {
            return Err(CpioError::Malformed(format!("empty name at offset {start}")));
        }

        let mut name = self.read_bytes(namesize as usize, "name")?;
        if name.pop() != Some(0) {
            return Err(CpioError::Malformed(format!(
                "name not NUL-terminated at offset {start}"
            )));
        }
        let name = String::from_utf8(name)
            .map_err(|_| CpioError::Malformed(format!("name is not UTF-8 at offset {start}")))?;
        self.skip_padding(header_len + namesize as usize)?;

        let data = self.read_bytes(filesize as usize, "content")?;
        self.skip_padding(filesize as usize)?;

        Ok(Record {
            name,
            mode,
            nlink,
            filesize,
            namesize,
            data,
        })
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let record = self.read_record();
        match &record {
            Ok(r) => self.done = r.is_trailer(),
            Err(_) => self.done = true,
        }
        Some(record)
    }
}

/// Splits a raw header into its 14 fields, magic first.
fn decode_fields(raw: &[u8], encoding: HeaderEncoding) -> Option<[u32; 14]> {
    let mut fields = [0u32; 14];
    match encoding {
        HeaderEncoding::Binary => {
            for (field, chunk) in fields.iter_mut().zip(raw.chunks_exact(4)) {
                *field = u32::from_le_bytes(chunk.try_into().ok()?);
            }
        }
        HeaderEncoding::Newc => {
            if &raw[..6] != NEWC_MAGIC {
                return None;
            }
            fields[0] = MAGIC;
            for (field, chunk) in fields[1..].iter_mut().zip(raw[6..].chunks_exact(8)) {
                let digits = std::str::from_utf8(chunk).ok()?;
                *field = u32::from_str_radix(digits, 16).ok()?;
            }
        }
    }
    Some(fields)
}
