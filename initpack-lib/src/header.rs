use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Record magic, `070701` read as a hex literal.
pub const MAGIC: u32 = 0x070701;
/// Magic as written by the `newc` codec.
pub const NEWC_MAGIC: &[u8; 6] = b"070701";

/// Directory, rwxr-xr-x.
pub const MODE_DIR: u32 = 0o040755;
/// Regular file, rw-r--r--.
pub const MODE_FILE: u32 = 0o100644;

pub const TRAILER_NAME: &str = "TRAILER!!!";

/// Magic plus 13 fields, each a little-endian u32.
pub const BINARY_HEADER_LEN: usize = 14 * 4;
/// 6 magic bytes plus 13 fields of 8 hex digits.
pub const NEWC_HEADER_LEN: usize = 6 + 13 * 8;

const ALIGNMENT: usize = 4;

/// Rounds `n` up to the next multiple of four.
pub fn align(n: usize) -> usize {
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Number of zero bytes needed after `n` bytes to reach a 4-byte boundary.
pub fn pad_len(n: usize) -> usize {
    align(n) - n
}

/// How the numeric header fields are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderEncoding {
    /// Raw little-endian u32 fields, as consumed by the existing loader.
    #[default]
    #[serde(alias = "bin")]
    Binary,
    /// Standard ASCII `newc`: 8 uppercase hex digits per field.
    #[serde(alias = "ascii")]
    Newc,
}

impl HeaderEncoding {
    pub fn header_len(self) -> usize {
        match self {
            HeaderEncoding::Binary => BINARY_HEADER_LEN,
            HeaderEncoding::Newc => NEWC_HEADER_LEN,
        }
    }
}

impl FromStr for HeaderEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(HeaderEncoding::Binary),
            "newc" | "ascii" => Ok(HeaderEncoding::Newc),
            other => Err(format!("unknown header encoding '{other}' (expected binary or newc)")),
        }
    }
}

impl fmt::Display for HeaderEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderEncoding::Binary => f.write_str("binary"),
            HeaderEncoding::Newc => f.write_str("newc"),
        }
    }
}

/// One record header. Built once per entry and encoded immediately.
///
/// Ownership, timestamps and device numbers are always zero and `nlink` is
/// always one, so two runs over the same tree produce identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub mode: u32,
    pub filesize: u32,
    pub namesize: u32,
}

impl Header {
    pub fn new(mode: u32, filesize: u32, namesize: u32) -> Self {
        Header {
            mode,
            filesize,
            namesize,
        }
    }

    /// Fields in on-disk order, magic first.
    ///
    /// magic, ino, mode, uid, gid, nlink, mtime, filesize,
    /// devmajor, devminor, rdevmajor, rdevminor, namesize, check
    pub fn fields(&self) -> [u32; 14] {
        [
            MAGIC,
            0,
            self.mode,
            0,
            0,
            1,
            0,
            self.filesize,
            0,
            0,
            0,
            0,
            self.namesize,
            0,
        ]
    }

    pub fn encode(&self, encoding: HeaderEncoding) -> Vec<u8> {
        let fields = self.fields();
        let mut buf = Vec::with_capacity(encoding.header_len());
        match encoding {
            HeaderEncoding::Binary => {
                for v in fields {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            HeaderEncoding::Newc => {
                buf.extend_from_slice(NEWC_MAGIC);
                for v in &fields[1..] {
                    buf.extend_from_slice(format!("{v:08X}").as_bytes());
                }
            }
        }
        debug_assert_eq!(buf.len(), encoding.header_len());
        buf
    }
}
