//! Packs a directory tree into a single cpio archive for use as an initramfs.
//!
//! The pipeline is one-way: [`TreeWalker`] enumerates entries,
//! [`encode_entry`] turns each into a padded record, and [`CpioWriter`]
//! sequences the records and terminates the archive with the
//! `TRAILER!!!` record. [`RecordReader`] parses archives back.

use serde::{Deserialize, Serialize};

pub mod entry;
pub mod error;
pub mod header;
pub mod reader;
pub mod walker;
pub mod writer;

pub use entry::{Entry, EntryKind, encode_entry, record_len};
pub use error::{CpioError, Result};
pub use header::{Header, HeaderEncoding};
pub use reader::{Record, RecordReader};
pub use walker::TreeWalker;
pub use writer::{ArchiveSummary, CpioWriter, build_archive, write_archive};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub input: Option<String>,
    pub output: Option<String>,
    pub config: Option<String>,
    pub encoding: Option<HeaderEncoding>,
    pub dry: Option<bool>,
    pub verify: Option<bool>,
    pub verbose: Option<bool>,
}
