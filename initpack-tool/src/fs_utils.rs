use anyhow::{Context, Result};
use initpack_lib::header::TRAILER_NAME;
use initpack_lib::{EntryKind, HeaderEncoding, TreeWalker, record_len};
use std::{fs, path::Path};

/// What a dry run reports for one entry.
#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// Walks `input` in archive order and stats every file.
pub fn list_entries(input: &Path) -> Result<Vec<PlannedEntry>> {
    let walker = TreeWalker::new(input)?;
    let mut result = Vec::new();

    for entry in walker {
        let entry = entry?;
        let size = match entry.kind {
            EntryKind::File => fs::metadata(&entry.source)
                .with_context(|| format!("reading metadata of {:?}", entry.source))?
                .len(),
            _ => 0,
        };
        result.push(PlannedEntry {
            name: entry.relative_path,
            kind: entry.kind,
            size,
        });
    }

    Ok(result)
}

/// Bytes the archive for `entries` would occupy, trailer included.
pub fn archive_size(entries: &[PlannedEntry], encoding: HeaderEncoding) -> u64 {
    let body: u64 = entries
        .iter()
        .map(|e| record_len(encoding, e.name.len(), e.size as usize) as u64)
        .sum();
    body + record_len(encoding, TRAILER_NAME.len(), 0) as u64
}

/// Convert bytes into a human-friendly string using binary (KiB, MiB, GiB...) units.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if (size * 10.0) % 10.0 == 0.0 {
        format!("{:.0} {}", size, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
