use anyhow::{Context, Result, bail};
use initpack_lib::{ArchiveSummary, Config, EntryKind, HeaderEncoding, RecordReader, build_archive};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::fs_utils::{archive_size, encode_size, list_entries};

pub fn run(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let encoding = config.encoding.unwrap_or_default();
    info!(
        input = %input.display(),
        output = %output.display(),
        %encoding,
        "packing"
    );

    if config.dry == Some(true) {
        return dry_run(input, output, encoding);
    }

    let summary = build_archive(input, output, encoding)
        .with_context(|| format!("creating archive {}", output.display()))?;
    println!("Created CPIO archive: {}", output.display());

    if config.verify == Some(true) {
        let records = verify_archive(output, encoding, &summary)?;
        info!(records, "archive verified");
        println!("Verified {records} records");
    }

    Ok(())
}

fn dry_run(input: &Path, output: &Path, encoding: HeaderEncoding) -> Result<()> {
    let entries = list_entries(input)?;

    println!("--- DRY RUN ---");
    for e in &entries {
        match e.kind {
            EntryKind::Directory => println!("  dir   {}/", e.name),
            _ => println!("  file  {} ({})", e.name, encode_size(e.size)),
        }
    }

    let dirs = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Directory)
        .count();
    let content: u64 = entries.iter().map(|e| e.size).sum();
    println!("Directories: {}", dirs);
    println!("Files: {}", entries.len() - dirs);
    println!("Content size: {}", encode_size(content));
    println!(
        "Would write {} ({} bytes, {} header) to {}",
        encode_size(archive_size(&entries, encoding)),
        archive_size(&entries, encoding),
        encoding,
        output.display()
    );
    Ok(())
}

/// Reads `path` back and checks it holds exactly the records just written.
fn verify_archive(path: &Path, encoding: HeaderEncoding, expected: &ArchiveSummary) -> Result<u64> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = RecordReader::new(BufReader::new(file), encoding).with_label(path);

    let mut records = 0u64;
    let mut saw_trailer = false;
    for record in reader {
        let record = record.with_context(|| format!("verifying {}", path.display()))?;
        records += 1;
        saw_trailer = record.is_trailer();
    }

    if !saw_trailer {
        bail!("{} does not end with a trailer record", path.display());
    }
    if records != expected.records() {
        bail!(
            "{} holds {records} records, expected {}",
            path.display(),
            expected.records()
        );
    }
    Ok(records)
}
