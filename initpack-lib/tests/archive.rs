use std::fs;
use std::path::Path;

use initpack_lib::header::{MODE_DIR, MODE_FILE, TRAILER_NAME, align};
use initpack_lib::{HeaderEncoding, Record, RecordReader, build_archive, write_archive};
use tempfile::TempDir;

fn read_all(bytes: &[u8], encoding: HeaderEncoding) -> Vec<Record> {
    RecordReader::new(bytes, encoding)
        .collect::<initpack_lib::Result<Vec<_>>>()
        .unwrap()
}

fn sample_tree(root: &Path) {
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("etc/init.d")).unwrap();
    fs::create_dir_all(root.join("dev")).unwrap();
    fs::write(root.join("init"), "#!/bin/sh\nexec /bin/sh\n").unwrap();
    fs::write(root.join("bin/sh"), vec![0x7f, b'E', b'L', b'F', 2, 1, 1]).unwrap();
    fs::write(root.join("etc/hostname"), "initpack").unwrap();
    fs::write(root.join("etc/init.d/rcS"), "").unwrap();
}

#[test]
fn single_file_scenario() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "hi").unwrap();

    let (bytes, _) =
        write_archive(temp.path(), Vec::new(), Path::new("mem"), HeaderEncoding::Binary).unwrap();
    let records = read_all(&bytes, HeaderEncoding::Binary);

    assert_eq!(records.len(), 2);
    let file = &records[0];
    assert_eq!(file.name, "a.txt");
    assert_eq!(file.mode, 0o100644);
    assert_eq!(file.filesize, 2);
    assert_eq!(file.namesize, 6);
    assert_eq!(file.data, b"hi");
    assert!(records[1].is_trailer());

    // header, "a.txt\0" padded to 8, "hi" padded to 4
    assert_eq!(&bytes[56..64], b"a.txt\0\0\0");
    assert_eq!(&bytes[64..68], b"hi\0\0");
}

#[test]
fn record_count_is_entries_plus_trailer() {
    let temp = TempDir::new().unwrap();
    sample_tree(temp.path());

    for encoding in [HeaderEncoding::Binary, HeaderEncoding::Newc] {
        let (bytes, summary) =
            write_archive(temp.path(), Vec::new(), Path::new("mem"), encoding).unwrap();
        let records = read_all(&bytes, encoding);

        // bin, dev, etc, etc/init.d; init, bin/sh, etc/hostname, etc/init.d/rcS
        assert_eq!(summary.directories, 4);
        assert_eq!(summary.files, 4);
        assert_eq!(records.len(), 4 + 4 + 1);
        assert_eq!(records.len() as u64, summary.records());
    }
}

#[test]
fn every_record_is_aligned_and_self_describing() {
    let temp = TempDir::new().unwrap();
    sample_tree(temp.path());

    for encoding in [HeaderEncoding::Binary, HeaderEncoding::Newc] {
        let (bytes, _) = write_archive(temp.path(), Vec::new(), Path::new("mem"), encoding).unwrap();
        let records = read_all(&bytes, encoding);

        let consumed: usize = records
            .iter()
            .map(|r| {
                align(encoding.header_len() + r.namesize as usize) + align(r.filesize as usize)
            })
            .sum();
        assert_eq!(consumed, bytes.len());
        assert_eq!(bytes.len() % 4, 0);

        for r in &records {
            assert_eq!(r.namesize as usize, r.name.len() + 1);
            match r.mode {
                MODE_DIR => assert_eq!(r.filesize, 0),
                MODE_FILE => assert_eq!(r.filesize as usize, r.data.len()),
                0 => assert_eq!(r.name, TRAILER_NAME),
                other => panic!("unexpected mode {other:o}"),
            }
        }
    }
}

#[test]
fn trailer_is_last_with_zero_mode_and_size() {
    let temp = TempDir::new().unwrap();
    sample_tree(temp.path());

    let (bytes, _) =
        write_archive(temp.path(), Vec::new(), Path::new("mem"), HeaderEncoding::Binary).unwrap();
    let records = read_all(&bytes, HeaderEncoding::Binary);
    let last = records.last().unwrap();

    assert!(last.is_trailer());
    assert_eq!(last.mode, 0);
    assert_eq!(last.filesize, 0);
    assert_eq!(last.namesize, 11);
    assert_eq!(records.iter().filter(|r| r.is_trailer()).count(), 1);
}

#[test]
fn empty_directory_has_only_trailer() {
    let temp = TempDir::new().unwrap();
    let (bytes, _) =
        write_archive(temp.path(), Vec::new(), Path::new("mem"), HeaderEncoding::Binary).unwrap();
    let records = read_all(&bytes, HeaderEncoding::Binary);

    assert_eq!(records.len(), 1);
    assert!(records[0].is_trailer());
}

#[test]
fn rebuilding_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir(&root).unwrap();
    sample_tree(&root);

    let first = temp.path().join("first.cpio");
    let second = temp.path().join("second.cpio");
    build_archive(&root, &first, HeaderEncoding::Binary).unwrap();
    build_archive(&root, &second, HeaderEncoding::Binary).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn names_are_relative_with_forward_slashes() {
    let temp = TempDir::new().unwrap();
    sample_tree(temp.path());

    let (bytes, _) =
        write_archive(temp.path(), Vec::new(), Path::new("mem"), HeaderEncoding::Newc).unwrap();
    let names: Vec<String> = read_all(&bytes, HeaderEncoding::Newc)
        .into_iter()
        .map(|r| r.name)
        .collect();

    assert_eq!(
        names,
        vec![
            "bin",
            "dev",
            "etc",
            "init",
            "bin/sh",
            "etc/init.d",
            "etc/hostname",
            "etc/init.d/rcS",
            "TRAILER!!!",
        ]
    );
}
