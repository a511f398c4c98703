use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use dura::archive::Archive;
use dura::backup::{backup, BackupOptions};
use dura::block::content_digest;
use dura::records::FileType;

const HELLO_SHA1: &str = "8f7d88e901a5ad3a05d8cc0de93313fd76028f8c";

fn new_archive(tmp: &TempDir) -> Archive {
    Archive::create(&tmp.path().join("archive")).unwrap()
}

fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn single_file_backup() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let hello = write_source(&src_dir, "hello", b"hello!");

    let archive = new_archive(&tmp);
    let report = backup(&archive, &[hello.clone()], &BackupOptions::default()).unwrap();
    assert_eq!(report.band_number.to_string(), "0000");
    assert_eq!(report.entries_stored, 1);
    assert_eq!(report.bytes_stored, 6);
    assert_eq!(report.blocks_written, 1);
    assert_eq!(report.skipped, 0);

    // Exact band directory contents.
    let band_dir = archive.path().join("b0000");
    let names: BTreeSet<String> = fs::read_dir(&band_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = ["BAND-HEAD", "BAND-TAIL", "d000000.d", "d000000.i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, expected);

    // The data stream is the file content, verbatim.
    let data = fs::read(band_dir.join("d000000.d")).unwrap();
    assert_eq!(data, b"hello!");

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    let head = band.read_head().unwrap();
    assert_eq!(head.band_number, "0000");
    let tail = band.read_tail().unwrap();
    assert_eq!(tail.block_count, 1);

    let index = band.read_block_index(0).unwrap();
    assert_eq!(index.data_length, 6);
    assert_eq!(hex::encode(index.data_sha1), HELLO_SHA1);
    assert_eq!(index.files.len(), 1);
    let entry = &index.files[0];
    assert_eq!(entry.path, hello.to_string_lossy());
    assert_eq!(entry.file_type, FileType::Regular);
    assert_eq!(entry.data_length, 6);
    assert_eq!(entry.data_offset, Some(0));
    assert_eq!(hex::encode(entry.data_sha1.unwrap()), HELLO_SHA1);
}

#[test]
fn three_successive_bands() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let source = write_source(&src_dir, "file", b"contents");

    let archive = new_archive(&tmp);
    for _ in 0..3 {
        backup(&archive, &[source.clone()], &BackupOptions::default()).unwrap();
    }

    let names: Vec<String> = archive
        .list_bands()
        .unwrap()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, vec!["0000", "0001", "0002"]);
    assert_eq!(archive.last_band().unwrap().unwrap().to_string(), "0002");

    for number in archive.list_bands().unwrap() {
        let band = archive.open_band_reader(&number).unwrap();
        assert!(band.is_finished());
        assert_eq!(band.list_block_indexes().unwrap(), vec![0]);
    }
}

#[test]
fn block_rotation_at_twenty_entries() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();

    // 45 one-byte files with distinct contents, in submission order.
    let mut sources = Vec::new();
    let mut concatenated = Vec::new();
    for i in 0u8..45 {
        sources.push(write_source(&src_dir, &format!("f{i:02}"), &[i]));
        concatenated.push(i);
    }

    let archive = new_archive(&tmp);
    let report = backup(&archive, &sources, &BackupOptions::default()).unwrap();
    assert_eq!(report.entries_stored, 45);
    assert_eq!(report.blocks_written, 3);

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    assert_eq!(band.read_tail().unwrap().block_count, 3);
    assert_eq!(band.list_block_indexes().unwrap(), vec![0, 1, 2]);

    let mut replayed = Vec::new();
    for (block, expected_entries) in [(0u32, 20usize), (1, 20), (2, 5)] {
        let index = band.read_block_index(block).unwrap();
        assert_eq!(index.files.len(), expected_entries);
        assert_eq!(index.data_length, expected_entries as i64);
        replayed.extend(band.block_reader(block).read_data().unwrap());
    }
    assert_eq!(replayed, concatenated);
}

#[test]
fn rotation_threshold_is_configurable() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let sources: Vec<PathBuf> = (0u8..7)
        .map(|i| write_source(&src_dir, &format!("f{i}"), &[i]))
        .collect();

    let archive = new_archive(&tmp);
    let opts = BackupOptions { files_per_block: 3 };
    let report = backup(&archive, &sources, &opts).unwrap();
    assert_eq!(report.blocks_written, 3); // 3 + 3 + 1

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    assert_eq!(band.read_tail().unwrap().block_count, 3);
}

#[test]
fn exact_multiple_leaves_no_empty_trailing_block() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let sources: Vec<PathBuf> = (0u8..6)
        .map(|i| write_source(&src_dir, &format!("f{i}"), &[i]))
        .collect();

    let archive = new_archive(&tmp);
    let opts = BackupOptions { files_per_block: 3 };
    let report = backup(&archive, &sources, &opts).unwrap();
    assert_eq!(report.blocks_written, 2);

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    assert_eq!(band.read_tail().unwrap().block_count, 2);
    assert_eq!(band.list_block_indexes().unwrap(), vec![0, 1]);
}

#[test]
fn empty_files_and_directories_record_no_offsets() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let empty = write_source(&src_dir, "empty", b"");
    let subdir = src_dir.join("sub");
    fs::create_dir(&subdir).unwrap();
    let full = write_source(&src_dir, "full", b"ab");

    let archive = new_archive(&tmp);
    backup(
        &archive,
        &[empty, subdir, full],
        &BackupOptions::default(),
    )
    .unwrap();

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    let index = band.read_block_index(0).unwrap();
    assert_eq!(index.files.len(), 3);

    let (e_empty, e_dir, e_full) = (&index.files[0], &index.files[1], &index.files[2]);
    assert_eq!(e_empty.file_type, FileType::Regular);
    assert_eq!(e_empty.data_length, 0);
    assert_eq!(e_empty.data_offset, None);
    assert_eq!(e_empty.data_sha1, None);

    assert_eq!(e_dir.file_type, FileType::Directory);
    assert_eq!(e_dir.data_length, 0);
    assert_eq!(e_dir.data_offset, None);

    // The first entry with content starts at offset 0 regardless of what
    // came before it.
    assert_eq!(e_full.file_type, FileType::Regular);
    assert_eq!(e_full.data_length, 2);
    assert_eq!(e_full.data_offset, Some(0));
    assert_eq!(index.data_length, 2);
}

#[cfg(unix)]
#[test]
fn symlinks_store_their_target_text() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let link = src_dir.join("link");
    std::os::unix::fs::symlink("target", &link).unwrap();

    let archive = new_archive(&tmp);
    let report = backup(&archive, &[link], &BackupOptions::default()).unwrap();
    assert_eq!(report.entries_stored, 1);

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    let index = band.read_block_index(0).unwrap();
    let entry = &index.files[0];
    assert_eq!(entry.file_type, FileType::Symlink);
    assert_eq!(entry.data_length, 6);
    let data = band.block_reader(0).read_data().unwrap();
    assert_eq!(data, b"target");
}

#[test]
fn offsets_are_contiguous_and_digests_hold() {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    fs::create_dir(&src_dir).unwrap();
    let contents: [&[u8]; 5] = [b"one", b"", b"twotwo", b"3", b"fourfourfour"];
    let sources: Vec<PathBuf> = contents
        .iter()
        .enumerate()
        .map(|(i, c)| write_source(&src_dir, &format!("f{i}"), c))
        .collect();

    let archive = new_archive(&tmp);
    backup(&archive, &sources, &BackupOptions::default()).unwrap();

    let band = archive
        .open_band_reader(&"0000".parse().unwrap())
        .unwrap();
    let index = band.read_block_index(0).unwrap();
    let data = band.block_reader(0).read_data().unwrap();

    assert_eq!(content_digest(&data), index.data_sha1);
    assert_eq!(data.len() as i64, index.data_length);

    let mut expected_offset = 0i64;
    for entry in index.files.iter().filter(|e| e.data_length > 0) {
        assert_eq!(entry.data_offset, Some(expected_offset), "{}", entry.path);
        let start = expected_offset as usize;
        let end = start + entry.data_length as usize;
        assert_eq!(content_digest(&data[start..end]), entry.data_sha1.unwrap());
        expected_offset += entry.data_length;
    }
    assert_eq!(expected_offset, index.data_length);
}
