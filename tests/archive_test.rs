use std::fs;

use tempfile::TempDir;

use dura::archive::{Archive, ARCHIVE_HEADER_NAME};
use dura::error::Error;
use dura::ioutil::write_record;
use dura::records::ArchiveHeader;

#[test]
fn create_and_reopen_archive() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("testarchive");

    let archive = Archive::create(&path).unwrap();
    assert_eq!(archive.path(), path.as_path());
    assert!(path.is_dir());

    let header = path.join(ARCHIVE_HEADER_NAME);
    assert!(header.is_file());
    assert!(fs::metadata(&header).unwrap().len() > 0);

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.path(), path.as_path());
    assert!(reopened.list_bands().unwrap().is_empty());
    assert!(reopened.last_band().unwrap().is_none());
}

#[test]
fn create_refuses_existing_directory() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a");
    Archive::create(&path).unwrap();
    let err = Archive::create(&path).unwrap_err();
    assert!(matches!(err, Error::ArchiveExists { .. }), "{err}");
}

#[test]
fn open_missing_archive() {
    let tmp = TempDir::new().unwrap();
    let err = Archive::open(&tmp.path().join("nowhere")).unwrap_err();
    assert!(matches!(err, Error::NoSuchArchive { .. }), "{err}");
}

#[test]
fn open_rejects_garbage_header() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a");
    Archive::create(&path).unwrap();

    fs::write(path.join(ARCHIVE_HEADER_NAME), b"not this!").unwrap();
    let err = Archive::open(&path).unwrap_err();
    assert!(matches!(err, Error::BadArchiveHeader { .. }), "{err}");
    // The message names the header file so the user can go look at it.
    assert!(err.to_string().contains(ARCHIVE_HEADER_NAME), "{err}");
}

#[test]
fn open_rejects_wrong_magic() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a");
    Archive::create(&path).unwrap();

    let forged = ArchiveHeader {
        magic: "some other format".to_owned(),
    };
    write_record(&forged, &path.join(ARCHIVE_HEADER_NAME)).unwrap();
    let err = Archive::open(&path).unwrap_err();
    assert!(matches!(err, Error::BadArchiveHeader { .. }), "{err}");
}

#[test]
fn band_numbers_allocate_densely() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a");
    let archive = Archive::create(&path).unwrap();

    for i in 0..4 {
        let writer = archive.create_band().unwrap();
        assert_eq!(writer.number().to_string(), format!("{i:04}"));
        writer.start_band().unwrap().finish_band().unwrap();
    }

    let names: Vec<String> = archive
        .list_bands()
        .unwrap()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, vec!["0000", "0001", "0002", "0003"]);
    assert_eq!(archive.last_band().unwrap().unwrap().to_string(), "0003");
}

#[test]
fn unfinished_band_still_reserves_its_number() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a");
    let archive = Archive::create(&path).unwrap();

    archive
        .create_band()
        .unwrap()
        .start_band()
        .unwrap()
        .finish_band()
        .unwrap();
    // Started but never finished, as after a crash.
    let _open = archive.create_band().unwrap().start_band().unwrap();

    let next = archive.create_band().unwrap();
    assert_eq!(next.number().to_string(), "0002");
}

#[test]
fn non_band_entries_in_root_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a");
    let archive = Archive::create(&path).unwrap();
    archive
        .create_band()
        .unwrap()
        .start_band()
        .unwrap()
        .finish_band()
        .unwrap();

    fs::create_dir(path.join("b007")).unwrap(); // non-canonical
    fs::create_dir(path.join("scratch")).unwrap();
    fs::write(path.join("b0009"), b"a file, not a band").unwrap();

    let names: Vec<String> = archive
        .list_bands()
        .unwrap()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, vec!["0000"]);
}
