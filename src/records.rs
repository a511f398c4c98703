//! The record schemas of the archive format.
//!
//! Five record types appear on disk, each alone in its own file:
//!
//! | Record        | File                  | Tags |
//! |---------------|-----------------------|------|
//! | ArchiveHeader | `DURA-ARCHIVE`        | 1=magic(str) |
//! | BandHead      | `b<NNNN>/BAND-HEAD`   | 1=band_number(str) 2=start_unixtime(i64) 3=source_hostname(str) |
//! | BandTail      | `b<NNNN>/BAND-TAIL`   | 1=band_number(str) 2=block_count(i64) 3=end_unixtime(i64) |
//! | BlockIndex    | `b<NNNN>/d<BBBBBB>.i` | 1=file entry (repeated, nested) 2=data_sha1(bytes20) 3=data_length(i64) |
//! | FileEntry     | nested in BlockIndex  | 1=path(str) 2=file_type(u8) 3=data_length(i64) 4=data_sha1(bytes20, opt) 5=data_offset(i64, opt) |
//!
//! A file entry's digest and offset are present exactly when its content
//! length is greater than zero; directories carry length 0 and nothing else.
//! Digests are SHA-1 over raw bytes, an integrity checksum only.

use crate::wire::{
    field_array, field_i64, field_str, field_u8, RecordReader, RecordWriter, WireError,
};

/// Proves a directory is an archive.  Never mutated after creation.
pub const ARCHIVE_MAGIC: &str = "dura backup archive";

/// Byte length of every digest field (SHA-1).
pub const DIGEST_LEN: usize = 20;

/// A serializable on-disk record.
///
/// `encode` is total and deterministic; `decode` is its inverse and rejects
/// anything `encode` could not have produced.
pub trait Record: Sized {
    /// Schema name used in error messages and log events.
    const RECORD_NAME: &'static str;

    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self, WireError>;
}

// ── File type ────────────────────────────────────────────────────────────────

/// Kind of filesystem object captured by a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
    Symlink = 3,
}

impl FileType {
    pub fn from_u8(value: u8) -> Option<FileType> {
        match value {
            1 => Some(FileType::Regular),
            2 => Some(FileType::Directory),
            3 => Some(FileType::Symlink),
            _ => None,
        }
    }

    /// One-character marker used in listings: `.` file, `/` dir, `@` symlink.
    pub fn type_char(self) -> char {
        match self {
            FileType::Regular => '.',
            FileType::Directory => '/',
            FileType::Symlink => '@',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileType::Regular => "regular",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
        }
    }
}

// ── ArchiveHeader ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: String,
}

impl ArchiveHeader {
    pub fn new() -> ArchiveHeader {
        ArchiveHeader {
            magic: ARCHIVE_MAGIC.to_owned(),
        }
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        ArchiveHeader::new()
    }
}

impl Record for ArchiveHeader {
    const RECORD_NAME: &'static str = "archive header";

    fn encode(&self) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.str_field(1, &self.magic);
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = RecordReader::top_level(bytes);
        let mut magic: Option<String> = None;
        while let Some((tag, payload)) = r.next_field()? {
            match tag {
                1 => set_once(&mut magic, tag, field_str(tag, payload)?)?,
                _ => return Err(WireError::UnknownTag { tag }),
            }
        }
        Ok(ArchiveHeader {
            magic: magic.ok_or(WireError::MissingField { name: "magic" })?,
        })
    }
}

// ── BandHead ─────────────────────────────────────────────────────────────────

/// Start marker of a band.  Written once when the band directory is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandHead {
    pub band_number: String,
    pub start_unixtime: i64,
    pub source_hostname: String,
}

impl Record for BandHead {
    const RECORD_NAME: &'static str = "band head";

    fn encode(&self) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.str_field(1, &self.band_number);
        w.i64_field(2, self.start_unixtime);
        w.str_field(3, &self.source_hostname);
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = RecordReader::top_level(bytes);
        let mut band_number: Option<String> = None;
        let mut start_unixtime: Option<i64> = None;
        let mut source_hostname: Option<String> = None;
        while let Some((tag, payload)) = r.next_field()? {
            match tag {
                1 => set_once(&mut band_number, tag, field_str(tag, payload)?)?,
                2 => set_once(&mut start_unixtime, tag, field_i64(tag, payload)?)?,
                3 => set_once(&mut source_hostname, tag, field_str(tag, payload)?)?,
                _ => return Err(WireError::UnknownTag { tag }),
            }
        }
        Ok(BandHead {
            band_number: band_number.ok_or(WireError::MissingField {
                name: "band_number",
            })?,
            start_unixtime: start_unixtime.ok_or(WireError::MissingField {
                name: "start_unixtime",
            })?,
            source_hostname: source_hostname.ok_or(WireError::MissingField {
                name: "source_hostname",
            })?,
        })
    }
}

// ── BandTail ─────────────────────────────────────────────────────────────────

/// End marker of a band; its presence is the definition of "finished".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTail {
    pub band_number: String,
    pub block_count: i64,
    pub end_unixtime: i64,
}

impl Record for BandTail {
    const RECORD_NAME: &'static str = "band tail";

    fn encode(&self) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.str_field(1, &self.band_number);
        w.i64_field(2, self.block_count);
        w.i64_field(3, self.end_unixtime);
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = RecordReader::top_level(bytes);
        let mut band_number: Option<String> = None;
        let mut block_count: Option<i64> = None;
        let mut end_unixtime: Option<i64> = None;
        while let Some((tag, payload)) = r.next_field()? {
            match tag {
                1 => set_once(&mut band_number, tag, field_str(tag, payload)?)?,
                2 => set_once(&mut block_count, tag, field_i64(tag, payload)?)?,
                3 => set_once(&mut end_unixtime, tag, field_i64(tag, payload)?)?,
                _ => return Err(WireError::UnknownTag { tag }),
            }
        }
        Ok(BandTail {
            band_number: band_number.ok_or(WireError::MissingField {
                name: "band_number",
            })?,
            block_count: block_count.ok_or(WireError::MissingField {
                name: "block_count",
            })?,
            end_unixtime: end_unixtime.ok_or(WireError::MissingField {
                name: "end_unixtime",
            })?,
        })
    }
}

// ── FileEntry ────────────────────────────────────────────────────────────────

/// One captured filesystem object inside a block index.
///
/// `data_sha1` and `data_offset` are set exactly when `data_length > 0`;
/// the offset is the entry's byte position in the block's data stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub file_type: FileType,
    pub data_length: i64,
    pub data_sha1: Option<[u8; DIGEST_LEN]>,
    pub data_offset: Option<i64>,
}

impl FileEntry {
    fn encode_body(&self) -> Vec<u8> {
        let mut w = RecordWriter::new();
        w.str_field(1, &self.path);
        w.u8_field(2, self.file_type as u8);
        w.i64_field(3, self.data_length);
        if let Some(digest) = &self.data_sha1 {
            w.bytes_field(4, digest);
        }
        if let Some(offset) = self.data_offset {
            w.i64_field(5, offset);
        }
        w.into_body()
    }

    fn decode_body(bytes: &[u8]) -> Result<FileEntry, WireError> {
        let mut r = RecordReader::nested(bytes);
        let mut path: Option<String> = None;
        let mut file_type: Option<FileType> = None;
        let mut data_length: Option<i64> = None;
        let mut data_sha1: Option<[u8; DIGEST_LEN]> = None;
        let mut data_offset: Option<i64> = None;
        while let Some((tag, payload)) = r.next_field()? {
            match tag {
                1 => set_once(&mut path, tag, field_str(tag, payload)?)?,
                2 => {
                    let raw = field_u8(tag, payload)?;
                    let parsed =
                        FileType::from_u8(raw).ok_or(WireError::BadFileType { value: raw })?;
                    set_once(&mut file_type, tag, parsed)?;
                }
                3 => set_once(&mut data_length, tag, field_i64(tag, payload)?)?,
                4 => set_once(&mut data_sha1, tag, field_array(tag, payload)?)?,
                5 => set_once(&mut data_offset, tag, field_i64(tag, payload)?)?,
                _ => return Err(WireError::UnknownTag { tag }),
            }
        }
        Ok(FileEntry {
            path: path.ok_or(WireError::MissingField { name: "path" })?,
            file_type: file_type.ok_or(WireError::MissingField { name: "file_type" })?,
            data_length: data_length.ok_or(WireError::MissingField {
                name: "data_length",
            })?,
            data_sha1,
            data_offset,
        })
    }
}

// ── BlockIndex ───────────────────────────────────────────────────────────────

/// Manifest of the files in one block: entries in storage order, plus the
/// digest and byte length of the whole data stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndex {
    pub files: Vec<FileEntry>,
    pub data_sha1: [u8; DIGEST_LEN],
    pub data_length: i64,
}

impl Record for BlockIndex {
    const RECORD_NAME: &'static str = "block index";

    fn encode(&self) -> Vec<u8> {
        let mut w = RecordWriter::new();
        for entry in &self.files {
            w.bytes_field(1, &entry.encode_body());
        }
        w.bytes_field(2, &self.data_sha1);
        w.i64_field(3, self.data_length);
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = RecordReader::top_level(bytes);
        let mut files: Vec<FileEntry> = Vec::new();
        let mut data_sha1: Option<[u8; DIGEST_LEN]> = None;
        let mut data_length: Option<i64> = None;
        while let Some((tag, payload)) = r.next_field()? {
            match tag {
                1 => files.push(FileEntry::decode_body(payload)?),
                2 => set_once(&mut data_sha1, tag, field_array(tag, payload)?)?,
                3 => set_once(&mut data_length, tag, field_i64(tag, payload)?)?,
                _ => return Err(WireError::UnknownTag { tag }),
            }
        }
        Ok(BlockIndex {
            files,
            data_sha1: data_sha1.ok_or(WireError::MissingField { name: "data_sha1" })?,
            data_length: data_length.ok_or(WireError::MissingField {
                name: "data_length",
            })?,
        })
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn set_once<T>(slot: &mut Option<T>, tag: u8, value: T) -> Result<(), WireError> {
    if slot.is_some() {
        return Err(WireError::DuplicateField { tag });
    }
    *slot = Some(value);
    Ok(())
}
