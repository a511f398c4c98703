//! Blocks: bounded data units within a band.
//!
//! A block numbered `n` occupies two files in its band directory:
//!
//! ```text
//! d<BBBBBB>.d    raw data stream, the concatenation of file contents
//! d<BBBBBB>.i    serialized BlockIndex describing those contents
//! ```
//!
//! `<BBBBBB>` is the block number zero-padded to six digits.  The data file
//! is created exclusively when the block is begun and the index is written
//! exactly once when the block is finished, so a data file without an index
//! is always the trace of an interrupted writer.
//!
//! Writer states Fresh, Open, and Closed are carried by ownership:
//! [`BlockWriter::begin`] consumes the fresh writer and yields an
//! [`OpenBlockWriter`]; [`OpenBlockWriter::finish`] consumes that.  Calling
//! into a closed block is therefore a compile error, not a runtime check.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ioutil::{read_record, write_record};
use crate::records::{BlockIndex, FileEntry, FileType, DIGEST_LEN};

// ── Number and name helpers ──────────────────────────────────────────────────

/// Canonical form of a block number.
pub fn format_block_number(number: u32) -> String {
    format!("{number:06}")
}

pub fn block_data_name(number: u32) -> String {
    format!("d{number:06}.d")
}

pub fn block_index_name(number: u32) -> String {
    format!("d{number:06}.i")
}

/// Parse the block number out of a `d<BBBBBB>.i` index file name.
pub fn match_block_index_name(name: &str) -> Option<u32> {
    parse_block_name(name, ".i")
}

/// Parse the block number out of either half of a block file pair.
pub fn match_block_file_name(name: &str) -> Option<u32> {
    parse_block_name(name, ".i").or_else(|| parse_block_name(name, ".d"))
}

fn parse_block_name(name: &str, suffix: &str) -> Option<u32> {
    let digits = name.strip_prefix('d')?.strip_suffix(suffix)?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// SHA-1 over raw bytes, the integrity checksum used throughout the format.
pub fn content_digest(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    let mut h = Sha1::new();
    h.update(bytes);
    h.finalize().into()
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// A block that has been allocated a number but has nothing on disk yet.
#[derive(Debug)]
pub struct BlockWriter {
    band_dir: PathBuf,
    number: u32,
}

impl BlockWriter {
    pub(crate) fn new(band_dir: &Path, number: u32) -> BlockWriter {
        BlockWriter {
            band_dir: band_dir.to_owned(),
            number,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Create the data file (exclusively) and open the block for storing.
    pub fn begin(self) -> Result<OpenBlockWriter> {
        let data_path = self.band_dir.join(block_data_name(self.number));
        let index_path = self.band_dir.join(block_index_name(self.number));
        let data_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&data_path)
            .map_err(|e| Error::io(&data_path, e))?;
        debug!(block = %format_block_number(self.number), "begin block");
        Ok(OpenBlockWriter {
            number: self.number,
            data_path,
            index_path,
            data_file,
            data_sha: Sha1::new(),
            files: Vec::new(),
            position: 0,
        })
    }
}

/// An open block accumulating file contents and a running digest.
pub struct OpenBlockWriter {
    number: u32,
    data_path: PathBuf,
    index_path: PathBuf,
    data_file: File,
    data_sha: Sha1,
    files: Vec<FileEntry>,
    position: u64,
}

impl OpenBlockWriter {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Entries stored so far.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Append one file entry.
    ///
    /// `content` is `None` for directories; a symlink's content is its
    /// target text.  Empty content records length 0 and neither offset nor
    /// digest.  Entry order is storage order and is the sole source of
    /// offset contiguity.
    pub fn store_file(
        &mut self,
        path: &str,
        file_type: FileType,
        content: Option<&[u8]>,
    ) -> Result<()> {
        let mut entry = FileEntry {
            path: path.to_owned(),
            file_type,
            data_length: 0,
            data_sha1: None,
            data_offset: None,
        };
        if let Some(content) = content {
            entry.data_length = content.len() as i64;
            if !content.is_empty() {
                entry.data_sha1 = Some(content_digest(content));
                entry.data_offset = Some(self.position as i64);
            }
            self.data_file
                .write_all(content)
                .map_err(|e| Error::io(&self.data_path, e))?;
            self.data_sha.update(content);
            self.position += content.len() as u64;
        }
        self.files.push(entry);
        Ok(())
    }

    /// Finalize the block digest and length, close the data file, and write
    /// the index.
    pub fn finish(self) -> Result<()> {
        let OpenBlockWriter {
            number,
            data_path,
            index_path,
            mut data_file,
            data_sha,
            files,
            position,
        } = self;
        data_file.flush().map_err(|e| Error::io(&data_path, e))?;
        drop(data_file);
        let index = BlockIndex {
            files,
            data_sha1: data_sha.finalize().into(),
            data_length: position as i64,
        };
        write_record(&index, &index_path)?;
        debug!(
            block = %format_block_number(number),
            entries = index.files.len(),
            bytes = position,
            "finish block"
        );
        Ok(())
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Read-only view of one block; the data file is opened only on demand.
#[derive(Debug, Clone)]
pub struct BlockReader {
    band_dir: PathBuf,
    number: u32,
}

impl BlockReader {
    pub(crate) fn new(band_dir: &Path, number: u32) -> BlockReader {
        BlockReader {
            band_dir: band_dir.to_owned(),
            number,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn data_path(&self) -> PathBuf {
        self.band_dir.join(block_data_name(self.number))
    }

    pub fn index_path(&self) -> PathBuf {
        self.band_dir.join(block_index_name(self.number))
    }

    pub fn read_index(&self) -> Result<BlockIndex> {
        read_record(&self.index_path())
    }

    /// The whole data stream.
    pub fn read_data(&self) -> Result<Vec<u8>> {
        let path = self.data_path();
        std::fs::read(&path).map_err(|e| Error::io(&path, e))
    }
}
