//! Bands: one full snapshot pass, a directory of blocks bracketed by
//! head and tail markers.
//!
//! A band `b<NNNN>/` contains exactly:
//!
//! ```text
//! BAND-HEAD       BandHead record, written when the band is started
//! d<BBBBBB>.d/.i  zero or more block pairs
//! BAND-TAIL       BandTail record, present iff the band is finished
//! ```
//!
//! Band numbers are decimal, zero-padded to four digits per component;
//! a hyphenated sub-band form (`0001-0002`) is tolerated by parsing but not
//! currently produced.  Ordering compares the hyphen-split components as
//! integers, so `0900` sorts before `10001`.
//!
//! Writer states Preparing, Open, and Closed follow the same ownership
//! scheme as the block layer: [`BandWriter::start_band`] consumes the
//! preparing writer, [`OpenBandWriter::finish_band`] consumes the open one.
//! Writes within a band are single-threaded by contract; no locking is done
//! here.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, warn};

use crate::block::{match_block_file_name, match_block_index_name, BlockReader, BlockWriter};
use crate::error::{Error, Result};
use crate::ioutil::{read_record, write_record};
use crate::records::{BandHead, BandTail, BlockIndex};

pub const BAND_HEAD_NAME: &str = "BAND-HEAD";
pub const BAND_TAIL_NAME: &str = "BAND-TAIL";

// ── Band numbers ─────────────────────────────────────────────────────────────

/// A band number: one or more integer components, displayed zero-padded to
/// four digits each and joined with hyphens.
///
/// The derived ordering compares component lists element-wise as integers,
/// which is exactly the archive's band ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BandNumber(Vec<u32>);

impl BandNumber {
    pub fn new(number: u32) -> BandNumber {
        BandNumber(vec![number])
    }

    pub fn zero() -> BandNumber {
        BandNumber::new(0)
    }

    /// The next top-level band number after this one.
    pub fn next(&self) -> BandNumber {
        BandNumber::new(self.0[0] + 1)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for BandNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{component:04}")?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("invalid band number: {0:?}")]
pub struct BandNumberParseError(pub String);

impl FromStr for BandNumber {
    type Err = BandNumberParseError;

    fn from_str(s: &str) -> std::result::Result<BandNumber, BandNumberParseError> {
        let mut components = Vec::new();
        for part in s.split('-') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(BandNumberParseError(s.to_owned()));
            }
            components.push(
                part.parse()
                    .map_err(|_| BandNumberParseError(s.to_owned()))?,
            );
        }
        if components.is_empty() {
            return Err(BandNumberParseError(s.to_owned()));
        }
        Ok(BandNumber(components))
    }
}

/// Directory name of a band within the archive root.
pub fn band_dir_name(number: &BandNumber) -> String {
    format!("b{number}")
}

/// Parse a directory name back to a band number.
///
/// Only canonical names participate in the band grammar: `b007` parses as a
/// number but does not round-trip to itself, so it is not a band directory.
pub fn parse_band_dir_name(name: &str) -> Option<BandNumber> {
    let rest = name.strip_prefix('b')?;
    let number: BandNumber = rest.parse().ok()?;
    if number.to_string() == rest {
        Some(number)
    } else {
        None
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// A band that has been allocated a number but not yet created on disk.
#[derive(Debug)]
pub struct BandWriter {
    band_dir: PathBuf,
    number: BandNumber,
}

impl BandWriter {
    pub(crate) fn new(archive_dir: &Path, number: BandNumber) -> BandWriter {
        let band_dir = archive_dir.join(band_dir_name(&number));
        BandWriter { band_dir, number }
    }

    pub fn number(&self) -> &BandNumber {
        &self.number
    }

    /// Create the band directory (failing if it exists) and write the head.
    pub fn start_band(self) -> Result<OpenBandWriter> {
        fs::create_dir(&self.band_dir).map_err(|e| Error::io(&self.band_dir, e))?;
        let head = BandHead {
            band_number: self.number.to_string(),
            start_unixtime: Utc::now().timestamp(),
            source_hostname: gethostname::gethostname().to_string_lossy().into_owned(),
        };
        write_record(&head, &self.band_dir.join(BAND_HEAD_NAME))?;
        debug!(band = %self.number, "start band");
        Ok(OpenBandWriter {
            band_dir: self.band_dir,
            number: self.number,
        })
    }
}

/// A band open for appending blocks.
#[derive(Debug)]
pub struct OpenBandWriter {
    band_dir: PathBuf,
    number: BandNumber,
}

impl OpenBandWriter {
    pub fn number(&self) -> &BandNumber {
        &self.number
    }

    /// Distinct block numbers observed in the band directory, sorted.
    pub fn list_blocks(&self) -> Result<Vec<u32>> {
        scan_blocks(&self.band_dir, match_block_file_name)
    }

    /// One past the highest observed block number, or 0 in an empty band.
    ///
    /// Both data and index names count, so a crashed block (data file with
    /// no index) still reserves its number.
    pub fn next_block_number(&self) -> Result<u32> {
        Ok(self
            .list_blocks()?
            .last()
            .map(|highest| highest + 1)
            .unwrap_or(0))
    }

    /// Allocate the next block number and hand back a fresh writer.
    ///
    /// The caller drives the block to Closed before asking for another;
    /// numbering is deterministic under the single-writer rule.
    pub fn create_block(&self) -> Result<BlockWriter> {
        let number = self.next_block_number()?;
        Ok(BlockWriter::new(&self.band_dir, number))
    }

    /// Write the tail, marking the band finished and immutable.
    pub fn finish_band(self) -> Result<()> {
        let block_count = self.next_block_number()? as i64;
        let tail = BandTail {
            band_number: self.number.to_string(),
            block_count,
            end_unixtime: Utc::now().timestamp(),
        };
        write_record(&tail, &self.band_dir.join(BAND_TAIL_NAME))?;
        debug!(band = %self.number, blocks = block_count, "finish band");
        Ok(())
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Read-only view of a band.
///
/// The head is loaded eagerly but tolerantly: a band whose head is missing
/// or unreadable can still be inspected (the condition is logged and
/// [`BandReader::head`] is `None`), which keeps partial bands open to
/// forensic inspection.
#[derive(Debug)]
pub struct BandReader {
    band_dir: PathBuf,
    number: BandNumber,
    head: Option<BandHead>,
}

impl BandReader {
    pub(crate) fn open(archive_dir: &Path, number: BandNumber) -> Result<BandReader> {
        let band_dir = archive_dir.join(band_dir_name(&number));
        if !band_dir.is_dir() {
            return Err(Error::io(&band_dir, io::ErrorKind::NotFound.into()));
        }
        let head = match read_record::<BandHead>(&band_dir.join(BAND_HEAD_NAME)) {
            Ok(head) => Some(head),
            Err(e) => {
                warn!(band = %number, error = %e, "band head unreadable");
                None
            }
        };
        Ok(BandReader {
            band_dir,
            number,
            head,
        })
    }

    pub fn number(&self) -> &BandNumber {
        &self.number
    }

    /// The eagerly loaded head, if it was readable.
    pub fn head(&self) -> Option<&BandHead> {
        self.head.as_ref()
    }

    /// A band is finished exactly when its tail record exists.
    pub fn is_finished(&self) -> bool {
        self.band_dir.join(BAND_TAIL_NAME).exists()
    }

    pub fn read_head(&self) -> Result<BandHead> {
        read_record(&self.band_dir.join(BAND_HEAD_NAME))
    }

    pub fn read_tail(&self) -> Result<BandTail> {
        read_record(&self.band_dir.join(BAND_TAIL_NAME))
    }

    pub fn block_reader(&self, number: u32) -> BlockReader {
        BlockReader::new(&self.band_dir, number)
    }

    pub fn read_block_index(&self, number: u32) -> Result<BlockIndex> {
        self.block_reader(number).read_index()
    }

    /// Distinct block numbers observed over both data and index files.
    pub fn list_blocks(&self) -> Result<Vec<u32>> {
        scan_blocks(&self.band_dir, match_block_file_name)
    }

    /// Block numbers that have an index file.
    pub fn list_block_indexes(&self) -> Result<Vec<u32>> {
        scan_blocks(&self.band_dir, match_block_index_name)
    }
}

fn scan_blocks(band_dir: &Path, matcher: fn(&str) -> Option<u32>) -> Result<Vec<u32>> {
    let mut numbers = BTreeSet::new();
    let entries = fs::read_dir(band_dir).map_err(|e| Error::io(band_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(band_dir, e))?;
        if let Some(number) = entry.file_name().to_str().and_then(matcher) {
            numbers.insert(number);
        }
    }
    Ok(numbers.into_iter().collect())
}
