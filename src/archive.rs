//! Archives: the top-level directory holding a format marker plus bands.
//!
//! ```no_run
//! use std::path::Path;
//! use dura::archive::Archive;
//! use dura::backup::{backup, BackupOptions};
//!
//! let archive = Archive::create(Path::new("/backup/home"))?;
//! let sources = vec!["/home/me/notes.txt".into()];
//! backup(&archive, &sources, &BackupOptions::default())?;
//! # Ok::<(), dura::error::Error>(())
//! ```
//!
//! The root contains a `DURA-ARCHIVE` header record whose magic string
//! proves the directory is an archive, and one `b<NNNN>/` subdirectory per
//! band.  The archive permits one writer at a time by convention; readers
//! may run concurrently against finished bands.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::band::{parse_band_dir_name, BandNumber, BandReader, BandWriter};
use crate::error::{Error, Result};
use crate::ioutil::{read_record, write_record};
use crate::records::{ArchiveHeader, ARCHIVE_MAGIC};

/// Name of the header record file in the archive root.
pub const ARCHIVE_HEADER_NAME: &str = "DURA-ARCHIVE";

#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Create a new archive as a new directory.
    pub fn create(path: &Path) -> Result<Archive> {
        match fs::create_dir(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::ArchiveExists {
                    path: path.to_owned(),
                })
            }
            Err(e) => return Err(Error::io(path, e)),
        }
        let archive = Archive {
            path: path.to_owned(),
        };
        write_record(&ArchiveHeader::new(), &archive.header_path())?;
        info!(archive = %path.display(), "created archive");
        Ok(archive)
    }

    /// Open an existing archive, checking its header.
    pub fn open(path: &Path) -> Result<Archive> {
        let archive = Archive {
            path: path.to_owned(),
        };
        let header_path = archive.header_path();
        let header: ArchiveHeader = match read_record(&header_path) {
            Ok(header) => header,
            Err(Error::MissingRecord { .. }) => {
                return Err(Error::NoSuchArchive {
                    path: path.to_owned(),
                })
            }
            Err(Error::BadRecord { source, .. }) => {
                return Err(Error::BadArchiveHeader {
                    path: header_path,
                    reason: source.to_string(),
                })
            }
            Err(e) => return Err(e),
        };
        if header.magic != ARCHIVE_MAGIC {
            return Err(Error::BadArchiveHeader {
                path: header_path,
                reason: format!("unexpected magic {:?}", header.magic),
            });
        }
        debug!(archive = %path.display(), "opened archive");
        Ok(archive)
    }

    // ── Paths ────────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header_path(&self) -> PathBuf {
        self.path.join(ARCHIVE_HEADER_NAME)
    }

    // ── Bands ────────────────────────────────────────────────────────────────

    /// Band numbers present in the archive, in band order.
    ///
    /// Only directory names matching the band grammar (a `b` prefix and the
    /// canonical number form) participate; anything else in the root is
    /// ignored.
    pub fn list_bands(&self) -> Result<Vec<BandNumber>> {
        let entries = fs::read_dir(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut bands = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.path, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(number) = entry.file_name().to_str().and_then(parse_band_dir_name) {
                bands.push(number);
            }
        }
        bands.sort();
        Ok(bands)
    }

    /// The highest band number, or `None` in an empty archive.
    pub fn last_band(&self) -> Result<Option<BandNumber>> {
        Ok(self.list_bands()?.pop())
    }

    /// Allocate the next band number and return a writer in Preparing state.
    ///
    /// Nothing exists on disk until the caller calls `start_band`.  Partial
    /// bands left by a crash keep their numbers; allocation is always
    /// `max + 1`, never reuse.
    pub fn create_band(&self) -> Result<BandWriter> {
        let number = match self.last_band()? {
            Some(last) => last.next(),
            None => BandNumber::zero(),
        };
        Ok(BandWriter::new(&self.path, number))
    }

    /// Open a read-only view of one band.
    pub fn open_band_reader(&self, number: &BandNumber) -> Result<BandReader> {
        BandReader::open(&self.path, number.clone())
    }
}
