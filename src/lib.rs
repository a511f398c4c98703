//! # dura: append-only snapshot backup archive
//!
//! Format guarantees (frozen in format v1):
//! - An archive is a plain directory: a `DURA-ARCHIVE` header record plus
//!   one `b<NNNN>/` directory per band (snapshot pass)
//! - A band holds a `BAND-HEAD`, zero or more `(d<BBBBBB>.d, d<BBBBBB>.i)`
//!   block pairs, and a `BAND-TAIL` present exactly when the band is
//!   finished; a finished band is immutable
//! - Every record is tagged-field framed with a mandatory trailing CRC32;
//!   framing corruption surfaces as `BadRecord` before any semantic check
//! - Every block index records the SHA-1 and byte length of its data file,
//!   and per-entry SHA-1 digests with contiguous offsets from 0
//! - Integrity is re-verifiable from the bytes on disk alone, without the
//!   source; SHA-1 here is an integrity checksum, not a security control
//! - One writer per archive by convention; any number of readers against
//!   finished bands; everything is sequential, no threads, no async

pub mod archive;
pub mod backup;
pub mod band;
pub mod block;
pub mod dump;
pub mod error;
pub mod ioutil;
pub mod records;
pub mod validate;
pub mod wire;

// Flat re-exports for the most common types.
pub use archive::{Archive, ARCHIVE_HEADER_NAME};
pub use backup::{backup, BackupOptions, BackupReport, FILES_PER_BLOCK};
pub use band::{BandNumber, BandReader, BandWriter, OpenBandWriter};
pub use block::{BlockReader, BlockWriter, OpenBlockWriter};
pub use error::{Error, Result, Scope};
pub use records::{
    ArchiveHeader, BandHead, BandTail, BlockIndex, FileEntry, FileType, Record, ARCHIVE_MAGIC,
    DIGEST_LEN,
};
pub use validate::{validate_archive, Finding};
