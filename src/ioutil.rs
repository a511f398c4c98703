//! Whole-record file I/O.
//!
//! A record file is written in one shot through a scoped handle, so a clean
//! return implies a complete record on disk; a partial file can only be left
//! behind by a crash mid-write.  Reads pull the whole file and hand it to
//! the codec, mapping ENOENT to `MissingRecord` and decode failures to
//! `BadRecord`.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::records::Record;

/// Serialize `record` and write the full byte string to `path`.
pub fn write_record<R: Record>(record: &R, path: &Path) -> Result<()> {
    let bytes = record.encode();
    let mut f = File::create(path).map_err(|e| Error::io(path, e))?;
    f.write_all(&bytes).map_err(|e| Error::io(path, e))?;
    debug!(record = R::RECORD_NAME, path = %path.display(), len = bytes.len(), "wrote record");
    Ok(())
}

/// Read `path` to EOF and deserialize one record.
pub fn read_record<R: Record>(path: &Path) -> Result<R> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::MissingRecord {
                record: R::RECORD_NAME,
                path: path.to_owned(),
            })
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    R::decode(&bytes).map_err(|source| Error::BadRecord {
        record: R::RECORD_NAME,
        path: path.to_owned(),
        source,
    })
}
