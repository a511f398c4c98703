//! Error taxonomy shared by every layer.
//!
//! Each variant is distinguishable by the caller; constructors surface
//! structural problems immediately, writers treat any lower-layer error as
//! fatal (leaving the in-progress band without a tail), and the validator
//! converts per-block trouble into findings instead of erroring out.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::wire::WireError;

pub type Result<T> = std::result::Result<T, Error>;

/// Where in the archive hierarchy an integrity problem was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Archive,
    Band,
    Block,
    Entry,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::Archive => "archive",
            Scope::Band => "band",
            Scope::Block => "block",
            Scope::Entry => "entry",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The archive directory or its header file is absent.
    #[error("No archive at {path:?}")]
    NoSuchArchive { path: PathBuf },

    /// `Archive::create` target already exists.
    #[error("Archive already exists: {path:?}")]
    ArchiveExists { path: PathBuf },

    /// Header present but unreadable, malformed, or carrying the wrong magic.
    #[error("Bad archive header in {path:?}: {reason}")]
    BadArchiveHeader { path: PathBuf, reason: String },

    /// A record file failed deserialization.
    #[error("Bad {record} record in {path:?}: {source}")]
    BadRecord {
        record: &'static str,
        path: PathBuf,
        #[source]
        source: WireError,
    },

    /// A structurally required record is absent.  Non-fatal for readers,
    /// fatal for writers.
    #[error("Missing {record} record: {path:?}")]
    MissingRecord { record: &'static str, path: PathBuf },

    /// A computed digest or length disagrees with what was recorded.
    #[error("Integrity failure in {scope} {subject}: {detail}")]
    IntegrityFailure {
        scope: Scope,
        subject: String,
        detail: String,
    },

    /// Underlying filesystem error not matching a more specific category.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Error {
        Error::Io {
            path: path.to_owned(),
            source,
        }
    }
}
