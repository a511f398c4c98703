//! Ingestion: store source paths into a fresh band.
//!
//! Each source path is classified with `lstat` semantics and stored as one
//! file entry: regular files contribute their content, directories only
//! their name, symlinks their target text.  Entries accumulate into a block
//! until it holds [`FILES_PER_BLOCK`] of them, then the block is finished
//! and a new one begun.  The threshold is a write-side knob only; readers
//! never depend on it.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::band::BandNumber;
use crate::error::{Error, Result};
use crate::records::FileType;

/// Entries per block before the pipeline rotates to a new one.
pub const FILES_PER_BLOCK: usize = 20;

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub files_per_block: usize,
}

impl Default for BackupOptions {
    fn default() -> Self {
        BackupOptions {
            files_per_block: FILES_PER_BLOCK,
        }
    }
}

/// Counters from one completed backup pass.
#[derive(Debug)]
pub struct BackupReport {
    pub band_number: BandNumber,
    pub entries_stored: usize,
    pub bytes_stored: u64,
    pub blocks_written: u32,
    pub skipped: usize,
}

/// Run one full snapshot pass over `sources` into a new band of `archive`.
///
/// Any filesystem or record error is fatal and leaves the band unfinished
/// (no tail), which the validator reports as in progress.
pub fn backup(
    archive: &Archive,
    sources: &[PathBuf],
    options: &BackupOptions,
) -> Result<BackupReport> {
    let files_per_block = options.files_per_block.max(1);
    let band = archive.create_band()?.start_band()?;
    let band_number = band.number().clone();
    info!(band = %band_number, sources = sources.len(), "backup starting");

    let mut block = band.create_block()?.begin()?;
    let mut entries_stored = 0usize;
    let mut bytes_stored = 0u64;
    let mut blocks_written = 0u32;
    let mut skipped = 0usize;

    for source in sources {
        let st = fs::symlink_metadata(source).map_err(|e| Error::io(source, e))?;
        let kind = st.file_type();
        let logical_path = source.to_string_lossy().into_owned();

        let (file_type, content): (FileType, Option<Vec<u8>>) = if kind.is_file() {
            let bytes = fs::read(source).map_err(|e| Error::io(source, e))?;
            (FileType::Regular, Some(bytes))
        } else if kind.is_dir() {
            (FileType::Directory, None)
        } else if kind.is_symlink() {
            // TODO: read the target through an O_NOFOLLOW handle to close
            // the race between classifying the link and reading it.
            let target = fs::read_link(source).map_err(|e| Error::io(source, e))?;
            (
                FileType::Symlink,
                Some(target.to_string_lossy().into_owned().into_bytes()),
            )
        } else {
            warn!(path = %logical_path, "skipping special file");
            skipped += 1;
            continue;
        };

        if block.file_count() == files_per_block {
            debug!(entries = entries_stored, "starting new block");
            block.finish()?;
            blocks_written += 1;
            block = band.create_block()?.begin()?;
        }

        info!(path = %logical_path, kind = file_type.name(), "store");
        bytes_stored += content.as_ref().map_or(0, |c| c.len() as u64);
        block.store_file(&logical_path, file_type, content.as_deref())?;
        entries_stored += 1;
    }

    block.finish()?;
    blocks_written += 1;
    band.finish_band()?;
    info!(
        band = %band_number,
        entries = entries_stored,
        blocks = blocks_written,
        "backup complete"
    );

    Ok(BackupReport {
        band_number,
        entries_stored,
        bytes_stored,
        blocks_written,
        skipped,
    })
}
