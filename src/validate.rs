//! Validation: prove the archive consistent from the bytes on disk alone.
//!
//! Validation re-derives every recorded digest and length and compares them
//! to what the records claim.  It shows the archive matches *one possible*
//! source, not any particular one.  Discrepancies become structured
//! [`Finding`]s and the walk always continues, so one corrupt block cannot
//! hide later corruption.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::archive::Archive;
use crate::band::{BandNumber, BandReader};
use crate::block::{content_digest, format_block_number};
use crate::error::{Error, Result, Scope};

// ── Findings ─────────────────────────────────────────────────────────────────

/// One discrepancy (or notable condition) observed during validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub detail: String,
}

impl Finding {
    fn band(number: &BandNumber, detail: String) -> Finding {
        Finding {
            scope: Scope::Band,
            band: Some(number.to_string()),
            block: None,
            path: None,
            detail,
        }
    }

    fn block(number: &BandNumber, block: u32, detail: String) -> Finding {
        Finding {
            scope: Scope::Block,
            band: Some(number.to_string()),
            block: Some(format_block_number(block)),
            path: None,
            detail,
        }
    }

    fn entry(number: &BandNumber, block: u32, path: &str, detail: String) -> Finding {
        Finding {
            scope: Scope::Entry,
            band: Some(number.to_string()),
            block: Some(format_block_number(block)),
            path: Some(path.to_owned()),
            detail,
        }
    }

    fn location(&self) -> String {
        let mut loc = String::new();
        if let Some(band) = &self.band {
            loc.push_str(&format!("band {band}"));
        }
        if let Some(block) = &self.block {
            loc.push_str(&format!(" block {block}"));
        }
        if let Some(path) = &self.path {
            loc.push_str(&format!(" entry {path}"));
        }
        if loc.is_empty() {
            loc.push_str("archive");
        }
        loc
    }

    /// Convert into the equivalent fail-fast error.
    pub fn into_error(self) -> Error {
        Error::IntegrityFailure {
            scope: self.scope,
            subject: self.location(),
            detail: self.detail,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location(), self.detail)
    }
}

// ── Archive walk ─────────────────────────────────────────────────────────────

/// Validate an archive and all its contents.
///
/// Fails only when the archive itself cannot be opened or enumerated; all
/// per-band and per-block trouble is returned as findings.  Runs on an
/// unchanged archive are deterministic: the same findings come back in the
/// same order.
pub fn validate_archive(path: &Path) -> Result<Vec<Finding>> {
    info!(archive = %path.display(), "start validating");
    let archive = Archive::open(path)?;
    let mut findings = Vec::new();
    for number in archive.list_bands()? {
        findings.extend(check_band(&archive, &number));
    }
    info!(
        archive = %path.display(),
        findings = findings.len(),
        "validation finished"
    );
    Ok(findings)
}

/// Fail-fast wrapper around [`validate_archive`]: the first finding comes
/// back as an `IntegrityFailure` error.
pub fn require_valid(path: &Path) -> Result<()> {
    match validate_archive(path)?.into_iter().next() {
        Some(finding) => Err(finding.into_error()),
        None => Ok(()),
    }
}

// ── Band checks ──────────────────────────────────────────────────────────────

/// Check one band: head and tail presence, tail consistency, every block.
pub fn check_band(archive: &Archive, number: &BandNumber) -> Vec<Finding> {
    let mut findings = Vec::new();
    let band = match archive.open_band_reader(number) {
        Ok(band) => band,
        Err(e) => {
            findings.push(Finding::band(number, format!("band unreadable: {e}")));
            return findings;
        }
    };

    if band.head().is_none() {
        findings.push(Finding::band(number, "band head missing or unreadable".into()));
    }

    let indexes = match band.list_block_indexes() {
        Ok(indexes) => indexes,
        Err(e) => {
            findings.push(Finding::band(number, format!("band unlistable: {e}")));
            return findings;
        }
    };
    let observed = band.list_blocks().unwrap_or_default();

    // Check the tail's range and every observed number, so both a missing
    // middle block and a dangling data file past the recorded count appear.
    let mut to_check: BTreeSet<u32> = observed.iter().copied().collect();

    if band.is_finished() {
        match band.read_tail() {
            Ok(tail) => {
                if tail.block_count != indexes.len() as i64 {
                    findings.push(Finding::band(
                        number,
                        format!(
                            "tail records {} block(s) but {} block index(es) exist",
                            tail.block_count,
                            indexes.len()
                        ),
                    ));
                }
                // Block numbers are six digits at most; an implausible count
                // must not turn into a billion missing-block findings.
                if (0..=999_999).contains(&tail.block_count) {
                    to_check.extend(0..tail.block_count as u32);
                } else {
                    findings.push(Finding::band(
                        number,
                        format!("implausible block count {} in tail", tail.block_count),
                    ));
                }
            }
            Err(e) => {
                findings.push(Finding::band(number, format!("band tail unreadable: {e}")));
            }
        }
    } else {
        findings.push(Finding::band(number, "band tail missing, band in progress".into()));
    }

    for block in to_check {
        findings.extend(check_block(&band, block));
    }
    findings
}

// ── Block checks ─────────────────────────────────────────────────────────────

/// Check one block: index readability, data length, block digest, and every
/// entry's placement and content digest.
pub fn check_block(band: &BandReader, block: u32) -> Vec<Finding> {
    let number = band.number();
    let mut findings = Vec::new();
    let reader = band.block_reader(block);

    let index = match reader.read_index() {
        Ok(index) => index,
        Err(e) => {
            findings.push(Finding::block(number, block, e.to_string()));
            return findings;
        }
    };
    let data = match reader.read_data() {
        Ok(data) => data,
        Err(e) => {
            findings.push(Finding::block(number, block, format!("data file unreadable: {e}")));
            return findings;
        }
    };

    if data.len() as i64 != index.data_length {
        findings.push(Finding::block(
            number,
            block,
            format!(
                "data file is {} byte(s) but index records {}",
                data.len(),
                index.data_length
            ),
        ));
    }
    let actual = content_digest(&data);
    if actual != index.data_sha1 {
        findings.push(Finding::block(
            number,
            block,
            format!(
                "data digest {} differs from recorded {}",
                hex::encode(actual),
                hex::encode(index.data_sha1)
            ),
        ));
    }

    // Entries with content must tile the data stream from offset 0 upward.
    let mut expected_offset: i64 = 0;
    for entry in &index.files {
        if entry.data_length == 0 {
            continue;
        }
        if entry.data_length < 0 {
            findings.push(Finding::entry(
                number,
                block,
                &entry.path,
                format!("negative data length {}", entry.data_length),
            ));
            continue;
        }
        let offset = match entry.data_offset {
            Some(offset) => offset,
            None => {
                findings.push(Finding::entry(
                    number,
                    block,
                    &entry.path,
                    "data offset missing".into(),
                ));
                continue;
            }
        };
        if offset != expected_offset {
            findings.push(Finding::entry(
                number,
                block,
                &entry.path,
                format!("offset {offset} is not contiguous, expected {expected_offset}"),
            ));
        }
        match offset.checked_add(entry.data_length) {
            Some(end) if offset >= 0 && end <= data.len() as i64 => {
                let slice = &data[offset as usize..end as usize];
                match entry.data_sha1 {
                    None => findings.push(Finding::entry(
                        number,
                        block,
                        &entry.path,
                        "content digest missing".into(),
                    )),
                    Some(recorded) => {
                        let computed = content_digest(slice);
                        if computed != recorded {
                            findings.push(Finding::entry(
                                number,
                                block,
                                &entry.path,
                                format!(
                                    "content digest {} differs from recorded {}",
                                    hex::encode(computed),
                                    hex::encode(recorded)
                                ),
                            ));
                        }
                    }
                }
                expected_offset = end;
            }
            _ => {
                findings.push(Finding::entry(
                    number,
                    block,
                    &entry.path,
                    format!(
                        "range {}+{} lies outside the {} byte data file",
                        offset,
                        entry.data_length,
                        data.len()
                    ),
                ));
                // Re-anchor on the recorded values so one bad entry does not
                // cascade over the rest of the block.
                expected_offset = offset.saturating_add(entry.data_length);
            }
        }
    }
    findings
}
