//! Human-readable listings of block indexes.

use std::io::{self, Write};

use crate::records::BlockIndex;

/// Print one line per entry: digest (or `-`), length, offset (or `-`), a
/// type marker, and the path, followed by a totals footer for the block.
pub fn print_block_index(
    out: &mut dyn Write,
    index: &BlockIndex,
    names_only: bool,
) -> io::Result<()> {
    if names_only {
        for entry in &index.files {
            writeln!(out, "{}", entry.path)?;
        }
        return Ok(());
    }
    for entry in &index.files {
        let sha = entry
            .data_sha1
            .map(hex::encode)
            .unwrap_or_else(|| "-".to_owned());
        let offset = entry
            .data_offset
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".to_owned());
        writeln!(
            out,
            "{:<40} {:>10} {:>10} {} {}",
            sha,
            entry.data_length,
            offset,
            entry.file_type.type_char(),
            entry.path
        )?;
    }
    writeln!(out, "{} {} {} =", "=".repeat(40), "=".repeat(10), "=".repeat(10))?;
    writeln!(
        out,
        "{:<40} {:>10} {:>10}",
        hex::encode(index.data_sha1),
        "-",
        index.data_length
    )?;
    Ok(())
}
