//! Record framing v1: tagged fields, mandatory trailing CRC32.
//!
//! # On-disk layout (all numeric fields little-endian)
//!
//! ```text
//! record   = field* end crc32
//! field    = tag:u8 (nonzero)  len:u32  payload:len bytes
//! end      = 0x00
//! crc32    = u32, CRC32 over every preceding byte (fields + end marker)
//! ```
//!
//! One record per file; a record is complete exactly when the end marker and
//! a matching CRC32 are present and nothing follows them.  Truncation,
//! trailing garbage, unknown or duplicated tags, wrong payload sizes, and
//! CRC mismatches all surface as [`WireError`] and are reported to callers
//! as `BadRecord`.
//!
//! Payload encodings: `i64` is 8 bytes LE; strings are UTF-8; digests are 20
//! raw bytes; a nested record (a file entry inside a block index) is its
//! field sequence without end marker or CRC, framed by the enclosing field
//! length.
//!
//! Tag meanings are per-schema; see the tables in `records.rs`.  Encoding is
//! deterministic (ascending tag order, repeated fields in insertion order),
//! so decode-then-encode reproduces the input byte for byte.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher;
use thiserror::Error;

/// Terminates the field sequence of a top-level record.
pub const END_MARKER: u8 = 0x00;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("record truncated")]
    Truncated,
    #[error("unknown field tag {tag:#04x}")]
    UnknownTag { tag: u8 },
    #[error("duplicate field tag {tag:#04x}")]
    DuplicateField { tag: u8 },
    #[error("field {tag:#04x} has length {len}, expected {expected}")]
    BadFieldLength { tag: u8, len: usize, expected: usize },
    #[error("field {tag:#04x} is not valid UTF-8")]
    BadUtf8 { tag: u8 },
    #[error("unknown file type value {value}")]
    BadFileType { value: u8 },
    #[error("missing required field: {name}")]
    MissingField { name: &'static str },
    #[error("record CRC32 mismatch: computed {computed:#010x}, stored {stored:#010x}")]
    CrcMismatch { computed: u32, stored: u32 },
    #[error("{count} byte(s) of trailing garbage after record end")]
    TrailingBytes { count: usize },
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Accumulates tagged fields; callers append in ascending tag order.
pub(crate) struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        RecordWriter { buf: Vec::new() }
    }

    pub fn bytes_field(&mut self, tag: u8, payload: &[u8]) {
        debug_assert_ne!(tag, END_MARKER);
        let mut len = [0u8; 4];
        LittleEndian::write_u32(&mut len, payload.len() as u32);
        self.buf.push(tag);
        self.buf.extend_from_slice(&len);
        self.buf.extend_from_slice(payload);
    }

    pub fn str_field(&mut self, tag: u8, value: &str) {
        self.bytes_field(tag, value.as_bytes());
    }

    pub fn i64_field(&mut self, tag: u8, value: i64) {
        let mut payload = [0u8; 8];
        LittleEndian::write_i64(&mut payload, value);
        self.bytes_field(tag, &payload);
    }

    pub fn u8_field(&mut self, tag: u8, value: u8) {
        self.bytes_field(tag, &[value]);
    }

    /// Field sequence only, for nesting inside an enclosing field.
    pub fn into_body(self) -> Vec<u8> {
        self.buf
    }

    /// Append the end marker and CRC32, producing a complete record.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(END_MARKER);
        let mut h = Hasher::new();
        h.update(&self.buf);
        let mut crc = [0u8; 4];
        LittleEndian::write_u32(&mut crc, h.finalize());
        self.buf.extend_from_slice(&crc);
        self.buf
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Iterates `(tag, payload)` pairs; for top-level records the end marker and
/// CRC32 are verified when the field sequence is exhausted.
pub(crate) struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
    nested: bool,
}

impl<'a> RecordReader<'a> {
    pub fn top_level(buf: &'a [u8]) -> Self {
        RecordReader {
            buf,
            pos: 0,
            nested: false,
        }
    }

    pub fn nested(buf: &'a [u8]) -> Self {
        RecordReader {
            buf,
            pos: 0,
            nested: true,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.buf.len() {
            return Err(WireError::Truncated);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Next field, or `None` at the end of the record.
    pub fn next_field(&mut self) -> Result<Option<(u8, &'a [u8])>, WireError> {
        if self.nested && self.pos == self.buf.len() {
            return Ok(None);
        }
        let tag = self.take(1)?[0];
        if !self.nested && tag == END_MARKER {
            // CRC32 covers everything before it, end marker included.
            let covered = self.pos;
            let stored = LittleEndian::read_u32(self.take(4)?);
            if self.pos != self.buf.len() {
                return Err(WireError::TrailingBytes {
                    count: self.buf.len() - self.pos,
                });
            }
            let mut h = Hasher::new();
            h.update(&self.buf[..covered]);
            let computed = h.finalize();
            if computed != stored {
                return Err(WireError::CrcMismatch { computed, stored });
            }
            return Ok(None);
        }
        if tag == END_MARKER {
            // A nested record has no marker; a zero tag is framing garbage.
            return Err(WireError::UnknownTag { tag });
        }
        let len = LittleEndian::read_u32(self.take(4)?) as usize;
        let payload = self.take(len)?;
        Ok(Some((tag, payload)))
    }
}

// ── Payload decoders ─────────────────────────────────────────────────────────

pub(crate) fn field_i64(tag: u8, payload: &[u8]) -> Result<i64, WireError> {
    if payload.len() != 8 {
        return Err(WireError::BadFieldLength {
            tag,
            len: payload.len(),
            expected: 8,
        });
    }
    Ok(LittleEndian::read_i64(payload))
}

pub(crate) fn field_u8(tag: u8, payload: &[u8]) -> Result<u8, WireError> {
    if payload.len() != 1 {
        return Err(WireError::BadFieldLength {
            tag,
            len: payload.len(),
            expected: 1,
        });
    }
    Ok(payload[0])
}

pub(crate) fn field_str(tag: u8, payload: &[u8]) -> Result<String, WireError> {
    std::str::from_utf8(payload)
        .map(str::to_owned)
        .map_err(|_| WireError::BadUtf8 { tag })
}

pub(crate) fn field_array<const N: usize>(tag: u8, payload: &[u8]) -> Result<[u8; N], WireError> {
    payload.try_into().map_err(|_| WireError::BadFieldLength {
        tag,
        len: payload.len(),
        expected: N,
    })
}
