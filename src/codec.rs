//! Binary wire format for binding sets.
//!
//! Encodes a [`BindingSet`] into a self-contained byte payload that
//! round-trips exactly across independent producer and consumer
//! implementations, with no per-topic schema.
//!
//! Layout (format version 1):
//!
//! ```text
//! version         1 byte (0x01)
//! pair count      varint
//! per pair:
//!   name          varint length + UTF-8 bytes
//!   kind tag      1 byte (0x01 identifier, 0x02 literal, 0x03 anonymous)
//!   lexical value varint length + UTF-8 bytes
//!   literal only:
//!     flags       1 byte (bit 0: datatype present, bit 1: language present)
//!     datatype    varint length + UTF-8 bytes, if flagged
//!     language    varint length + UTF-8 bytes, if flagged
//! visibility      varint length + UTF-8 bytes
//! ```
//!
//! Varints are unsigned LEB128 and encode counts and lengths only; values
//! are capped at `u32::MAX`. Length-prefixing (never delimiters) keeps the
//! format unambiguous for arbitrary lexical content, and the leading
//! version byte lets old consumers reject newer payloads with a distinct
//! [`BridgeError::UnsupportedVersion`] instead of misdecoding them.

use crate::binding::BindingSet;
use crate::error::BridgeError;
use crate::term::Term;

/// The wire format version this module encodes and decodes.
pub const FORMAT_VERSION: u8 = 0x01;

/// Term-kind tags.
const TAG_IDENTIFIER: u8 = 0x01;
const TAG_LITERAL: u8 = 0x02;
const TAG_ANONYMOUS: u8 = 0x03;

/// Literal presence flags.
const FLAG_DATATYPE: u8 = 0x01;
const FLAG_LANGUAGE: u8 = 0x02;

/// Longest legal LEB128 encoding of a u32.
const MAX_VARINT_BYTES: usize = 5;

/// Encodes a binding set into its wire representation.
///
/// # Errors
///
/// Returns [`BridgeError::EncodingFailure`] only on an internal invariant
/// violation (a name, value, or count exceeding `u32::MAX` bytes). Valid
/// input never fails.
pub fn encode(bindings: &BindingSet) -> Result<Vec<u8>, BridgeError> {
    let mut out = Vec::with_capacity(16 + bindings.len() * 32);
    out.push(FORMAT_VERSION);

    write_varint(&mut out, checked_len(bindings.len(), "pair count")?);

    for (name, term) in bindings {
        write_str(&mut out, name, "variable name")?;
        match term {
            Term::Identifier(value) => {
                out.push(TAG_IDENTIFIER);
                write_str(&mut out, value, "identifier value")?;
            }
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                out.push(TAG_LITERAL);
                write_str(&mut out, value, "literal value")?;

                let mut flags = 0u8;
                if datatype.is_some() {
                    flags |= FLAG_DATATYPE;
                }
                if language.is_some() {
                    flags |= FLAG_LANGUAGE;
                }
                out.push(flags);

                if let Some(dt) = datatype {
                    write_str(&mut out, dt, "datatype tag")?;
                }
                if let Some(lang) = language {
                    write_str(&mut out, lang, "language tag")?;
                }
            }
            Term::AnonymousNode(label) => {
                out.push(TAG_ANONYMOUS);
                write_str(&mut out, label, "anonymous node label")?;
            }
        }
    }

    write_str(&mut out, bindings.visibility(), "visibility label")?;
    Ok(out)
}

/// Decodes a wire payload back into a binding set.
///
/// # Errors
///
/// Returns [`BridgeError::UnsupportedVersion`] when the version byte is not
/// [`FORMAT_VERSION`], and [`BridgeError::MalformedPayload`] on truncation,
/// an unknown kind tag or flags byte, invalid UTF-8, a duplicate variable
/// name, or trailing bytes after the visibility label.
pub fn decode(payload: &[u8]) -> Result<BindingSet, BridgeError> {
    let mut reader = PayloadReader::new(payload);

    let version = reader.read_u8("version byte")?;
    if version != FORMAT_VERSION {
        return Err(BridgeError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let pair_count = reader.read_varint("pair count")?;
    let mut bindings = BindingSet::new();

    for _ in 0..pair_count {
        let name = reader.read_str("variable name")?;
        let tag = reader.read_u8("term kind tag")?;
        let term = match tag {
            TAG_IDENTIFIER => Term::Identifier(reader.read_str("identifier value")?),
            TAG_LITERAL => {
                let value = reader.read_str("literal value")?;
                let flags = reader.read_u8("literal flags")?;
                if flags & !(FLAG_DATATYPE | FLAG_LANGUAGE) != 0 {
                    return Err(BridgeError::MalformedPayload(format!(
                        "unknown literal flags 0x{flags:02x}"
                    )));
                }
                let datatype = if flags & FLAG_DATATYPE != 0 {
                    Some(reader.read_str("datatype tag")?)
                } else {
                    None
                };
                let language = if flags & FLAG_LANGUAGE != 0 {
                    Some(reader.read_str("language tag")?)
                } else {
                    None
                };
                Term::Literal {
                    value,
                    datatype,
                    language,
                }
            }
            TAG_ANONYMOUS => Term::AnonymousNode(reader.read_str("anonymous node label")?),
            other => {
                return Err(BridgeError::MalformedPayload(format!(
                    "unknown term kind tag 0x{other:02x}"
                )));
            }
        };

        if bindings.insert(name.clone(), term).is_some() {
            return Err(BridgeError::MalformedPayload(format!(
                "duplicate variable name '{name}'"
            )));
        }
    }

    let visibility = reader.read_str("visibility label")?;
    bindings.set_visibility(visibility);

    if reader.remaining() != 0 {
        return Err(BridgeError::MalformedPayload(format!(
            "{} trailing bytes after visibility label",
            reader.remaining()
        )));
    }

    Ok(bindings)
}

fn checked_len(len: usize, what: &str) -> Result<u32, BridgeError> {
    u32::try_from(len)
        .map_err(|_| BridgeError::EncodingFailure(format!("{what} exceeds u32::MAX ({len})")))
}

/// Appends an unsigned LEB128 varint.
fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a varint-length-prefixed UTF-8 string.
fn write_str(out: &mut Vec<u8>, s: &str, what: &str) -> Result<(), BridgeError> {
    write_varint(out, checked_len(s.len(), what)?);
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Cursor over a payload with bounds-checked reads.
struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self, what: &str) -> Result<u8, BridgeError> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| BridgeError::MalformedPayload(format!("truncated at {what}")))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads an unsigned LEB128 varint, capped at u32.
    fn read_varint(&mut self, what: &str) -> Result<u32, BridgeError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8(what)?;
            let bits = u32::from(byte & 0x7f);
            // The fifth byte may only contribute 4 low bits.
            if i == MAX_VARINT_BYTES - 1 && bits > 0x0f {
                return Err(BridgeError::MalformedPayload(format!(
                    "varint overflow in {what}"
                )));
            }
            value |= bits << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(BridgeError::MalformedPayload(format!(
            "varint too long in {what}"
        )))
    }

    /// Reads a varint-length-prefixed UTF-8 string.
    ///
    /// The declared length is validated against the remaining input before
    /// any allocation, so a corrupt length cannot trigger a huge allocation.
    fn read_str(&mut self, what: &str) -> Result<String, BridgeError> {
        let len = self.read_varint(what)? as usize;
        if len > self.remaining() {
            return Err(BridgeError::MalformedPayload(format!(
                "{what} declares {len} bytes but only {} remain",
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| BridgeError::MalformedPayload(format!("invalid UTF-8 in {what}")))
    }
}
