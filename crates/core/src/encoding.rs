//! Encoding context and block encode primitives.
//!
//! An [`Encoding`] captures one validated `(version, encoding_type,
//! checksum_type)` triple together with the lookup tables derived from it:
//! a 256-entry byte-to-characters table for the chosen density and the
//! inverse character-to-nibble map. It also owns the running payload
//! checksum, which makes an `Encoding` a per-stream object: cheap to
//! build, not meant to be shared across concurrent streams.
//!
//! # Frame Format
//!
//! ```text
//! +-----------+----------------------+-----------+
//! | DELIM     |  U+034F (2 bytes)    |           |
//! +-----------+----------------------+-----------+
//! | HEADER    |  4 chars, 2-bit      | 12 bytes  |
//! +-----------+----------------------+-----------+
//! | DELIM     |                      |           |
//! +-----------+----------------------+-----------+
//! | PAYLOAD   |  N chars, k-bit      | variable  |
//! +-----------+----------------------+-----------+
//! | DELIM     |                      |           |
//! +-----------+----------------------+-----------+
//! | CHECKSUM  |  k-bit, may be empty | variable  |
//! +-----------+----------------------+-----------+
//! ```
//!
//! The header is always carried at 2-bit density so it can be decoded
//! before the payload density is known. Its 8 bits are, MSB first:
//! `vv` = version-1, `ee` = encoding_type-2, `cc` = checksum selector
//! (0/1/2 = width/8, 3 = 32 bits), `rr` = 2-bit CRC over the rest.

use std::collections::HashMap;
use std::fmt;

use crate::alphabet::{V1_ALPHABET, V1_DELIMITER};
use crate::crc::{crc2, PayloadChecksum};
use crate::error::{InvalidEncodingError, Result};

/// A validated ZWC encoding with its derived lookup tables.
///
/// Holds the active payload checksum accumulator, so encode and decode
/// calls take `&mut self`. Use one `Encoding` per stream.
pub struct Encoding {
    pub(crate) version: u8,
    pub(crate) encoding_type: u8,
    pub(crate) checksum_type: u8,
    pub(crate) delimiter: char,
    pub(crate) alphabet: [char; 16],
    /// Byte value -> encoded character sequence at the active density.
    pub(crate) encode_map: Vec<String>,
    /// Character -> nibble, only for indices below `2^encoding_type`.
    /// Alphabet characters above the band decode like cover text.
    pub(crate) decode_map: HashMap<char, u8>,
    pub(crate) checksum: PayloadChecksum,
    pub(crate) last_crc: u64,
}

impl Encoding {
    /// Check a `(version, encoding_type, checksum_type)` triple.
    ///
    /// # Errors
    /// - `InvalidEncodingError::Version` unless `version == 1`
    /// - `InvalidEncodingError::EncodingType` unless it is 2, 3 or 4
    /// - `InvalidEncodingError::ChecksumType` unless it is 0, 8, 16 or 32
    pub fn validate(version: u8, encoding_type: u8, checksum_type: u8) -> Result<()> {
        if version != 1 {
            return Err(InvalidEncodingError::Version(version).into());
        }
        if !(2..=4).contains(&encoding_type) {
            return Err(InvalidEncodingError::EncodingType(encoding_type).into());
        }
        if !matches!(checksum_type, 0 | 8 | 16 | 32) {
            return Err(InvalidEncodingError::ChecksumType(checksum_type).into());
        }
        Ok(())
    }

    /// Build an encoding over the version-1 alphabet.
    pub fn new(version: u8, encoding_type: u8, checksum_type: u8) -> Result<Self> {
        Self::with_alphabet(V1_ALPHABET, V1_DELIMITER, version, encoding_type, checksum_type)
    }

    /// Build an encoding over a caller-supplied alphabet.
    ///
    /// The sixteen table entries must be distinct and must not include
    /// `delimiter`; the codec does not re-derive framing guarantees for
    /// tables that violate this.
    pub fn with_alphabet(
        table: [char; 16],
        delimiter: char,
        version: u8,
        encoding_type: u8,
        checksum_type: u8,
    ) -> Result<Self> {
        Self::validate(version, encoding_type, checksum_type)?;

        let k = u32::from(encoding_type);
        let mask = (1usize << k) - 1;

        // Byte -> characters, most significant nibble first. Density 3
        // splits the byte 2+3+3, so the top character only ever carries
        // indices 0-3.
        let encode_map: Vec<String> = (0..=255usize)
            .map(|byte| {
                let mut out = String::new();
                for shift in nibble_shifts(k) {
                    out.push(table[(byte >> shift) & mask]);
                }
                out
            })
            .collect();

        // Character -> nibble, restricted to the indices this density emits.
        let decode_map: HashMap<char, u8> = table[..1usize << k]
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u8))
            .collect();

        Ok(Self {
            version,
            encoding_type,
            checksum_type,
            delimiter,
            alphabet: table,
            encode_map,
            decode_map,
            checksum: PayloadChecksum::new(checksum_type),
            last_crc: 0,
        })
    }

    /// Format version (always 1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Bits carried per payload character.
    pub fn encoding_type(&self) -> u8 {
        self.encoding_type
    }

    /// Payload CRC width in bits (0 when integrity is disabled).
    pub fn checksum_type(&self) -> u8 {
        self.checksum_type
    }

    /// The section delimiter character.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// The delimiter's UTF-8 encoding.
    pub(crate) fn delimiter_utf8(&self) -> ([u8; 4], usize) {
        let mut buf = [0u8; 4];
        let len = self.delimiter.encode_utf8(&mut buf).len();
        (buf, len)
    }

    /// Last finalised payload CRC (0 when `checksum_type` is 0 or before
    /// any checksum has been finalised).
    pub fn checksum(&self) -> u64 {
        self.last_crc
    }

    /// Encoded header length in bytes: four 3-byte characters.
    pub fn encoded_header_len(&self) -> usize {
        12
    }

    /// Worst-case encoded length of an `n`-byte payload.
    ///
    /// Density 2 spends four 3-byte characters per payload byte, density 3
    /// three, density 4 two characters of up to 4 bytes each.
    pub fn encoded_payload_max_len(&self, n: usize) -> usize {
        n * match self.encoding_type {
            2 => 12,
            3 => 9,
            _ => 8,
        }
    }

    /// Best-case encoded length of an `n`-byte payload; at density 4 every
    /// character may be only 3 bytes wide.
    pub(crate) fn encoded_payload_min_len(&self, n: usize) -> usize {
        n * match self.encoding_type {
            2 => 12,
            3 => 9,
            _ => 6,
        }
    }

    /// Worst-case encoded length of the checksum section.
    pub fn encoded_checksum_max_len(&self) -> usize {
        self.encoded_payload_max_len(usize::from(self.checksum_type / 8))
    }

    /// Worst-case length of a complete frame around an `n`-byte payload.
    pub fn encoded_max_len(&self, n: usize) -> usize {
        3 * self.delimiter.len_utf8()
            + self.encoded_header_len()
            + self.encoded_payload_max_len(n)
            + self.encoded_checksum_max_len()
    }

    /// Maximum decoded size of `n` encoded payload bytes.
    pub fn decoded_payload_max_len(&self, n: usize) -> usize {
        n / match self.encoding_type {
            2 => 12,
            3 => 9,
            _ => 6,
        }
    }

    /// Write the four header characters into `dst` and return the byte
    /// count. Deterministic for a given parameter triple.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than [`encoded_header_len`](Self::encoded_header_len).
    pub fn encode_header(&self, dst: &mut [u8]) -> usize {
        let mut header = (self.version - 1) << 6 | (self.encoding_type - 2) << 4;
        let selector = if self.checksum_type == 32 {
            3
        } else {
            self.checksum_type / 8
        };
        header |= selector << 2;
        header |= crc2(header);

        let mut n = 0;
        for shift in [6u8, 4, 2, 0] {
            let c = self.alphabet[usize::from((header >> shift) & 0b11)];
            n += c.encode_utf8(&mut dst[n..]).len();
        }
        n
    }

    /// Write the substituted characters for every byte of `src` into `dst`,
    /// feeding the payload checksum along the way. Returns bytes written.
    /// Empty input is a no-op.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than
    /// [`encoded_payload_max_len(src.len())`](Self::encoded_payload_max_len).
    pub fn encode_payload(&mut self, dst: &mut [u8], src: &[u8]) -> usize {
        let mut n = 0;
        for &byte in src {
            let chars = self.encode_map[usize::from(byte)].as_bytes();
            dst[n..n + chars.len()].copy_from_slice(chars);
            n += chars.len();
        }
        self.checksum.update(src);
        n
    }

    /// Finalise the payload checksum, write its big-endian bytes through
    /// the payload table, and re-arm the accumulator. Returns bytes
    /// written (0 when `checksum_type` is 0). The finalised value remains
    /// readable through [`checksum`](Self::checksum).
    ///
    /// # Panics
    /// Panics if `dst` is shorter than
    /// [`encoded_checksum_max_len`](Self::encoded_checksum_max_len).
    pub fn encode_checksum(&mut self, dst: &mut [u8]) -> usize {
        let crc = self.checksum.finalize_reset();
        self.last_crc = crc;

        let width = usize::from(self.checksum_type / 8);
        let be = crc.to_be_bytes();
        let mut n = 0;
        for &byte in &be[8 - width..] {
            let chars = self.encode_map[usize::from(byte)].as_bytes();
            dst[n..n + chars.len()].copy_from_slice(chars);
            n += chars.len();
        }
        n
    }

    /// One-shot frame encode: `DELIM HEADER DELIM PAYLOAD DELIM CHECKSUM`.
    /// Returns total bytes written.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than
    /// [`encoded_max_len(src.len())`](Self::encoded_max_len).
    pub fn encode(&mut self, dst: &mut [u8], src: &[u8]) -> usize {
        let mut n = self.write_delimiter(dst);
        n += self.encode_header(&mut dst[n..]);
        n += self.write_delimiter(&mut dst[n..]);
        n += self.encode_payload(&mut dst[n..], src);
        n += self.write_delimiter(&mut dst[n..]);
        n += self.encode_checksum(&mut dst[n..]);
        n
    }

    pub(crate) fn write_delimiter(&self, dst: &mut [u8]) -> usize {
        self.delimiter.encode_utf8(dst).len()
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoding")
            .field("version", &self.version)
            .field("encoding_type", &self.encoding_type)
            .field("checksum_type", &self.checksum_type)
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

/// Bit offsets of each character's nibble within a byte, MSB first.
///
/// Density 2 -> [6, 4, 2, 0], density 3 -> [6, 3, 0], density 4 -> [4, 0].
fn nibble_shifts(k: u32) -> impl Iterator<Item = u32> {
    let groups = (8 + k - 1) / k;
    (0..groups).map(move |i| (groups - 1 - i) * k)
}
