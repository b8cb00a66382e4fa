//! Block decode primitives.
//!
//! Decoding walks the input character by character. Characters in the
//! active decode map shift their nibble into an accumulator, MSB first;
//! everything else (cover text, delimiters, alphabet characters above
//! the density band) is skipped. The accumulator state never outlives a
//! single call: callers that stream re-buffer unconsumed input instead of
//! resuming a half-filled byte, which keeps every invocation
//! self-contained.

use crate::alphabet::{find_delimiter, next_char, v1_index};
use crate::crc::crc2;
use crate::encoding::Encoding;
use crate::error::{CorruptHeaderError, CorruptPayloadError, Result};

/// Outcome of one raw decode pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawDecode {
    /// Decoded bytes written to `dst`.
    pub written: usize,
    /// Source bytes consumed. After a clean full scan this is the whole
    /// source; otherwise it stops just past the last completed byte.
    pub consumed: usize,
    /// True when the scan ended with a partially-accumulated byte.
    pub pending: bool,
}

/// Decode the 4-character header of a ZWC document.
///
/// Scans `src` for characters in the 2-bit band of the version-1 alphabet
/// and shifts each 2-bit value into an 8-bit register, MSB first. Other
/// characters (delimiters, cover text, stray bytes) are skipped. Once all
/// 8 bits are present the embedded CRC is verified and the parameters are
/// validated.
///
/// Returns `(version, encoding_type, checksum_type)`.
///
/// # Errors
/// - [`CorruptHeaderError::Truncated`] when fewer than four alphabet
///   characters are found
/// - [`CorruptHeaderError::CrcMismatch`] when the register fails its CRC
/// - [`InvalidEncodingError`](crate::InvalidEncodingError) when the decoded
///   parameters are outside the format
pub fn decode_header(src: &[u8]) -> Result<(u8, u8, u8)> {
    let mut register = 0u8;
    let mut nibbles = 0u8;
    let mut pos = 0;

    while pos < src.len() && nibbles < 4 {
        match next_char(&src[pos..]) {
            Some((c, width)) => {
                match v1_index(c) {
                    Some(index) if index < 4 => {
                        register = register << 2 | index;
                        nibbles += 1;
                    }
                    _ => {}
                }
                pos += width;
            }
            None => pos += 1,
        }
    }

    if nibbles < 4 {
        return Err(CorruptHeaderError::Truncated { bits: nibbles * 2 }.into());
    }
    if crc2(register) != 0 {
        return Err(CorruptHeaderError::CrcMismatch.into());
    }

    let version = (register >> 6) + 1;
    let encoding_type = ((register >> 4) & 0b11) + 2;
    let selector = (register >> 2) & 0b11;
    let checksum_type = if selector == 3 { 32 } else { selector * 8 };

    Encoding::validate(version, encoding_type, checksum_type)?;
    Ok((version, encoding_type, checksum_type))
}

impl Encoding {
    /// Shift-register pass over `src`.
    ///
    /// Stops early when `dst` fills up. When `feed` is set, every emitted
    /// byte also updates the payload checksum; the checksum section is
    /// decoded with `feed` off since those characters are not part of the
    /// protected data.
    pub(crate) fn decode_raw(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        feed: bool,
    ) -> std::result::Result<RawDecode, CorruptPayloadError> {
        let k = i32::from(self.encoding_type);
        let initial = initial_shift(k);
        let mut shift = initial;
        let mut acc = 0u16;
        let mut written = 0;
        let mut consumed = 0;
        let mut pos = 0;

        while pos < src.len() {
            if written == dst.len() {
                break;
            }
            let (c, width) =
                next_char(&src[pos..]).ok_or(CorruptPayloadError::InvalidUtf8)?;
            if let Some(&nibble) = self.decode_map.get(&c) {
                acc |= u16::from(nibble) << shift;
                shift -= k;
                if shift < 0 {
                    let byte = acc as u8;
                    dst[written] = byte;
                    written += 1;
                    if feed {
                        self.checksum.update(&[byte]);
                    }
                    acc = 0;
                    shift = initial;
                    consumed = pos + width;
                }
            }
            pos += width;
        }

        let pending = shift != initial;
        if !pending && pos >= src.len() {
            // clean full scan: trailing skipped characters count as consumed
            consumed = src.len();
        }

        Ok(RawDecode {
            written,
            consumed,
            pending,
        })
    }

    /// Decode encoded payload characters from `src` into `dst`.
    ///
    /// Skips non-alphabet characters and feeds every decoded byte into the
    /// payload checksum. Decodes at most `dst.len()` bytes; size `dst`
    /// with [`decoded_payload_max_len`](Self::decoded_payload_max_len) to
    /// take everything `src` holds.
    ///
    /// Returns `(bytes_written, bytes_consumed)`.
    ///
    /// # Errors
    /// - [`CorruptPayloadError::InvalidUtf8`] on malformed input bytes
    /// - [`CorruptPayloadError::IncompleteByte`] when the input ends with a
    ///   partially-accumulated byte
    pub fn decode_payload(&mut self, dst: &mut [u8], src: &[u8]) -> Result<(usize, usize)> {
        let raw = self.decode_raw(dst, src, true)?;
        if raw.pending {
            return Err(CorruptPayloadError::IncompleteByte.into());
        }
        Ok((raw.written, raw.consumed))
    }

    /// Decode the checksum section from `src` and verify it against the
    /// accumulated payload checksum.
    ///
    /// Reads `checksum_type / 8` bytes through the same raw decoder as the
    /// payload (without feeding the accumulator), interprets them
    /// big-endian, finalises the accumulator into the value reported by
    /// [`checksum`](Self::checksum), and compares.
    ///
    /// Returns `(decoded_checksum, bytes_consumed)`.
    ///
    /// # Errors
    /// - [`CorruptPayloadError::ShortChecksum`] when `src` holds fewer
    ///   encoded bytes than the width requires (the accumulator is left
    ///   untouched so the caller may retry with more input)
    /// - [`CorruptPayloadError::ChecksumMismatch`] carrying both values
    ///   when the comparison fails
    pub fn decode_checksum(&mut self, src: &[u8]) -> Result<(u64, usize)> {
        let needed = usize::from(self.checksum_type / 8);
        let mut bytes = [0u8; 4];
        let raw = self.decode_raw(&mut bytes[..needed], src, false)?;
        if raw.written < needed {
            return Err(CorruptPayloadError::ShortChecksum {
                needed,
                got: raw.written,
            }
            .into());
        }

        let mut found = 0u64;
        for &b in &bytes[..needed] {
            found = found << 8 | u64::from(b);
        }

        let expected = self.checksum.finalize_reset();
        self.last_crc = expected;
        if expected != found {
            return Err(CorruptPayloadError::ChecksumMismatch { expected, found }.into());
        }
        Ok((found, raw.consumed))
    }

    /// One-shot decode of `PAYLOAD DELIM CHECKSUM`.
    ///
    /// The header and its surrounding delimiters must already be stripped
    /// (that is what [`decode_header`] and the stream adapters are for).
    ///
    /// Returns `(bytes_written, bytes_consumed)` with the consumed count
    /// covering the entire input on success.
    ///
    /// # Errors
    /// - [`CorruptPayloadError::MissingDelimiter`] when `src` has no
    ///   payload/checksum separator
    /// - [`CorruptPayloadError::UnexpectedDelimiter`] when a second
    ///   separator follows (concatenated documents are not supported)
    /// - any error of [`decode_payload`](Self::decode_payload) or
    ///   [`decode_checksum`](Self::decode_checksum)
    pub fn decode(&mut self, dst: &mut [u8], src: &[u8]) -> Result<(usize, usize)> {
        let (delim, delim_len) = self.delimiter_utf8();
        let delim = &delim[..delim_len];

        let di = find_delimiter(src, delim).ok_or(CorruptPayloadError::MissingDelimiter)?;
        let (written, _) = self.decode_payload(dst, &src[..di])?;

        let tail = &src[di + delim_len..];
        if find_delimiter(tail, delim).is_some() {
            return Err(CorruptPayloadError::UnexpectedDelimiter.into());
        }
        self.decode_checksum(tail)?;
        Ok((written, src.len()))
    }
}

/// First shift value for a density: the bit position of the top nibble.
fn initial_shift(k: i32) -> i32 {
    ((8 + k - 1) / k - 1) * k
}
