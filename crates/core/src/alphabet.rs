//! The version-1 invisible alphabet and delimiter.
//!
//! ZWC carries data in characters that render as nothing (or close to it)
//! in ordinary text. Sixteen code points are assigned indices 0-15; at
//! density `k` only indices `0..2^k` are ever emitted. A separate
//! delimiter, U+034F COMBINING GRAPHEME JOINER, splits the frame into
//! header / payload / checksum sections.
//!
//! # Index Assignment
//!
//! ```text
//! 0  U+202C   POP DIRECTIONAL FORMATTING
//! 1  U+200C   ZERO WIDTH NON-JOINER
//! 2  U+200D   ZERO WIDTH JOINER
//! 3  U+2060   WORD JOINER
//! 4  U+2061   FUNCTION APPLICATION
//! 5  U+2062   INVISIBLE TIMES
//! 6  U+2063   INVISIBLE SEPARATOR
//! 7  U+2064   INVISIBLE PLUS
//! 8  U+206A   INHIBIT SYMMETRIC SWAPPING
//! 9  U+206B   ACTIVATE SYMMETRIC SWAPPING
//! 10 U+206C   INHIBIT ARABIC FORM SHAPING
//! 11 U+206D   ACTIVATE ARABIC FORM SHAPING
//! 12 U+206E   NATIONAL DIGIT SHAPES
//! 13 U+206F   NOMINAL DIGIT SHAPES
//! 14 U+1D173  MUSICAL SYMBOL BEGIN BEAM
//! 15 U+1D174  MUSICAL SYMBOL END BEAM
//! ```
//!
//! Indices 0-13 encode to three UTF-8 bytes; 14 and 15 need four, which is
//! why 4-bit density trades character count for byte width.

/// The sixteen version-1 alphabet code points, in index order.
pub const V1_ALPHABET: [char; 16] = [
    '\u{202C}', '\u{200C}', '\u{200D}', '\u{2060}',
    '\u{2061}', '\u{2062}', '\u{2063}', '\u{2064}',
    '\u{206A}', '\u{206B}', '\u{206C}', '\u{206D}',
    '\u{206E}', '\u{206F}', '\u{1D173}', '\u{1D174}',
];

/// The version-1 section delimiter, U+034F COMBINING GRAPHEME JOINER.
pub const V1_DELIMITER: char = '\u{034F}';

/// UTF-8 encoding of [`V1_DELIMITER`], handy for splitting raw byte streams.
pub const V1_DELIMITER_UTF8: [u8; 2] = [0xCD, 0x8F];

/// Index of `c` in the version-1 alphabet, if it is a member.
pub(crate) fn v1_index(c: char) -> Option<u8> {
    V1_ALPHABET.iter().position(|&a| a == c).map(|i| i as u8)
}

/// Guess the density of an encoded payload sample.
///
/// Density 2 emits only indices 0-3, density 3 only 0-7, density 4 the
/// full table. The first index outside a band therefore rules the lower
/// densities out: any index >= 8 settles on 4 immediately, any index in
/// 4..8 raises the candidate from 2 to 3.
///
/// Non-alphabet characters and stray non-UTF-8 bytes are skipped, so the
/// sample may include cover text and delimiters.
pub fn guess_encoding_type(sample: &[u8]) -> u8 {
    let mut guess = 2;
    let mut pos = 0;
    while pos < sample.len() {
        let (c, width) = match next_char(&sample[pos..]) {
            Some(decoded) => decoded,
            None => {
                pos += 1;
                continue;
            }
        };
        if let Some(index) = v1_index(c) {
            if index >= 8 {
                return 4;
            }
            if index >= 4 {
                guess = 3;
            }
        }
        pos += width;
    }
    guess
}

/// Expected byte width of a UTF-8 sequence with lead byte `b`.
///
/// Bytes that cannot begin a sequence report width 1 so scanners can step
/// over them.
pub(crate) fn utf8_width(b: u8) -> usize {
    match b {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}

/// Decode the first scalar value in `src`.
///
/// Returns the character and the number of bytes it occupies, or `None`
/// when `src` does not begin with a complete, valid UTF-8 sequence.
pub(crate) fn next_char(src: &[u8]) -> Option<(char, usize)> {
    let width = match src.first() {
        Some(&b) if b < 0x80 => return Some((b as char, 1)),
        Some(&b) => utf8_width(b),
        None => return None,
    };
    if width == 1 || src.len() < width {
        return None;
    }
    std::str::from_utf8(&src[..width])
        .ok()
        .and_then(|s| s.chars().next())
        .map(|c| (c, width))
}

/// Length of the longest prefix of `buf` that ends on a character boundary.
///
/// A trailing lead byte whose continuation bytes have not arrived yet is
/// excluded; everything else (including malformed sequences, which decode
/// routines deal with themselves) is included.
pub(crate) fn complete_prefix_len(buf: &[u8]) -> usize {
    let n = buf.len();
    let start = n.saturating_sub(3);
    for i in (start..n).rev() {
        let b = buf[i];
        if (0x80..0xC0).contains(&b) {
            continue; // continuation byte, keep walking back
        }
        let width = utf8_width(b);
        return if i + width > n { i } else { n };
    }
    n
}

/// Position of the first delimiter sequence in `haystack`.
pub(crate) fn find_delimiter(haystack: &[u8], delim: &[u8]) -> Option<usize> {
    if delim.is_empty() || haystack.len() < delim.len() {
        return None;
    }
    haystack.windows(delim.len()).position(|w| w == delim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_entries_are_distinct() {
        for (i, a) in V1_ALPHABET.iter().enumerate() {
            for b in &V1_ALPHABET[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(!V1_ALPHABET.contains(&V1_DELIMITER));
    }

    #[test]
    fn delimiter_utf8_matches_char() {
        let mut buf = [0u8; 4];
        let s = V1_DELIMITER.encode_utf8(&mut buf);
        assert_eq!(s.as_bytes(), &V1_DELIMITER_UTF8);
    }

    #[test]
    fn guess_low_band_is_two() {
        // "helo" encoded at 2-bit density: indices 0-3 only
        let sample = b"\xE2\x80\x8C\xE2\x80\x8D\xE2\x80\x8D\xE2\x80\xAC\
                       \xE2\x80\x8C\xE2\x80\x8D\xE2\x80\x8C\xE2\x80\x8C\
                       \xE2\x80\x8C\xE2\x80\x8D\xE2\x81\xA0\xE2\x80\xAC\
                       \xE2\x80\x8C\xE2\x80\x8D\xE2\x81\xA0\xE2\x81\xA0";
        assert_eq!(guess_encoding_type(sample), 2);
    }

    #[test]
    fn guess_mid_band_is_three() {
        // "helo" at 3-bit density: indices 4-7 appear, none above
        let sample = b"\xE2\x80\x8C\xE2\x81\xA2\xE2\x80\xAC\
                       \xE2\x80\x8C\xE2\x81\xA1\xE2\x81\xA2\
                       \xE2\x80\x8C\xE2\x81\xA2\xE2\x81\xA1\
                       \xE2\x80\x8C\xE2\x81\xA2\xE2\x81\xA4";
        assert_eq!(guess_encoding_type(sample), 3);
    }

    #[test]
    fn guess_high_band_is_four() {
        // "helo" at 4-bit density: index 8 and above appear
        let sample = b"\xE2\x81\xA3\xE2\x81\xAA\
                       \xE2\x81\xA3\xE2\x81\xA2\
                       \xE2\x81\xA3\xE2\x81\xAE\
                       \xE2\x81\xA3\xF0\x9D\x85\xB4";
        assert_eq!(guess_encoding_type(sample), 4);
    }

    #[test]
    fn guess_skips_cover_text() {
        let mut sample = Vec::new();
        sample.extend_from_slice("cover ".as_bytes());
        sample.extend_from_slice(b"\xE2\x81\xA2"); // index 5
        sample.extend_from_slice(" text".as_bytes());
        assert_eq!(guess_encoding_type(&sample), 3);
    }

    #[test]
    fn guess_of_plain_text_defaults_to_two() {
        assert_eq!(guess_encoding_type(b"no codec characters here"), 2);
    }

    #[test]
    fn complete_prefix_keeps_whole_chars() {
        let buf = "ab\u{2060}".as_bytes();
        assert_eq!(complete_prefix_len(buf), buf.len());
    }

    #[test]
    fn complete_prefix_trims_split_char() {
        let full = "ab\u{2060}".as_bytes();
        // drop the final continuation byte of the 3-byte sequence
        assert_eq!(complete_prefix_len(&full[..full.len() - 1]), 2);
        // only the lead byte present
        assert_eq!(complete_prefix_len(&full[..full.len() - 2]), 2);
    }

    #[test]
    fn complete_prefix_trims_lone_delimiter_lead() {
        assert_eq!(complete_prefix_len(&[b'a', 0xCD]), 1);
        assert_eq!(complete_prefix_len(&[b'a', 0xCD, 0x8F]), 3);
    }

    #[test]
    fn next_char_decodes_and_rejects() {
        assert_eq!(next_char(b"a"), Some(('a', 1)));
        assert_eq!(next_char(b"\xCD\x8F"), Some(('\u{034F}', 2)));
        assert_eq!(next_char(b"\xE2\x80"), None); // truncated
        assert_eq!(next_char(b"\x80abc"), None); // bare continuation
        assert_eq!(next_char(b""), None);
    }

    #[test]
    fn find_delimiter_locates_first() {
        let buf = b"ab\xCD\x8Fcd\xCD\x8F";
        assert_eq!(find_delimiter(buf, &V1_DELIMITER_UTF8), Some(2));
        assert_eq!(find_delimiter(b"abcd", &V1_DELIMITER_UTF8), None);
    }
}
