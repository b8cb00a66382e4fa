//! Error types for the ZWC codec.
//!
//! All operations return structured errors rather than panicking.
//! The taxonomy mirrors the three ways a ZWC interaction can fail:
//! - Construction: the requested encoding parameters are not defined
//! - Header: the self-describing header could not be recovered
//! - Payload: the payload or checksum sections are damaged

use thiserror::Error;

/// Top-level error type for all codec operations.
///
/// Each variant corresponds to a failure domain:
/// - Encoding: invalid `(version, encoding_type, checksum_type)` triple
/// - Header: the 4-character header is truncated or fails its 2-bit CRC
/// - Payload: damage detected while decoding payload or checksum sections
/// - I/O: an underlying reader or writer failed
#[derive(Debug, Error)]
pub enum Error {
    /// The requested encoding parameters are not part of the format
    #[error("invalid encoding: {0}")]
    InvalidEncoding(#[from] InvalidEncodingError),

    /// The encoded header could not be decoded
    #[error("corrupt header: {0}")]
    CorruptHeader(#[from] CorruptHeaderError),

    /// The payload or checksum sections are damaged
    #[error("corrupt payload: {0}")]
    CorruptPayload(#[from] CorruptPayloadError),

    /// Underlying stream I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameter validation errors raised at construction time.
///
/// These are programmer errors: the caller asked for an encoding the
/// format does not define.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidEncodingError {
    /// Only file format version 1 is defined
    #[error("unsupported format version {0}")]
    Version(u8),

    /// Encoding density must be 2, 3 or 4 bits per character
    #[error("encoding type {0} is not 2, 3 or 4")]
    EncodingType(u8),

    /// Checksum width must be 0, 8, 16 or 32 bits
    #[error("checksum type {0} is not 0, 8, 16 or 32")]
    ChecksumType(u8),
}

/// Header decoding errors.
///
/// The header is 8 bits carried by four 2-bit characters; the low 2 bits
/// are a CRC over the leading 6. The two variants distinguish "ran out of
/// alphabet characters" from "all 8 bits present but the CRC disagrees".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorruptHeaderError {
    /// Fewer than four alphabet characters were found
    #[error("header truncated: only {bits} of 8 bits present")]
    Truncated {
        /// Number of header bits recovered (always a multiple of 2, < 8)
        bits: u8,
    },

    /// All 8 bits were recovered but the embedded CRC does not check out
    #[error("header CRC mismatch")]
    CrcMismatch,
}

/// Payload and checksum section errors.
///
/// The variants are mutually exclusive; a decode reports the first damage
/// it can prove.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorruptPayloadError {
    /// A byte sequence in the input is not valid UTF-8
    #[error("input is not valid UTF-8")]
    InvalidUtf8,

    /// The payload section ended with a partially-accumulated byte
    #[error("payload ends mid-byte")]
    IncompleteByte,

    /// The checksum section decoded to fewer bytes than the header promised
    #[error("checksum truncated: needed {needed} bytes, got {got}")]
    ShortChecksum { needed: usize, got: usize },

    /// The decoded checksum disagrees with the one computed over the payload
    #[error("checksum mismatch: computed {expected:#x}, stream carries {found:#x}")]
    ChecksumMismatch {
        /// Checksum recomputed from the decoded payload
        expected: u64,
        /// Checksum decoded from the stream
        found: u64,
    },

    /// The input ended without ever containing a section delimiter
    #[error("no delimiter character found")]
    MissingDelimiter,

    /// A delimiter appeared after the frame was already complete
    #[error("unexpected extra delimiter character")]
    UnexpectedDelimiter,
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
