//! zwc-core: hiding binary data inside UTF-8 text with zero-width characters
//!
//! This library implements the ZWC format: payload bytes are substituted
//! with sequences drawn from a 16-character invisible alphabet and framed
//! by a delimiter code point, so an encoded document can sit inside an
//! ordinary visible message and be extracted later. A short self-checking
//! header makes a document self-describing: a decoder can discover the
//! density and checksum width without out-of-band metadata.
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `alphabet`: the invisible alphabet, delimiter, and density heuristic
//! - `crc`: the 2-bit header CRC and the payload checksum accumulator
//! - `encoding`: validated encoding context, derived tables, block encode
//! - `decode`: block decode primitives and the one-shot decode
//! - `encoder`: streaming `io::Write` adapter producing a framed document
//! - `decoder`: streaming `io::Read` adapters, with and without header
//!   discovery
//!
//! # Design Principles
//!
//! - **No panics on input**: malformed streams produce structured errors;
//!   only undersized caller buffers panic, and every primitive has a
//!   matching length estimator
//! - **Bounded memory**: stream adapters buffer no more than one output
//!   buffer's worth of encoded input plus one partial character
//! - **Self-contained calls**: bit-shifting state never crosses a call
//!   boundary; unconsumed input is re-buffered instead
//! - **Observable integrity**: checksums are verified on the fly and the
//!   finalised value stays readable on both ends
//!
//! # Example
//!
//! ```
//! use zwc_core::{Decoder, Encoder, Encoding};
//! use std::io::{Read, Write};
//!
//! let mut covert = Vec::new();
//! let mut encoder = Encoder::new(Encoding::new(1, 3, 16)?, &mut covert);
//! encoder.write_all(b"attack at dawn")?;
//! encoder.close()?;
//!
//! let mut revealed = Vec::new();
//! Decoder::new(&covert[..]).read_to_end(&mut revealed)?;
//! assert_eq!(revealed, b"attack at dawn");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod alphabet;
pub mod crc;
pub mod decode;
pub mod decoder;
pub mod encoder;
pub mod encoding;
pub mod error;

// Re-export commonly used types
pub use alphabet::{guess_encoding_type, V1_ALPHABET, V1_DELIMITER, V1_DELIMITER_UTF8};
pub use crc::crc2;
pub use decode::decode_header;
pub use decoder::{CustomDecoder, Decoder};
pub use encoder::Encoder;
pub use encoding::Encoding;
pub use error::{
    CorruptHeaderError, CorruptPayloadError, Error, InvalidEncodingError, Result,
};
