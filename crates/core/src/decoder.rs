//! Streaming decoders: [`io::Read`] adapters over an encoded ZWC stream.
//!
//! [`CustomDecoder`] consumes `PAYLOAD DELIM CHECKSUM` with an encoding
//! that is already known; [`Decoder`] first reads `DELIM HEADER DELIM`
//! off the stream, builds the encoding the header describes, and then
//! behaves like a custom decoder.
//!
//! # Buffering Model
//!
//! Shift-register state never survives across calls. Each read joins the
//! carried-over bytes with fresh input, trims any split UTF-8 sequence off
//! the end, decodes what it can, and re-buffers whatever was not consumed
//! (a partial character, a partial nibble group, or bytes past a full
//! output buffer) in original order. The only cross-call state besides
//! that buffer is whether the section delimiter has passed and the staged
//! checksum characters collected after it.

use std::io::{self, Read};

use log::trace;

use crate::alphabet::{complete_prefix_len, find_delimiter};
use crate::decode::decode_header;
use crate::encoding::Encoding;
use crate::error::{CorruptPayloadError, Error};

/// Upper bound on header bytes retained while hunting for the second
/// delimiter; a well-formed header is 12 bytes.
const HEADER_CAPTURE_MAX: usize = 64;

fn corrupt(e: CorruptPayloadError) -> io::Error {
    Error::from(e).into()
}

/// Readable adapter decoding a ZWC body with a known encoding.
///
/// Expects `PAYLOAD DELIM CHECKSUM` on the underlying reader, i.e. the
/// frame with its leading `DELIM HEADER DELIM` already stripped. Cover text
/// interleaved with codec characters is skipped. The trailing checksum is
/// verified before EOF is reported; damage surfaces as
/// [`io::ErrorKind::InvalidData`] reads.
pub struct CustomDecoder<R> {
    r: R,
    enc: Encoding,
    delim: [u8; 4],
    delim_len: usize,
    /// Encoded bytes carried between calls, in stream order.
    buf: Vec<u8>,
    /// Encoded checksum characters collected after the delimiter.
    staged: Vec<u8>,
    delim_seen: bool,
    validated: bool,
    eof: bool,
}

impl<R: Read> CustomDecoder<R> {
    /// Wrap `r` with a decoder for `enc`.
    ///
    /// The encoding carries the payload checksum accumulator; use a fresh
    /// instance per stream.
    pub fn new(enc: Encoding, r: R) -> Self {
        let (delim, delim_len) = enc.delimiter_utf8();
        Self {
            r,
            enc,
            delim,
            delim_len,
            buf: Vec::new(),
            staged: Vec::new(),
            delim_seen: false,
            validated: false,
            eof: false,
        }
    }

    /// Finalised payload checksum, valid once the stream has hit EOF.
    pub fn checksum(&self) -> u64 {
        self.enc.checksum()
    }

    /// Pull more bytes from the underlying reader into `buf`.
    fn fill(&mut self, dst_len: usize) -> io::Result<()> {
        let want = self
            .enc
            .encoded_payload_min_len(dst_len)
            .saturating_sub(self.buf.len())
            .max(1);
        let start = self.buf.len();
        self.buf.resize(start + want, 0);
        let got = match self.r.read(&mut self.buf[start..]) {
            Ok(n) => n,
            Err(e) => {
                self.buf.truncate(start);
                return Err(e);
            }
        };
        self.buf.truncate(start + got);
        if got == 0 {
            trace!("underlying reader reached EOF");
            self.eof = true;
        }
        Ok(())
    }

    /// Move post-delimiter bytes into the checksum staging buffer.
    ///
    /// Another delimiter in this region means a second document was
    /// concatenated onto the stream, which this decoder does not support.
    fn stage_checksum(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if find_delimiter(bytes, &self.delim[..self.delim_len]).is_some() {
            return Err(corrupt(CorruptPayloadError::UnexpectedDelimiter));
        }
        trace!("staging {} checksum bytes", bytes.len());
        self.staged.extend_from_slice(bytes);
        Ok(())
    }

    /// Validate the staged checksum if it has not been validated yet.
    ///
    /// A short section is only fatal at EOF; mid-stream it just means more
    /// characters are still on their way.
    fn try_validate(&mut self) -> io::Result<()> {
        if self.validated || !self.delim_seen {
            return Ok(());
        }
        match self.enc.decode_checksum(&self.staged) {
            Ok((value, _)) => {
                trace!("checksum verified: {value:#x}");
                self.validated = true;
                Ok(())
            }
            Err(Error::CorruptPayload(CorruptPayloadError::ShortChecksum { .. }))
                if !self.eof =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Read> Read for CustomDecoder<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        loop {
            if !self.eof {
                self.fill(dst.len())?;
            }

            // never decode across a split UTF-8 sequence
            let win = complete_prefix_len(&self.buf);

            if self.delim_seen {
                if win > 0 {
                    let bytes: Vec<u8> = self.buf.drain(..win).collect();
                    self.stage_checksum(&bytes)?;
                    self.try_validate()?;
                }
            } else {
                let delim = self.delim;
                match find_delimiter(&self.buf[..win], &delim[..self.delim_len]) {
                    None => {
                        let raw = self
                            .enc
                            .decode_raw(dst, &self.buf[..win], true)
                            .map_err(corrupt)?;
                        self.buf.drain(..raw.consumed);
                        if raw.written > 0 {
                            return Ok(raw.written);
                        }
                    }
                    Some(di) => {
                        let raw = self
                            .enc
                            .decode_raw(dst, &self.buf[..di], true)
                            .map_err(corrupt)?;
                        if raw.written == dst.len() && raw.consumed < di {
                            // output full; resume before the delimiter later
                            self.buf.drain(..raw.consumed);
                            return Ok(raw.written);
                        }
                        if raw.pending {
                            // the delimiter closes the payload section, so a
                            // half-built byte can never complete
                            return Err(corrupt(CorruptPayloadError::IncompleteByte));
                        }
                        trace!("payload/checksum delimiter at offset {di}");
                        self.delim_seen = true;
                        let tail: Vec<u8> =
                            self.buf[di + self.delim_len..win].to_vec();
                        self.buf.drain(..win);
                        self.stage_checksum(&tail)?;
                        self.try_validate()?;
                        if raw.written > 0 {
                            return Ok(raw.written);
                        }
                    }
                }
            }

            if self.eof {
                if !self.delim_seen {
                    return Err(corrupt(CorruptPayloadError::MissingDelimiter));
                }
                self.try_validate()?;
                return Ok(0);
            }
        }
    }
}

/// Readable adapter that discovers the encoding from the stream itself.
///
/// On the first read it consumes bytes up to the second delimiter, decodes
/// the header captured between them, builds the [`Encoding`] the header
/// describes, and from then on delegates to a [`CustomDecoder`] over the
/// same reader.
pub struct Decoder<R> {
    pending: Option<R>,
    inner: Option<CustomDecoder<R>>,
    failed: bool,
}

impl<R: Read> Decoder<R> {
    /// Wrap a reader positioned at the start of a ZWC document (cover text
    /// before the first delimiter is fine).
    pub fn new(r: R) -> Self {
        Self {
            pending: Some(r),
            inner: None,
            failed: false,
        }
    }

    /// Finalised payload checksum, valid once the stream has hit EOF.
    /// Returns `None` before the header has been read.
    pub fn checksum(&self) -> Option<u64> {
        self.inner.as_ref().map(CustomDecoder::checksum)
    }

    /// Parameters discovered from the header, once read.
    pub fn encoding_parameters(&self) -> Option<(u8, u8, u8)> {
        self.inner.as_ref().map(|d| {
            (
                d.enc.version(),
                d.enc.encoding_type(),
                d.enc.checksum_type(),
            )
        })
    }
}

/// Read up to the second delimiter and decode the header between them.
fn read_frame_header<R: Read>(r: &mut R) -> io::Result<Encoding> {
    let delim = crate::alphabet::V1_DELIMITER_UTF8;
    let mut header = Vec::with_capacity(16);
    let mut delims_seen = 0u8;
    let mut hold: Option<u8> = None;

    loop {
        let mut byte = [0u8; 1];
        let got = r.read(&mut byte)?;
        if got == 0 {
            // stream ended before the payload section ever started
            if delims_seen == 0 {
                return Err(corrupt(CorruptPayloadError::MissingDelimiter));
            }
            decode_header(&header).map_err(io::Error::from)?;
            return Err(corrupt(CorruptPayloadError::MissingDelimiter));
        }
        let b = byte[0];

        if let Some(lead) = hold.take() {
            if b == delim[1] {
                delims_seen += 1;
                trace!("frame delimiter {delims_seen} found");
                if delims_seen == 2 {
                    break;
                }
                continue;
            }
            if delims_seen == 1 && header.len() < HEADER_CAPTURE_MAX {
                header.push(lead);
            }
        }
        if b == delim[0] {
            hold = Some(b);
            continue;
        }
        if delims_seen == 1 && header.len() < HEADER_CAPTURE_MAX {
            header.push(b);
        }
        // before the first delimiter everything is cover text
    }

    let (version, encoding_type, checksum_type) =
        decode_header(&header).map_err(io::Error::from)?;
    trace!("discovered encoding ({version},{encoding_type},{checksum_type})");
    Encoding::new(version, encoding_type, checksum_type).map_err(io::Error::from)
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if let Some(inner) = self.inner.as_mut() {
            return inner.read(dst);
        }
        if self.failed {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "ZWC header was unreadable",
            ));
        }
        let Some(mut r) = self.pending.take() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "ZWC decoder exhausted",
            ));
        };
        match read_frame_header(&mut r) {
            Ok(enc) => {
                let mut inner = CustomDecoder::new(enc, r);
                let n = inner.read(dst);
                self.inner = Some(inner);
                n
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Setup function that is only run once, even if called multiple times.
    fn setup() {
        INIT.call_once(|| {
            pretty_env_logger::init();
        });
    }

    fn frame(e: u8, c: u8, data: &[u8]) -> Vec<u8> {
        let mut enc = Encoding::new(1, e, c).unwrap();
        let mut dst = vec![0u8; enc.encoded_max_len(data.len())];
        let n = enc.encode(&mut dst, data);
        dst.truncate(n);
        dst
    }

    /// The frame body: everything after `DELIM HEADER DELIM`.
    fn body(e: u8, c: u8, data: &[u8]) -> Vec<u8> {
        frame(e, c, data)[16..].to_vec()
    }

    fn read_all<R: Read>(mut r: R, chunk: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = r.read(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn custom_decoder_round_trips_all_parameter_triples() {
        setup();
        for e in [2u8, 3, 4] {
            for c in [0u8, 8, 16, 32] {
                for chunk in [1usize, 2, 7, 64] {
                    let enc = Encoding::new(1, e, c).unwrap();
                    let encoded = body(e, c, b"helo");
                    let d = CustomDecoder::new(enc, &encoded[..]);
                    let out = read_all(d, chunk).unwrap();
                    assert_eq!(out, b"helo", "({e},{c}) chunk {chunk}");
                }
            }
        }
    }

    #[test]
    fn decoder_reads_header_then_delegates() {
        setup();
        for e in [2u8, 3, 4] {
            for c in [0u8, 8, 16, 32] {
                for chunk in [1usize, 2, 64] {
                    let encoded = frame(e, c, b"helo");
                    let d = Decoder::new(&encoded[..]);
                    let out = read_all(d, chunk).unwrap();
                    assert_eq!(out, b"helo", "({e},{c}) chunk {chunk}");
                }
            }
        }
    }

    #[test]
    fn decoder_exposes_discovered_parameters() {
        let encoded = frame(3, 16, b"helo");
        let mut d = Decoder::new(&encoded[..]);
        assert_eq!(d.encoding_parameters(), None);
        let out = read_all(&mut d, 16).unwrap();
        assert_eq!(out, b"helo");
        assert_eq!(d.encoding_parameters(), Some((1, 3, 16)));
    }

    #[test]
    fn decoder_skips_surrounding_cover_text() {
        setup();
        let mut stream = Vec::new();
        stream.extend_from_slice("An ordinary message".as_bytes());
        stream.extend_from_slice(&frame(4, 32, b"secret"));
        stream.extend_from_slice(" with more text after.".as_bytes());

        let d = Decoder::new(&stream[..]);
        assert_eq!(read_all(d, 3).unwrap(), b"secret");
    }

    #[test]
    fn cover_text_inside_payload_is_skipped() {
        setup();
        // splice visible text between two encoded payload characters
        let f = frame(2, 8, b"hi");
        let mut stream = f[..22].to_vec(); // preamble + 2 chars of 'h'
        stream.extend_from_slice("(hidden)".as_bytes());
        stream.extend_from_slice(&f[22..]);

        let d = Decoder::new(&stream[..]);
        assert_eq!(read_all(d, 1).unwrap(), b"hi");
    }

    #[test]
    fn checksums_agree_between_encoder_and_decoder() {
        let data = b"123456789";
        let mut sink = Vec::new();
        let mut encoder =
            crate::encoder::Encoder::new(Encoding::new(1, 2, 32).unwrap(), &mut sink);
        io::Write::write(&mut encoder, data).unwrap();
        encoder.close().unwrap();
        let sent = encoder.checksum();

        let mut d = Decoder::new(&sink[..]);
        assert_eq!(read_all(&mut d, 4).unwrap(), data);
        assert_eq!(d.checksum(), Some(sent));
        assert_eq!(sent, 0xCBF43926);
    }

    #[test]
    fn corrupted_checksum_fails_the_read() {
        setup();
        let mut f = frame(2, 8, b"helo");
        // swap the final checksum character for a different alphabet char
        let n = f.len();
        let replacement: &[u8; 3] = if &f[n - 3..n] == b"\xE2\x80\xAC" {
            b"\xE2\x80\x8C"
        } else {
            b"\xE2\x80\xAC"
        };
        f[n - 3..n].copy_from_slice(replacement);

        let d = Decoder::new(&f[..]);
        let err = read_all(d, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn truncated_checksum_fails_at_eof() {
        setup();
        let f = frame(3, 32, b"helo");
        let d = Decoder::new(&f[..f.len() - 5]);
        let err = read_all(d, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("checksum truncated"));
    }

    #[test]
    fn missing_delimiter_fails_at_eof() {
        setup();
        // pure payload characters, no delimiter anywhere
        let mut enc = Encoding::new(1, 2, 0).unwrap();
        let mut payload = vec![0u8; enc.encoded_payload_max_len(4)];
        let n = enc.encode_payload(&mut payload, b"helo");

        let dec = Encoding::new(1, 2, 0).unwrap();
        let d = CustomDecoder::new(dec, &payload[..n]);
        let err = read_all(d, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("no delimiter"));
    }

    #[test]
    fn concatenated_documents_are_rejected() {
        setup();
        let mut stream = frame(2, 8, b"one");
        stream.extend_from_slice(&frame(2, 8, b"two"));

        let d = Decoder::new(&stream[..]);
        let err = read_all(d, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("unexpected extra delimiter"));
    }

    #[test]
    fn empty_payload_frame_reads_as_empty() {
        setup();
        for c in [0u8, 8, 32] {
            let encoded = frame(2, c, b"");
            let d = Decoder::new(&encoded[..]);
            assert_eq!(read_all(d, 4).unwrap(), b"", "checksum {c}");
        }
    }

    #[test]
    fn eof_mid_checksum_with_integrity_disabled_is_clean() {
        setup();
        // with integrity disabled the frame ends right after its trailing
        // delimiter, so EOF there must be a clean EOF
        let f = frame(4, 0, b"helo");
        let d = Decoder::new(&f[..]);
        assert_eq!(read_all(d, 2).unwrap(), b"helo");
    }

    #[test]
    fn corrupt_header_poisons_the_decoder() {
        let mut f = frame(2, 0, b"helo");
        // replace the second header character (bytes 5..8) with another
        // alphabet character so the header CRC fails
        f[5..8].copy_from_slice(b"\xE2\x80\x8D");
        let mut d = Decoder::new(&f[..]);
        let mut buf = [0u8; 8];
        assert!(d.read(&mut buf).is_err());
        assert!(d.read(&mut buf).is_err());
    }

    #[test]
    fn single_byte_reads_from_a_dribbling_reader() {
        setup();
        /// Reader that hands out one byte at a time.
        struct Dribble<'a>(&'a [u8]);
        impl Read for Dribble<'_> {
            fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() || dst.is_empty() {
                    return Ok(0);
                }
                dst[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let f = frame(4, 32, b"helo");
        let d = Decoder::new(Dribble(&f));
        assert_eq!(read_all(d, 3).unwrap(), b"helo");
    }
}
