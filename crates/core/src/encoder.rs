//! Streaming encoder: an [`io::Write`] adapter that emits a framed ZWC
//! document across arbitrary writes and a single [`close`](Encoder::close).
//!
//! The preamble (`DELIM HEADER DELIM`) goes out lazily on the first write,
//! so an encoder costs nothing until data actually flows. Each write is
//! encoded on its own into a buffer sized for that write, with no batching
//! across calls, which keeps memory bounded by the caller's chunk size
//! and makes the output independent of how the input was split.

use std::io::{self, Write};

use log::trace;

use crate::encoding::Encoding;

/// Writable adapter producing a ZWC frame on the underlying writer.
///
/// `write` reports the number of *input* bytes accepted, not the encoded
/// byte count, so the adapter composes with `write_all` and friends.
/// After [`close`](Self::close) the encoder is re-armed: the next write
/// starts a fresh frame on the same underlying writer.
pub struct Encoder<W> {
    enc: Encoding,
    w: W,
    header_emitted: bool,
}

impl<W: Write> Encoder<W> {
    /// Wrap `w` with an encoder for `enc`.
    ///
    /// The encoding carries the running payload checksum, so give each
    /// stream its own instance.
    pub fn new(enc: Encoding, w: W) -> Self {
        Self {
            enc,
            w,
            header_emitted: false,
        }
    }

    /// Finish the frame: emit the payload/checksum delimiter followed by
    /// the encoded checksum, then flush and re-arm for a new frame.
    ///
    /// A close with no preceding write still produces a complete
    /// (empty-payload) document.
    pub fn close(&mut self) -> io::Result<()> {
        if !self.header_emitted {
            self.emit_preamble()?;
        }

        let mut out = Vec::with_capacity(4 + self.enc.encoded_checksum_max_len());
        let mut delim = [0u8; 4];
        let dn = self.enc.write_delimiter(&mut delim);
        out.extend_from_slice(&delim[..dn]);

        let start = out.len();
        out.resize(start + self.enc.encoded_checksum_max_len(), 0);
        let n = self.enc.encode_checksum(&mut out[start..]);
        out.truncate(start + n);

        trace!("closing frame: {} checksum bytes", n);
        self.w.write_all(&out)?;
        self.w.flush()?;
        self.header_emitted = false;
        Ok(())
    }

    /// Last finalised payload checksum (valid after `close`).
    pub fn checksum(&self) -> u64 {
        self.enc.checksum()
    }

    /// Consume the encoder and hand back the underlying writer.
    pub fn into_inner(self) -> W {
        self.w
    }

    fn emit_preamble(&mut self) -> io::Result<()> {
        let mut out = Vec::with_capacity(8 + self.enc.encoded_header_len());
        let mut delim = [0u8; 4];
        let dn = self.enc.write_delimiter(&mut delim);

        out.extend_from_slice(&delim[..dn]);
        let start = out.len();
        out.resize(start + 16, 0);
        let n = self.enc.encode_header(&mut out[start..]);
        out.truncate(start + n);
        out.extend_from_slice(&delim[..dn]);

        trace!("emitting preamble: {} bytes", out.len());
        self.w.write_all(&out)?;
        self.header_emitted = true;
        Ok(())
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.header_emitted {
            self.emit_preamble()?;
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut out = vec![0u8; self.enc.encoded_payload_max_len(buf.len())];
        let n = self.enc.encode_payload(&mut out, buf);
        self.w.write_all(&out[..n])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}
