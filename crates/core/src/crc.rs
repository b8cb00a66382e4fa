//! CRC facilities: the 2-bit header CRC and the payload checksum.
//!
//! The header protects itself with a bespoke 2-bit CRC (polynomial
//! x^2 + x + 1) over its six parameter bits, so a decoder can reject a
//! damaged header before trusting any of the values inside it. Payload
//! integrity uses one of three standard CRCs selected by `checksum_type`:
//!
//! - CRC-8: poly 0x07, init 0x00, no reflection, xorout 0x00
//! - CRC-16: poly 0x1021, init 0x0000, no reflection, xorout 0x0000
//! - CRC-32: poly 0x04C11DB7, init 0xFFFFFFFF, reflected, xorout 0xFFFFFFFF
//!
//! Check values over `b"123456789"` are 0xF4, 0x31C3 and 0xCBF43926.

use crc::{Crc, CRC_16_XMODEM, CRC_8_SMBUS};

static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);
static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Compute the 2-bit CRC of one byte.
///
/// The message occupies the six high bits; the two low bits are either
/// zero (when computing a CRC to append) or a candidate CRC (when
/// verifying). A correctly augmented byte always yields 0, so
/// `crc2(header) == 0` is the header acceptance test.
pub fn crc2(byte: u8) -> u8 {
    let mut reg = 0u8;
    for i in (0..8).rev() {
        let out = reg >> 1;
        reg = ((reg << 1) | ((byte >> i) & 1)) & 0b11;
        if out == 1 {
            reg ^= 0b11;
        }
    }
    reg
}

/// Incremental payload checksum, parameterised by CRC width.
///
/// Owns the running digest for one frame. `finalize_reset` yields the
/// final value and re-arms the accumulator for the next frame, which is
/// the lifecycle both `encode_checksum` and `decode_checksum` need.
pub(crate) enum PayloadChecksum {
    /// `checksum_type = 0`: integrity disabled, finalises to 0
    Disabled,
    Crc8(crc::Digest<'static, u8>),
    Crc16(crc::Digest<'static, u16>),
    Crc32(crc32fast::Hasher),
}

impl PayloadChecksum {
    /// Create an accumulator for the given checksum width in bits.
    ///
    /// `width` must already be validated to one of {0, 8, 16, 32}.
    pub(crate) fn new(width: u8) -> Self {
        match width {
            0 => PayloadChecksum::Disabled,
            8 => PayloadChecksum::Crc8(CRC8.digest()),
            16 => PayloadChecksum::Crc16(CRC16.digest()),
            _ => PayloadChecksum::Crc32(crc32fast::Hasher::new()),
        }
    }

    /// Feed payload bytes into the running digest.
    pub(crate) fn update(&mut self, bytes: &[u8]) {
        match self {
            PayloadChecksum::Disabled => {}
            PayloadChecksum::Crc8(d) => d.update(bytes),
            PayloadChecksum::Crc16(d) => d.update(bytes),
            PayloadChecksum::Crc32(h) => h.update(bytes),
        }
    }

    /// Finalise the digest, returning its value and resetting the
    /// accumulator for the next frame.
    pub(crate) fn finalize_reset(&mut self) -> u64 {
        let fresh = match self {
            PayloadChecksum::Disabled => PayloadChecksum::Disabled,
            PayloadChecksum::Crc8(_) => PayloadChecksum::Crc8(CRC8.digest()),
            PayloadChecksum::Crc16(_) => PayloadChecksum::Crc16(CRC16.digest()),
            PayloadChecksum::Crc32(_) => PayloadChecksum::Crc32(crc32fast::Hasher::new()),
        };
        match std::mem::replace(self, fresh) {
            PayloadChecksum::Disabled => 0,
            PayloadChecksum::Crc8(d) => u64::from(d.finalize()),
            PayloadChecksum::Crc16(d) => u64::from(d.finalize()),
            PayloadChecksum::Crc32(h) => u64::from(h.finalize()),
        }
    }
}
