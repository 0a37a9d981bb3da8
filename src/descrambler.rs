//! Descrambling of CO2mini HID reports.
//!
//! The device obfuscates every 8-byte input report with a fixed, reversible
//! transform: a byte permutation, an XOR mask, a 3-bit rotation across
//! neighbouring bytes and a per-byte subtraction. A decoded frame carries its
//! own checksum, which is the only way to tell a good report from noise.

use crate::errors::FrameError;

// ============================================================================
// Wire Constants
// ============================================================================

/// USB vendor id of the CO2mini / AIRCO2NTROL dongle.
pub const VENDOR_ID: u16 = 0x04D9;

/// USB product id of the CO2mini / AIRCO2NTROL dongle.
pub const PRODUCT_ID: u16 = 0xA052;

/// Length of every input report, raw and decoded.
pub const FRAME_LEN: usize = 8;

/// XOR mask applied while decoding; also the body of the init feature report.
pub const KEY_MASK: [u8; FRAME_LEN] = [0xC4, 0xC6, 0xC0, 0x92, 0x40, 0x23, 0xDC, 0x96];

/// Per-byte offset subtracted in the last decoding stage.
pub const KEY_OFFSET: [u8; FRAME_LEN] = [0x84, 0x47, 0x56, 0xD6, 0x07, 0x93, 0x93, 0x56];

/// Raw byte `i` lands at position `SHUFFLE[i]` of the permuted frame.
pub const SHUFFLE: [usize; FRAME_LEN] = [2, 4, 0, 7, 1, 6, 5, 3];

/// Byte 4 of every valid decoded frame.
pub const FRAME_TERMINATOR: u8 = 0x0D;

/// Feature report written once at session start: report id 0 followed by the mask.
pub const INIT_REPORT: [u8; FRAME_LEN + 1] = [
    0x00, KEY_MASK[0], KEY_MASK[1], KEY_MASK[2], KEY_MASK[3], KEY_MASK[4], KEY_MASK[5],
    KEY_MASK[6], KEY_MASK[7],
];

// ============================================================================
// Frame Types
// ============================================================================

/// One report exactly as the device sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame(pub [u8; FRAME_LEN]);

/// A descrambled report whose checksum has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame([u8; FRAME_LEN]);

impl RawFrame {
    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for RawFrame {
    type Error = FrameError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        <[u8; FRAME_LEN]>::try_from(data)
            .map(RawFrame)
            .map_err(|_| FrameError::Length(data.len()))
    }
}

impl DecodedFrame {
    /// Wrap already-descrambled bytes, checking the frame checksum.
    pub fn new(bytes: [u8; FRAME_LEN]) -> Result<Self, FrameError> {
        if has_valid_checksum(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(FrameError::Checksum)
        }
    }

    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Op-code identifying the reading kind.
    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    /// Big-endian payload from bytes 1..=2.
    pub fn value(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]])
    }
}

// ============================================================================
// Transform
// ============================================================================

/// Descramble a raw report and validate its checksum.
pub fn decode(raw: &RawFrame) -> Result<DecodedFrame, FrameError> {
    let mut permuted = [0u8; FRAME_LEN];
    for (i, &byte) in raw.0.iter().enumerate() {
        permuted[SHUFFLE[i]] = byte;
    }

    let mut masked = [0u8; FRAME_LEN];
    for i in 0..FRAME_LEN {
        masked[i] = permuted[i] ^ KEY_MASK[i];
    }

    // Low 5 bits come from this byte's high bits, high 3 bits from the
    // previous byte's low bits (index 0 wraps to 7).
    let mut rotated = [0u8; FRAME_LEN];
    for i in 0..FRAME_LEN {
        let prev = masked[(i + FRAME_LEN - 1) % FRAME_LEN];
        rotated[i] = (masked[i] >> 3) | (prev << 5);
    }

    let mut decoded = [0u8; FRAME_LEN];
    for i in 0..FRAME_LEN {
        decoded[i] = rotated[i].wrapping_sub(KEY_OFFSET[i]);
    }

    DecodedFrame::new(decoded)
}

/// Inverse of [`decode`]: scramble a decoded frame into the on-wire form.
///
/// Used by simulated devices; the result decodes back to `frame` bit for bit.
pub fn scramble(frame: &DecodedFrame) -> RawFrame {
    let mut rotated = [0u8; FRAME_LEN];
    for i in 0..FRAME_LEN {
        rotated[i] = frame.0[i].wrapping_add(KEY_OFFSET[i]);
    }

    let mut masked = [0u8; FRAME_LEN];
    for i in 0..FRAME_LEN {
        let next = rotated[(i + 1) % FRAME_LEN];
        masked[i] = (rotated[i] << 3) | (next >> 5);
    }

    let mut permuted = [0u8; FRAME_LEN];
    for i in 0..FRAME_LEN {
        permuted[i] = masked[i] ^ KEY_MASK[i];
    }

    let mut raw = [0u8; FRAME_LEN];
    for (i, byte) in raw.iter_mut().enumerate() {
        *byte = permuted[SHUFFLE[i]];
    }
    RawFrame(raw)
}

/// Byte 4 must be the terminator and byte 3 the mod-256 sum of bytes 0..=2.
fn has_valid_checksum(bytes: &[u8; FRAME_LEN]) -> bool {
    let sum = bytes[0].wrapping_add(bytes[1]).wrapping_add(bytes[2]);
    bytes[4] == FRAME_TERMINATOR && sum == bytes[3]
}
