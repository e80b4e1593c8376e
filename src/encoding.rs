//! Block masking and checksumming.
//!
//! This module implements the transformation between six raw payload bytes
//! and the 8-byte block that carries them on the wire:
//!
//! ```text
//! +------+----------+---------+-----+---------+
//! | mask | checksum | data[0] | ... | data[5] |
//! +------+----------+---------+-----+---------+
//! ```
//!
//! ## Purpose
//!
//! The bus reserves bytes with the high bit set for framing: `0xC0..=0xFF`
//! are control codes and `0x80..=0xBF` mark the start of a block. Payload
//! bytes are therefore *masked*: each byte with its high bit set has that
//! bit cleared, and the matching bit `j` of the mask byte is set so the
//! receiver can restore it.
//!
//! - The mask starts from `1000_0000` and only bits 0..=5 are ever OR'd in,
//!   so `mask & 0xC0 == 0x80` always holds.
//! - Data bytes and the (7-bit) checksum always have their high bit clear.
//!
//! As a result no encoded byte can be mistaken for a control code, and a
//! receiver that lost bytes can resynchronise on the next mask byte.
//!
//! ## Limitations
//!
//! - A short final block is padded with [`PAD_BYTE`]; the padding comes back
//!   out of [`Block::decode`] like any other payload byte.

use crate::consts::{
    BLOCK_DATA_LEN, BLOCK_LEN, CHECKSUM_MASK, HIGH_BIT, MASK_BASE, MASK_FLAGS, MASK_PATTERN,
    PAD_BYTE,
};
use crate::crc::Checksum;
use crate::error::CodecError;

/// Whether `byte` has the `10xx_xxxx` pattern that opens every block.
pub fn is_block_start(byte: u8) -> bool {
    byte & MASK_PATTERN == MASK_BASE
}

/// A block mask byte.
///
/// Bit 7 is always set and bit 6 always clear; bits 0..=5 record which data
/// bytes had their high bit cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Mask(u8);

impl Mask {
    /// A mask with no data byte flagged.
    pub const EMPTY: Mask = Mask(MASK_BASE);

    /// Validates a received mask byte.
    pub fn from_byte(byte: u8) -> Result<Mask, CodecError> {
        if is_block_start(byte) {
            Ok(Mask(byte))
        } else {
            Err(CodecError::InvalidMask(byte))
        }
    }

    /// The byte as sent on the wire.
    pub fn byte(self) -> u8 {
        self.0
    }

    /// Whether data byte `index` had its high bit cleared.
    pub fn is_masked(self, index: usize) -> bool {
        index < BLOCK_DATA_LEN && self.0 & (1 << index) != 0
    }

    /// Flags data byte `index`; indices past the data bytes are ignored.
    #[must_use]
    pub fn with(self, index: usize) -> Mask {
        if index < BLOCK_DATA_LEN {
            Mask(self.0 | ((1 << index) & MASK_FLAGS))
        } else {
            self
        }
    }
}

impl Default for Mask {
    fn default() -> Self {
        Mask::EMPTY
    }
}

/// One encoded block: mask, checksum and six 7-bit data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Block {
    mask: Mask,
    checksum: u8,
    data: [u8; BLOCK_DATA_LEN],
}

impl Block {
    /// Masks and checksums up to six raw payload bytes.
    ///
    /// Fewer than six bytes are padded with [`PAD_BYTE`]; bytes past the
    /// sixth are ignored.
    pub fn encode<C: Checksum>(raw: &[u8], checksum: &C) -> Block {
        let mut data = [PAD_BYTE; BLOCK_DATA_LEN];
        for (slot, &byte) in data.iter_mut().zip(raw) {
            *slot = byte;
        }

        let mut mask = Mask::EMPTY;
        for (i, byte) in data.iter_mut().enumerate() {
            if *byte & HIGH_BIT != 0 {
                *byte &= !HIGH_BIT;
                mask = mask.with(i);
            }
        }

        Block {
            mask,
            checksum: checksum.checksum(&data) & CHECKSUM_MASK,
            data,
        }
    }

    /// Parses the eight wire bytes of a block, validating only the mask.
    pub fn from_wire(bytes: &[u8; BLOCK_LEN]) -> Result<Block, CodecError> {
        let mask = Mask::from_byte(bytes[0])?;
        let mut data = [0; BLOCK_DATA_LEN];
        data.copy_from_slice(&bytes[2..]);
        Ok(Block {
            mask,
            checksum: bytes[1],
            data,
        })
    }

    /// The eight bytes sent on the wire.
    pub fn to_wire(&self) -> [u8; BLOCK_LEN] {
        let mut out = [0; BLOCK_LEN];
        out[0] = self.mask.byte();
        out[1] = self.checksum;
        out[2..].copy_from_slice(&self.data);
        out
    }

    /// The block's mask.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// The checksum carried by the block.
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// The masked data bytes.
    pub fn data(&self) -> &[u8; BLOCK_DATA_LEN] {
        &self.data
    }

    /// Verifies the checksum and restores the original six bytes.
    pub fn decode<C: Checksum>(&self, checksum: &C) -> Result<[u8; BLOCK_DATA_LEN], CodecError> {
        let computed = checksum.checksum(&self.data) & CHECKSUM_MASK;
        if computed != self.checksum {
            return Err(CodecError::ChecksumMismatch {
                expected: self.checksum,
                computed,
            });
        }
        let mut out = self.data;
        for (i, byte) in out.iter_mut().enumerate() {
            if self.mask.is_masked(i) {
                *byte |= HIGH_BIT;
            }
        }
        Ok(out)
    }
}
