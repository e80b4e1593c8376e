//! Block checksums.
//!
//! Every block carries a checksum computed over its six *masked* data bytes.
//! The engines are generic over [`Checksum`] so a bus can use whatever
//! polynomial its other nodes speak; [`Crc7`] is the default.

use crate::consts::BLOCK_DATA_LEN;

/// A deterministic, order-sensitive checksum over the six data bytes of a block.
///
/// Only the low 7 bits of the result are transmitted; the high bit is dropped
/// by the block codec so the checksum byte can never look like a mask or a
/// control code on the wire.
pub trait Checksum {
    /// Computes the checksum of a block's masked data bytes.
    fn checksum(&self, data: &[u8; BLOCK_DATA_LEN]) -> u8;
}

/// CRC-7/MMC: polynomial `0x09`, initial value `0`, no reflection.
///
/// A 7-bit CRC detects every single-bit error in a block and its output
/// already fits the checksum byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Crc7;

impl Crc7 {
    const POLY: u8 = 0x09;

    /// Feeds one byte into a running CRC-7 value.
    pub fn update(crc: u8, byte: u8) -> u8 {
        let mut crc = crc;
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1;
            let top = (crc >> 6) & 1;
            crc = (crc << 1) & 0x7F;
            if bit ^ top != 0 {
                crc ^= Self::POLY;
            }
        }
        crc
    }

    /// Computes the CRC-7 of an arbitrary byte slice.
    pub fn compute(data: &[u8]) -> u8 {
        data.iter().fold(0, |crc, &b| Self::update(crc, b))
    }
}

impl Checksum for Crc7 {
    fn checksum(&self, data: &[u8; BLOCK_DATA_LEN]) -> u8 {
        Self::compute(data)
    }
}
