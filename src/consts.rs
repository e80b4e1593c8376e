//! Constants used across the bus framing protocol.
//!
//! This module defines the wire-level layout of frames and blocks, the
//! reserved control code ranges, and the default capacities of the buffers
//! the engines own.
//!
//! ## Key Concepts
//!
//! - **Block**: 8 bytes on the wire, `mask, checksum, data[6]`.
//! - **Frame**: `Start1, Start2, Block * n, End1, End2`, `1 <= n <= 15`.
//! - **Control codes**: the high nibble is one of `0xC..=0xF`, the low nibble
//!   carries the block count `n`.
//! - **Mask bytes**: always `10xx_xxxx`, so they can never be confused with a
//!   control code or a (7-bit) data byte.
//!
//! Buffer capacities are derived from the maximum frame size and should be used
//! wherever an engine or application sizes its buffers.

/// Number of payload bytes carried by one block.
pub const BLOCK_DATA_LEN: usize = 6;

/// Length (in bytes) of one block on the wire: mask, checksum and data.
pub const BLOCK_LEN: usize = BLOCK_DATA_LEN + 2;

/// Maximum number of blocks in a single frame.
///
/// The block count travels in the low nibble of every control code.
pub const MAX_BLOCKS: u8 = 0x0F;

/// See [`MAX_BLOCKS`](crate::consts::MAX_BLOCKS)
pub const MAX_BLOCKS_USIZE: usize = MAX_BLOCKS as usize;

/// Maximum number of payload bytes a single frame can carry (15 * 6).
pub const MAX_PAYLOAD_LEN: usize = MAX_BLOCKS_USIZE * BLOCK_DATA_LEN;

/// Maximum number of block bytes a single frame can carry (15 * 8).
pub const MAX_WIRE_PAYLOAD_LEN: usize = MAX_BLOCKS_USIZE * BLOCK_LEN;

/// Maximum total length of a frame on the wire, control codes included.
pub const MAX_FRAME_LEN: usize = 4 + MAX_WIRE_PAYLOAD_LEN;

/// Byte used to fill the unused tail of the final block of a frame.
pub const PAD_BYTE: u8 = 0xFF;

/// Starting pattern of every mask byte (`1000_0000`).
pub const MASK_BASE: u8 = 0x80;

/// Bits that identify a mask byte, see [`MASK_BASE`].
pub const MASK_PATTERN: u8 = 0xC0;

/// Bits of a mask byte that record which data bytes had their high bit cleared.
pub const MASK_FLAGS: u8 = 0x3F;

/// The high bit cleared from data bytes during masking.
pub const HIGH_BIT: u8 = 0x80;

/// Checksums are stored in 7 bits so the checksum byte stays wire-safe.
pub const CHECKSUM_MASK: u8 = 0x7F;

/// Nibble holding the control code kind.
pub const CONTROL_KIND_MASK: u8 = 0xF0;

/// Nibble holding the block count of a control code.
pub const CONTROL_COUNT_MASK: u8 = 0x0F;

/// Capacity of the application buffer a frame handler decodes into.
pub const APPLICATION_BUFFER_LEN: usize = MAX_PAYLOAD_LEN;

/// Capacity of the frame writer's source (payload staging) buffer.
pub const SOURCE_BUFFER_LEN: usize = MAX_FRAME_LEN;

/// Capacity of the frame handler's inbound byte buffer.
pub const INBOUND_BUFFER_LEN: usize = MAX_FRAME_LEN;

/// Capacity of an outbound (transmit) buffer able to hold one full frame.
pub const OUTBOUND_BUFFER_LEN: usize = MAX_FRAME_LEN;

/// Maximum number of closed frames waiting to be sent by a frame writer.
pub const MAX_QUEUED_FRAMES: usize = 8;
