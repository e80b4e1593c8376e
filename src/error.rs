//! Error kinds for the buffers, the block codec and both framing engines.
//!
//! Each direction has its own closed taxonomy. Protocol errors are frame-fatal
//! but never engine-fatal: the affected frame is discarded and the engine
//! returns to idle, ready for the next one.

use thiserror::Error;

/// Failures reported by a [`ByteBuffer`](crate::buffer::ByteBuffer).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum BufferError {
    /// The buffer has no room for another byte.
    #[error("buffer full")]
    Full,
    /// The buffer is write-locked by a reader.
    #[error("buffer is write-locked")]
    Locked,
    /// A write lock was released without being held.
    #[error("buffer is not write-locked")]
    NotLocked,
    /// A reversible write was opened while another one is still open.
    #[error("a reversible write is already open")]
    ReversibleWriteOpen,
    /// A reversible write was committed or reversed without being opened.
    #[error("no reversible write is open")]
    NoReversibleWrite,
}

/// Failures of the block codec.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum CodecError {
    /// The stored checksum disagrees with the one recomputed over the data bytes.
    #[error("checksum mismatch: block carries {expected:#04x}, data gives {computed:#04x}")]
    ChecksumMismatch {
        /// Checksum byte found in the block.
        expected: u8,
        /// Checksum recomputed over the received data bytes.
        computed: u8,
    },
    /// The first byte of a block does not have the `10xx_xxxx` mask pattern.
    #[error("invalid mask byte {0:#04x}")]
    InvalidMask(u8),
}

/// Errors reported by the [`FrameWriter`](crate::writer::FrameWriter).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum WriterError {
    /// `open` was called while a frame is already being composed.
    #[error("a frame is already open")]
    AlreadyOpen,
    /// `write` or `close` was called without an open frame.
    #[error("no frame is open")]
    NotOpen,
    /// `trigger` was called while a send is already armed or in progress.
    #[error("a send is already triggered")]
    AlreadyTriggered,
    /// The frame needs more than 15 blocks (more than 90 payload bytes).
    #[error("payload does not fit in one frame")]
    PayloadTooLarge,
    /// A buffer rejected the byte, or the frame queue is full.
    #[error("buffer full")]
    BufferFull,
}

/// Errors reported by the [`FrameHandler`](crate::handler::FrameHandler).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum HandlerError {
    /// A frame completed but no application listener is registered.
    #[error("application listener not registered")]
    ListenerNotRegistered,
    /// The inbound byte buffer refused a submitted byte.
    #[error("inbound buffer rejected byte")]
    InboundWriteFailed,
    /// The application buffer refused to open, accept or commit frame data.
    #[error("application buffer rejected frame data")]
    OutboundWriteFailed,
    /// A block arrived past the block count announced by the start codes, or
    /// the frame ended with a different number of blocks.
    #[error("block index out of bounds")]
    BlockIndexOutOfBounds,
    /// The frame carried more block bytes than its block count allows.
    #[error("too many block bytes for the announced block count")]
    ExcessiveStuffing,
    /// `Start1` was not directly followed by `Start2`.
    #[error("start code 1 without start code 2")]
    Start1WithoutStart2,
    /// A data byte arrived where a new block (mask byte) must begin.
    #[error("block data without a block start")]
    ReentrantBlock,
    /// A control code or byte arrived that the current phase cannot accept.
    #[error("unexpected control byte")]
    UnexpectedControlByte,
    /// A block failed checksum verification.
    #[error("block checksum mismatch")]
    ChecksumMismatch,
    /// A control code was seen twice within the same frame.
    #[error("control code out of position")]
    MarkerOutOfPositionSequence,
    /// The marker accumulator left the legal `0, 1, 3, 7, 15` sequence.
    #[error("marker accumulator invalid")]
    MarkerAccumulatorInvalid,
}

impl From<CodecError> for HandlerError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::ChecksumMismatch { .. } => HandlerError::ChecksumMismatch,
            CodecError::InvalidMask(_) => HandlerError::ReentrantBlock,
        }
    }
}

impl From<BufferError> for WriterError {
    fn from(_: BufferError) -> Self {
        WriterError::BufferFull
    }
}
