//! Outbound half of the bus framing engine.
//!
//! This module provides the [`FrameWriter`] struct, a cooperative state machine
//! that drains queued payloads from its source buffer, slices them into blocks
//! and emits complete frames into an outbound buffer owned by the transport.
//!
//! The writer never blocks: [`poll()`](FrameWriter::poll) performs at most one
//! state transition and returns [`nb::Error::WouldBlock`] whenever it is waiting
//! for a trigger, a buffer, or the send listener.
//!
//! ## Example
//!
//! ```rust
//! use busframe::buffer::{ByteBuffer, RingBuffer};
//! use busframe::consts::OUTBOUND_BUFFER_LEN;
//! use busframe::writer::FrameWriter;
//!
//! let mut writer = FrameWriter::new(RingBuffer::<OUTBOUND_BUFFER_LEN>::new());
//! writer.open().unwrap();
//! for &b in b"hello!" {
//!     writer.write(b).unwrap();
//! }
//! writer.close().unwrap();
//! writer.trigger().unwrap();
//!
//! while writer.is_triggered() {
//!     let _ = writer.poll();
//! }
//! assert_eq!(writer.outbound().fill_level(), 12);
//! ```
//!
//! ## Design Notes
//!
//! - Payload bytes are staged in the writer's own [`RingBuffer`]; each
//!   [`close()`](FrameWriter::close) queues the length of one frame.
//! - The source buffer is write-locked while a frame is drained, so the
//!   payload is a stable snapshot; [`write()`](FrameWriter::write) fails with
//!   [`WriterError::BufferFull`] during that window.
//! - A frame needing more than 15 blocks is reported as
//!   [`WriterError::PayloadTooLarge`] from `poll()` and dropped before any byte
//!   of it is emitted.

use core::mem;

use heapless::{Deque, Vec};

use crate::buffer::{ByteBuffer, RingBuffer};
use crate::consts::{BLOCK_DATA_LEN, BLOCK_LEN, MAX_BLOCKS, MAX_QUEUED_FRAMES, SOURCE_BUFFER_LEN};
use crate::crc::{Checksum, Crc7};
use crate::encoding::Block;
use crate::error::WriterError;
use crate::frame::block_count;
use crate::markers::ControlCode;
use crate::signal::Signal;
use crate::timer::Poll;

/// States of the [`FrameWriter`] state machine, in transmission order.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum WriterState {
    /// Per-frame state is cleared.
    #[default]
    Idle,
    /// Waiting for [`trigger()`](FrameWriter::trigger) and a queued frame.
    WaitForTrigger,
    /// Acquiring the source buffer's write lock.
    LockBuffer,
    /// Sizing the next queued frame in blocks.
    ComputeBlockCount,
    /// Emitting `0xC0 | n`.
    EmitStart1,
    /// Emitting `0xD0 | n`.
    EmitStart2,
    /// Preparing the next block.
    InitBlock,
    /// Draining up to six payload bytes and encoding them.
    FillBlock,
    /// Copying the eight encoded bytes to the outbound buffer.
    EmitBlockBytes,
    /// Releasing the source buffer's write lock.
    UnlockBuffer,
    /// Emitting `0xE0 | n`.
    EmitEnd1,
    /// Emitting `0xF0 | n`.
    EmitEnd2,
    /// Raising the send listener.
    SignalListener,
    /// Waiting for the send listener to be acknowledged.
    WaitAck,
    /// The frame is done; dequeue it.
    Reset,
    /// The frame was rejected; discard it and report.
    ProcessError,
}

/// Packs queued payloads into frames, one poll at a time.
///
/// ## Type Parameters
///
/// - `B`: the outbound [`ByteBuffer`] the transport drains
/// - `C`: the block [`Checksum`], [`Crc7`] by default
/// - `N`: capacity of the source buffer payloads are staged in
///
/// ## Notes
///
/// - Payloads are not checked against the 90 byte frame limit while they are
///   written; the limit is enforced when the frame is sent.
/// - A triggered writer keeps sending until its queue is empty, then disarms.
#[derive(Debug)]
pub struct FrameWriter<'a, B, C = Crc7, const N: usize = SOURCE_BUFFER_LEN>
where
    B: ByteBuffer,
    C: Checksum,
{
    state: WriterState,
    source: RingBuffer<N>,
    outbound: B,
    listener: Option<&'a Signal>,
    checksum: C,
    frame_open: bool,
    triggered: bool,
    /// Bytes written to the frame currently open.
    open_len: usize,
    /// Lengths of closed frames, oldest first.
    queue: Deque<usize, MAX_QUEUED_FRAMES>,
    /// Source bytes of the frame in flight not yet drained.
    remaining: usize,
    block_count: u8,
    blocks_emitted: u8,
    chunk: Vec<u8, BLOCK_DATA_LEN>,
    wire: [u8; BLOCK_LEN],
    wire_pos: usize,
    pending_error: Option<WriterError>,
    last_error: Option<WriterError>,

    /// Counter of frames emitted completely and acknowledged.
    pub frames_sent: u16,

    /// Counter of queued frames dropped because they could not be framed.
    pub frames_dropped: u16,
}

impl<'a, B> FrameWriter<'a, B>
where
    B: ByteBuffer,
{
    /// Creates a writer emitting into `outbound`, checksumming with [`Crc7`].
    pub fn new(outbound: B) -> Self {
        Self::with_checksum(outbound, Crc7)
    }
}

impl<'a, B, C, const N: usize> FrameWriter<'a, B, C, N>
where
    B: ByteBuffer,
    C: Checksum,
{
    /// Creates a writer emitting into `outbound` with a custom checksum.
    pub fn with_checksum(outbound: B, checksum: C) -> Self {
        Self {
            state: WriterState::Idle,
            source: RingBuffer::new(),
            outbound,
            listener: None,
            checksum,
            frame_open: false,
            triggered: false,
            open_len: 0,
            queue: Deque::new(),
            remaining: 0,
            block_count: 0,
            blocks_emitted: 0,
            chunk: Vec::new(),
            wire: [0; BLOCK_LEN],
            wire_pos: 0,
            pending_error: None,
            last_error: None,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    /// Returns the writer to its power-on state.
    ///
    /// Staged payloads, queued frames and any frame in flight are dropped.
    /// Bytes already emitted into the outbound buffer are left alone.
    pub fn initialize(&mut self) {
        self.source.clear();
        self.queue.clear();
        self.frame_open = false;
        self.triggered = false;
        self.open_len = 0;
        self.pending_error = None;
        self.last_error = None;
        self.reset_frame();
        self.state = WriterState::Idle;
    }

    /// Replaces the outbound buffer, returning the previous one.
    pub fn register_outbound_buffer(&mut self, outbound: B) -> B {
        mem::replace(&mut self.outbound, outbound)
    }

    /// Registers the signal raised after each frame is fully emitted.
    ///
    /// Without a send listener the writer does not wait for acknowledgement.
    pub fn register_send_listener(&mut self, listener: &'a Signal) {
        self.listener = Some(listener);
    }

    /// The outbound buffer.
    pub fn outbound(&self) -> &B {
        &self.outbound
    }

    /// The outbound buffer, for a transport draining it.
    pub fn outbound_mut(&mut self) -> &mut B {
        &mut self.outbound
    }

    /// Starts composing a new frame.
    ///
    /// # Errors
    /// [`WriterError::AlreadyOpen`] if a frame is already being composed.
    pub fn open(&mut self) -> Result<(), WriterError> {
        if self.frame_open {
            return Err(WriterError::AlreadyOpen);
        }
        self.frame_open = true;
        self.open_len = 0;
        Ok(())
    }

    /// Appends one payload byte to the open frame.
    ///
    /// # Errors
    /// - [`WriterError::NotOpen`] if no frame is open
    /// - [`WriterError::BufferFull`] if the source buffer is full or locked
    pub fn write(&mut self, byte: u8) -> Result<(), WriterError> {
        if !self.frame_open {
            return Err(WriterError::NotOpen);
        }
        self.source.put(byte)?;
        self.open_len += 1;
        Ok(())
    }

    /// Ends composition of the open frame and queues it for sending.
    ///
    /// # Errors
    /// - [`WriterError::NotOpen`] if no frame is open
    /// - [`WriterError::BufferFull`] if [`MAX_QUEUED_FRAMES`] frames are already
    ///   queued; the frame stays open
    pub fn close(&mut self) -> Result<(), WriterError> {
        if !self.frame_open {
            return Err(WriterError::NotOpen);
        }
        self.queue
            .push_back(self.open_len)
            .map_err(|_| WriterError::BufferFull)?;
        self.frame_open = false;
        self.open_len = 0;
        Ok(())
    }

    /// Arms transmission of every queued frame.
    ///
    /// # Errors
    /// [`WriterError::AlreadyTriggered`] if a send is already armed.
    pub fn trigger(&mut self) -> Result<(), WriterError> {
        if self.triggered {
            return Err(WriterError::AlreadyTriggered);
        }
        self.triggered = true;
        Ok(())
    }

    /// Number of closed frames not yet sent and acknowledged.
    pub fn queued_frame_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether a send is armed or in progress.
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Whether a frame is currently being composed.
    pub fn is_open(&self) -> bool {
        self.frame_open
    }

    /// Current state of the state machine.
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// The last error surfaced by [`poll()`](FrameWriter::poll).
    pub fn last_error(&self) -> Option<WriterError> {
        self.last_error
    }

    /// Advances the state machine by one step.
    ///
    /// # Returns
    /// - `Ok(())`: a transition was made
    /// - `Err(nb::Error::WouldBlock)`: waiting for a trigger, the source lock,
    ///   outbound space or the send listener; call again on the next tick
    /// - `Err(nb::Error::Other(e))`: the frame in flight was dropped because of `e`
    pub fn poll(&mut self) -> nb::Result<(), WriterError> {
        let before = self.state;
        let result = self.step();
        if self.state != before {
            trace!("writer: {:?} -> {:?}", before, self.state);
        }
        result
    }

    fn step(&mut self) -> nb::Result<(), WriterError> {
        match self.state {
            WriterState::Idle => {
                self.reset_frame();
                self.state = WriterState::WaitForTrigger;
            }
            WriterState::WaitForTrigger => {
                if !self.triggered || self.queue.is_empty() {
                    return Err(nb::Error::WouldBlock);
                }
                self.state = WriterState::LockBuffer;
            }
            WriterState::LockBuffer => {
                self.source
                    .acquire_write_lock()
                    .map_err(|_| nb::Error::WouldBlock)?;
                self.state = WriterState::ComputeBlockCount;
            }
            WriterState::ComputeBlockCount => {
                self.remaining = self.queue.front().copied().unwrap_or(0);
                let blocks = block_count(self.remaining);
                if blocks > MAX_BLOCKS as usize {
                    self.pending_error = Some(WriterError::PayloadTooLarge);
                    self.state = WriterState::ProcessError;
                } else {
                    self.block_count = blocks as u8;
                    self.blocks_emitted = 0;
                    self.state = WriterState::EmitStart1;
                }
            }
            WriterState::EmitStart1 => {
                self.emit(ControlCode::Start1.encode(self.block_count))?;
                self.state = WriterState::EmitStart2;
            }
            WriterState::EmitStart2 => {
                self.emit(ControlCode::Start2.encode(self.block_count))?;
                self.state = WriterState::InitBlock;
            }
            WriterState::InitBlock => {
                self.chunk.clear();
                self.wire_pos = 0;
                self.blocks_emitted += 1;
                self.state = WriterState::FillBlock;
            }
            WriterState::FillBlock => {
                let take = self.remaining.min(BLOCK_DATA_LEN);
                while self.chunk.len() < take {
                    let byte = self.source.get().ok_or(nb::Error::WouldBlock)?;
                    let _ = self.chunk.push(byte);
                }
                self.remaining -= take;
                self.wire = Block::encode(&self.chunk, &self.checksum).to_wire();
                self.state = WriterState::EmitBlockBytes;
            }
            WriterState::EmitBlockBytes => {
                while self.wire_pos < BLOCK_LEN {
                    self.emit(self.wire[self.wire_pos])?;
                    self.wire_pos += 1;
                }
                self.state = if self.blocks_emitted < self.block_count {
                    WriterState::InitBlock
                } else {
                    WriterState::UnlockBuffer
                };
            }
            WriterState::UnlockBuffer => {
                if self.source.is_locked() {
                    self.source
                        .release_write_lock()
                        .map_err(|_| nb::Error::WouldBlock)?;
                }
                self.state = WriterState::EmitEnd1;
            }
            WriterState::EmitEnd1 => {
                self.emit(ControlCode::End1.encode(self.block_count))?;
                self.state = WriterState::EmitEnd2;
            }
            WriterState::EmitEnd2 => {
                self.emit(ControlCode::End2.encode(self.block_count))?;
                self.state = WriterState::SignalListener;
            }
            WriterState::SignalListener => {
                self.state = match self.listener {
                    Some(listener) => {
                        listener.raise();
                        WriterState::WaitAck
                    }
                    None => WriterState::Reset,
                };
            }
            WriterState::WaitAck => {
                if self.listener.is_some_and(Signal::is_raised) {
                    return Err(nb::Error::WouldBlock);
                }
                self.state = WriterState::Reset;
            }
            WriterState::Reset => {
                self.finish_frame();
                self.frames_sent = self.frames_sent.wrapping_add(1);
                debug!("writer: frame of {} blocks sent", self.block_count);
                self.state = WriterState::Idle;
            }
            WriterState::ProcessError => {
                let err = self
                    .pending_error
                    .take()
                    .unwrap_or(WriterError::PayloadTooLarge);
                for _ in 0..self.remaining {
                    let _ = self.source.get();
                }
                if self.source.is_locked() {
                    let _ = self.source.release_write_lock();
                }
                self.finish_frame();
                self.frames_dropped = self.frames_dropped.wrapping_add(1);
                self.last_error = Some(err);
                warn!("writer: frame dropped: {:?}", err);
                self.state = WriterState::Idle;
                return Err(nb::Error::Other(err));
            }
        }
        Ok(())
    }

    fn emit(&mut self, byte: u8) -> nb::Result<(), WriterError> {
        self.outbound.put(byte).map_err(|_| nb::Error::WouldBlock)
    }

    /// Dequeues the frame in flight and disarms once the queue is drained.
    fn finish_frame(&mut self) {
        let _ = self.queue.pop_front();
        if self.queue.is_empty() {
            self.triggered = false;
        }
    }

    fn reset_frame(&mut self) {
        self.remaining = 0;
        self.block_count = 0;
        self.blocks_emitted = 0;
        self.chunk.clear();
        self.wire_pos = 0;
    }
}

impl<'a, B, C, const N: usize> Poll for FrameWriter<'a, B, C, N>
where
    B: ByteBuffer,
    C: Checksum,
{
    type Error = WriterError;

    fn poll(&mut self) -> nb::Result<(), WriterError> {
        FrameWriter::poll(self)
    }
}
