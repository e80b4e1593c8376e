//! Inbound half of the bus framing engine.
//!
//! The [`FrameHandler`] consumes raw bus bytes pushed in with
//! [`submit_byte()`](FrameHandler::submit_byte), validates the frame structure
//! and every block checksum, and writes the decoded payload into an
//! application buffer under a reversible write. A frame is committed only
//! once `Start1 Start2 blocks End1 End2` has been seen with consistent block
//! counts; any violation rolls the application buffer back to where the frame
//! began.
//!
//! Like the writer, the handler is polled: each call to
//! [`poll()`](FrameHandler::poll) performs one transition.
//!
//! ## Recovery
//!
//! - A mask byte in the middle of a block restarts collection of that block.
//! - Payload bytes seen outside of a frame are dropped.
//! - `Start1` always starts a new frame, abandoning the one in progress.
//! - After a frame is rejected, bytes up to the next `Start1` are discarded.

use core::mem;

use crate::buffer::{ByteBuffer, RingBuffer};
use crate::consts::{BLOCK_DATA_LEN, BLOCK_LEN, INBOUND_BUFFER_LEN};
use crate::crc::{Checksum, Crc7};
use crate::encoding::{is_block_start, Block};
use crate::error::HandlerError;
use crate::markers::{ControlCode, Marker, MarkerAccumulator};
use crate::signal::Signal;
use crate::timer::Poll;

/// Outer states of the [`FrameHandler`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum HandlerState {
    /// Per-frame state is cleared.
    #[default]
    Idle,
    /// The inbound buffer is empty.
    WaitForBytes,
    /// Taking the next byte from the inbound buffer.
    GetByte,
    /// A payload byte is being run through the block sub-machine.
    HandleBlock,
    /// `End2` was accepted; the frame is being committed.
    CheckFinal,
    /// Waiting for the application to acknowledge the frame.
    WaitProcessed,
    /// Clearing the markers after a frame.
    CompleteReset,
    /// Rolling back a rejected frame.
    ProcessError,
}

/// Phases of the block sub-machine run from [`HandlerState::HandleBlock`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum BlockPhase {
    /// Expecting the mask byte of a new block.
    #[default]
    BlockStart,
    /// Collecting the remaining bytes of a block.
    FillBlock,
    /// All eight bytes collected; verifying the checksum.
    CheckChecksum,
    /// Restoring high bits and writing the payload out.
    Demask,
    /// Counting the block as decoded.
    WaitAcknowledge,
    /// The checksum did not match.
    FailReset,
}

/// Decodes frames from raw bus bytes into an application buffer.
///
/// ## Type Parameters
///
/// - `B`: the application [`ByteBuffer`] decoded payloads are committed to
/// - `C`: the block [`Checksum`], [`Crc7`] by default
/// - `N`: capacity of the inbound buffer raw bytes are queued in
#[derive(Debug)]
pub struct FrameHandler<'a, B, C = Crc7, const N: usize = INBOUND_BUFFER_LEN>
where
    B: ByteBuffer,
    C: Checksum,
{
    state: HandlerState,
    phase: BlockPhase,
    inbound: RingBuffer<N>,
    application: B,
    listener: Option<&'a Signal>,
    checksum: C,
    markers: MarkerAccumulator,
    /// Block count announced by `Start1`.
    expected_blocks: u8,
    blocks_decoded: u8,
    /// Bytes seen between `Start2` and `End1`.
    payload_bytes: usize,
    working: [u8; BLOCK_LEN],
    position: usize,
    current: u8,
    decoded: [u8; BLOCK_DATA_LEN],
    discarding: bool,
    pending_error: Option<HandlerError>,
    last_error: Option<HandlerError>,

    /// Counter of frames committed to the application buffer.
    pub frames_received: u16,

    /// Counter of frames rolled back, whether rejected or abandoned.
    pub frames_rejected: u16,

    /// Counter of blocks restarted by an early mask byte.
    pub resyncs: u16,
}

impl<'a, B> FrameHandler<'a, B>
where
    B: ByteBuffer,
{
    /// Creates a handler committing to `application`, checksumming with [`Crc7`].
    pub fn new(application: B) -> Self {
        Self::with_checksum(application, Crc7)
    }
}

impl<'a, B, C, const N: usize> FrameHandler<'a, B, C, N>
where
    B: ByteBuffer,
    C: Checksum,
{
    /// Creates a handler committing to `application` with a custom checksum.
    pub fn with_checksum(application: B, checksum: C) -> Self {
        Self {
            state: HandlerState::Idle,
            phase: BlockPhase::BlockStart,
            inbound: RingBuffer::new(),
            application,
            listener: None,
            checksum,
            markers: MarkerAccumulator::new(),
            expected_blocks: 0,
            blocks_decoded: 0,
            payload_bytes: 0,
            working: [0; BLOCK_LEN],
            position: 0,
            current: 0,
            decoded: [0; BLOCK_DATA_LEN],
            discarding: false,
            pending_error: None,
            last_error: None,
            frames_received: 0,
            frames_rejected: 0,
            resyncs: 0,
        }
    }

    /// Returns the handler to its power-on state.
    ///
    /// Queued inbound bytes are dropped and a partially decoded frame is
    /// rolled back. Counters are kept.
    pub fn initialize(&mut self) {
        self.inbound.clear();
        self.abandon_frame();
        self.discarding = false;
        self.pending_error = None;
        self.last_error = None;
        self.state = HandlerState::Idle;
    }

    /// Replaces the application buffer, returning the previous one.
    ///
    /// A frame in progress is rolled back on the previous buffer, and the
    /// rest of its bytes are discarded.
    pub fn register_application_buffer(&mut self, application: B) -> B {
        let in_frame = !self.markers.is(Marker::None);
        self.abandon_frame();
        self.discarding = in_frame;
        self.state = HandlerState::Idle;
        mem::replace(&mut self.application, application)
    }

    /// Registers the signal raised for each committed frame.
    ///
    /// The handler waits for the signal to be acknowledged before decoding
    /// the next frame. Frames completed without a listener are rejected with
    /// [`HandlerError::ListenerNotRegistered`].
    pub fn register_application_listener(&mut self, listener: &'a Signal) {
        self.listener = Some(listener);
    }

    /// The application buffer.
    pub fn application_buffer(&self) -> &B {
        &self.application
    }

    /// The application buffer, for reading out committed payloads.
    pub fn application_buffer_mut(&mut self) -> &mut B {
        &mut self.application
    }

    /// Queues one raw byte received from the bus.
    ///
    /// Safe to call from a receive interrupt between polls.
    ///
    /// # Errors
    /// [`HandlerError::InboundWriteFailed`] if the inbound buffer is full.
    pub fn submit_byte(&mut self, byte: u8) -> Result<(), HandlerError> {
        self.inbound
            .put(byte)
            .map_err(|_| HandlerError::InboundWriteFailed)
    }

    /// Raw bytes queued and not yet consumed.
    pub fn pending_bytes(&self) -> usize {
        self.inbound.fill_level()
    }

    /// Current outer state.
    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Current phase of the block sub-machine.
    pub fn block_phase(&self) -> BlockPhase {
        self.phase
    }

    /// Control codes seen for the frame in progress.
    pub fn markers(&self) -> MarkerAccumulator {
        self.markers
    }

    /// The last error surfaced by [`poll()`](FrameHandler::poll).
    pub fn last_error(&self) -> Option<HandlerError> {
        self.last_error
    }

    /// Advances the state machine by one step.
    ///
    /// # Returns
    /// - `Ok(())`: a transition was made
    /// - `Err(nb::Error::WouldBlock)`: no bytes are queued, or the last
    ///   committed frame is not acknowledged yet
    /// - `Err(nb::Error::Other(e))`: the frame in progress was rolled back
    pub fn poll(&mut self) -> nb::Result<(), HandlerError> {
        let before = self.state;
        let result = self.step();
        if self.state != before {
            trace!("handler: {:?} -> {:?}", before, self.state);
        }
        result
    }

    fn step(&mut self) -> nb::Result<(), HandlerError> {
        match self.state {
            HandlerState::Idle => {
                self.reset_frame();
                self.state = HandlerState::WaitForBytes;
            }
            HandlerState::WaitForBytes => {
                if self.inbound.is_empty() {
                    return Err(nb::Error::WouldBlock);
                }
                self.state = HandlerState::GetByte;
            }
            HandlerState::GetByte => {
                let Some(byte) = self.inbound.get() else {
                    self.state = HandlerState::WaitForBytes;
                    return Err(nb::Error::WouldBlock);
                };
                self.dispatch(byte);
            }
            HandlerState::HandleBlock => self.handle_block(),
            HandlerState::CheckFinal => self.check_final(),
            HandlerState::WaitProcessed => {
                if self.listener.is_some_and(Signal::is_raised) {
                    return Err(nb::Error::WouldBlock);
                }
                self.state = HandlerState::CompleteReset;
            }
            HandlerState::CompleteReset => {
                self.markers.reset();
                self.state = HandlerState::Idle;
            }
            HandlerState::ProcessError => {
                let err = self
                    .pending_error
                    .take()
                    .unwrap_or(HandlerError::MarkerAccumulatorInvalid);
                if self.application.reversible_write_open() {
                    let _ = self.application.reverse_write();
                }
                self.frames_rejected = self.frames_rejected.wrapping_add(1);
                self.last_error = Some(err);
                self.discarding = true;
                warn!("handler: frame rejected: {:?}", err);
                self.state = HandlerState::CompleteReset;
                return Err(nb::Error::Other(err));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, byte: u8) {
        if let Some((code, count)) = ControlCode::classify(byte) {
            if self.discarding && code != ControlCode::Start1 {
                self.next_byte();
                return;
            }
            self.handle_control(code, count);
            return;
        }
        if self.discarding {
            self.next_byte();
            return;
        }
        match self.markers.marker() {
            Ok(Marker::None) => {
                trace!("handler: dropping stray byte {}", byte);
                self.next_byte();
            }
            Ok(Marker::PreStart) => self.fail(HandlerError::Start1WithoutStart2),
            Ok(Marker::Started) => {
                self.current = byte;
                self.state = HandlerState::HandleBlock;
            }
            Ok(Marker::PreFinish | Marker::Finished) => {
                self.fail(HandlerError::UnexpectedControlByte)
            }
            Err(err) => self.fail(err),
        }
    }

    fn handle_control(&mut self, code: ControlCode, count: u8) {
        if code == ControlCode::Start1 {
            if self.application.reversible_write_open() {
                warn!("handler: frame restarted, discarding partial frame");
                let _ = self.application.reverse_write();
                self.frames_rejected = self.frames_rejected.wrapping_add(1);
            }
            self.discarding = false;
            self.reset_frame();
            let _ = self.markers.observe(code);
            if count == 0 {
                self.fail(HandlerError::UnexpectedControlByte);
                return;
            }
            self.expected_blocks = count;
            self.next_byte();
            return;
        }

        if let Err(err) = self.markers.observe(code).and_then(|()| self.markers.marker()) {
            self.fail(err);
            return;
        }
        if count != self.expected_blocks {
            self.fail(HandlerError::UnexpectedControlByte);
            return;
        }

        match code {
            ControlCode::Start2 => {
                if self.application.open_reversible_write().is_err() {
                    self.fail(HandlerError::OutboundWriteFailed);
                    return;
                }
                self.phase = BlockPhase::BlockStart;
                self.position = 0;
            }
            ControlCode::End1 => {
                if self.position != 0 || self.blocks_decoded != self.expected_blocks {
                    self.fail(HandlerError::BlockIndexOutOfBounds);
                    return;
                }
            }
            ControlCode::End2 => {
                self.state = HandlerState::CheckFinal;
                return;
            }
            ControlCode::Start1 => {}
        }
        self.next_byte();
    }

    fn handle_block(&mut self) {
        match self.phase {
            BlockPhase::BlockStart | BlockPhase::FillBlock => self.collect(self.current),
            BlockPhase::CheckChecksum => {
                match Block::from_wire(&self.working).and_then(|b| b.decode(&self.checksum)) {
                    Ok(raw) => {
                        self.decoded = raw;
                        self.phase = BlockPhase::Demask;
                    }
                    Err(err) => {
                        warn!("handler: block {} rejected: {:?}", self.blocks_decoded, err);
                        self.phase = BlockPhase::FailReset;
                    }
                }
            }
            BlockPhase::Demask => {
                let decoded = self.decoded;
                for byte in decoded {
                    if self.application.put(byte).is_err() {
                        self.fail(HandlerError::OutboundWriteFailed);
                        return;
                    }
                }
                self.phase = BlockPhase::WaitAcknowledge;
            }
            BlockPhase::WaitAcknowledge => {
                self.blocks_decoded += 1;
                self.position = 0;
                self.phase = BlockPhase::BlockStart;
                self.next_byte();
            }
            BlockPhase::FailReset => {
                self.position = 0;
                self.phase = BlockPhase::BlockStart;
                self.fail(HandlerError::ChecksumMismatch);
            }
        }
    }

    fn collect(&mut self, byte: u8) {
        if is_block_start(byte) {
            if self.position > 0 {
                warn!("handler: block restarted after {} bytes", self.position);
                self.resyncs = self.resyncs.wrapping_add(1);
            }
            if self.blocks_decoded >= self.expected_blocks {
                self.fail(HandlerError::BlockIndexOutOfBounds);
                return;
            }
            self.position = 0;
        } else if self.position == 0 {
            self.fail(HandlerError::ReentrantBlock);
            return;
        }

        self.payload_bytes += 1;
        if self.payload_bytes > usize::from(self.expected_blocks) * BLOCK_LEN {
            self.fail(HandlerError::ExcessiveStuffing);
            return;
        }

        self.working[self.position] = byte;
        self.position += 1;
        if self.position == BLOCK_LEN {
            self.phase = BlockPhase::CheckChecksum;
        } else {
            self.phase = BlockPhase::FillBlock;
            self.next_byte();
        }
    }

    fn check_final(&mut self) {
        if let Err(err) = self.markers.marker() {
            self.fail(err);
            return;
        }
        let Some(listener) = self.listener else {
            self.fail(HandlerError::ListenerNotRegistered);
            return;
        };
        if self.application.commit_reversible_write().is_err() {
            self.fail(HandlerError::OutboundWriteFailed);
            return;
        }
        listener.raise();
        self.frames_received = self.frames_received.wrapping_add(1);
        debug!("handler: frame of {} blocks received", self.blocks_decoded);
        self.state = HandlerState::WaitProcessed;
    }

    fn fail(&mut self, err: HandlerError) {
        self.pending_error = Some(err);
        self.state = HandlerState::ProcessError;
    }

    fn next_byte(&mut self) {
        self.state = if self.inbound.is_empty() {
            HandlerState::WaitForBytes
        } else {
            HandlerState::GetByte
        };
    }

    fn abandon_frame(&mut self) {
        if self.application.reversible_write_open() {
            let _ = self.application.reverse_write();
        }
        self.markers.reset();
        self.reset_frame();
    }

    fn reset_frame(&mut self) {
        self.phase = BlockPhase::BlockStart;
        self.expected_blocks = 0;
        self.blocks_decoded = 0;
        self.payload_bytes = 0;
        self.position = 0;
    }
}

impl<'a, B, C, const N: usize> Poll for FrameHandler<'a, B, C, N>
where
    B: ByteBuffer,
    C: Checksum,
{
    type Error = HandlerError;

    fn poll(&mut self) -> nb::Result<(), HandlerError> {
        FrameHandler::poll(self)
    }
}

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;
    use crate::consts::{APPLICATION_BUFFER_LEN, MAX_FRAME_LEN, OUTBOUND_BUFFER_LEN};
    use crate::frame::encode_frame;
    use crate::writer::FrameWriter;

    type App = RingBuffer<APPLICATION_BUFFER_LEN>;

    /// Feeds `wire` byte by byte, polling until the handler runs dry.
    fn feed<B: ByteBuffer>(
        handler: &mut FrameHandler<'_, B>,
        wire: &[u8],
    ) -> Vec<HandlerError, 8> {
        let mut errors = Vec::new();
        for &b in wire {
            handler.submit_byte(b).unwrap();
            drive(handler, &mut errors);
        }
        errors
    }

    fn drive<B: ByteBuffer>(handler: &mut FrameHandler<'_, B>, errors: &mut Vec<HandlerError, 8>) {
        for _ in 0..64 {
            match handler.poll() {
                Ok(()) => {}
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => errors.push(e).unwrap(),
            }
        }
    }

    fn drain(buf: &mut App) -> Vec<u8, APPLICATION_BUFFER_LEN> {
        let mut out = Vec::new();
        while let Some(b) = buf.get() {
            out.push(b).unwrap();
        }
        out
    }

    fn frame(payload: &[u8]) -> Vec<u8, MAX_FRAME_LEN> {
        encode_frame(payload, &Crc7).unwrap()
    }

    #[test]
    fn test_handler_initialization() {
        let handler = FrameHandler::new(App::new());
        assert_eq!(handler.state(), HandlerState::Idle);
        assert_eq!(handler.block_phase(), BlockPhase::BlockStart);
        assert!(handler.markers().is(Marker::None));
        assert_eq!(handler.last_error(), None);
    }

    #[test]
    fn test_receives_single_block_frame() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);

        let errors = feed(
            &mut handler,
            &[0xC1, 0xD1, 0x8A, 0x19, 0x41, 0x7F, 0x00, 0x00, 0x7F, 0x01, 0xE1, 0xF1],
        );
        assert!(errors.is_empty());
        assert!(listener.is_raised());
        assert_eq!(handler.state(), HandlerState::WaitProcessed);
        assert_eq!(handler.frames_received, 1);
        assert_eq!(
            drain(handler.application_buffer_mut()),
            [0x41, 0xFF, 0x00, 0x80, 0x7F, 0x01]
        );
    }

    #[test]
    fn test_waits_for_acknowledge_before_next_frame() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);

        let mut both: Vec<u8, 64> = Vec::new();
        both.extend_from_slice(&frame(b"one")).unwrap();
        both.extend_from_slice(&frame(b"two")).unwrap();
        assert!(feed(&mut handler, &both).is_empty());
        assert_eq!(handler.frames_received, 1);
        assert_eq!(handler.poll(), Err(nb::Error::WouldBlock));

        listener.acknowledge();
        let mut errors = Vec::new();
        drive(&mut handler, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(handler.frames_received, 2);
        assert_eq!(
            drain(handler.application_buffer_mut()),
            *b"one\xFF\xFF\xFFtwo\xFF\xFF\xFF"
        );
    }

    #[test]
    fn test_checksum_failure_rolls_back_frame() {
        let listener = Signal::new();
        let mut app = App::new();
        app.put(0x99).unwrap();
        let mut handler = FrameHandler::new(app);
        handler.register_application_listener(&listener);

        let mut wire = frame(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        wire[2 + BLOCK_LEN + 4] ^= 0x10;
        let errors = feed(&mut handler, &wire);

        assert_eq!(errors, [HandlerError::ChecksumMismatch]);
        assert!(!listener.is_raised());
        assert_eq!(handler.frames_rejected, 1);
        assert_eq!(handler.application_buffer().fill_level(), 1);
        assert!(!handler.application_buffer().reversible_write_open());
    }

    #[test]
    fn test_recovers_after_rejected_frame() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);

        let mut bad = frame(b"bad!!!");
        bad[5] ^= 0x01;
        assert_eq!(feed(&mut handler, &bad), [HandlerError::ChecksumMismatch]);
        assert!(feed(&mut handler, &frame(b"good!!")).is_empty());
        assert_eq!(drain(handler.application_buffer_mut()), *b"good!!");
        assert_eq!(handler.frames_rejected, 1);
    }

    #[test]
    fn test_finished_before_prefinish_is_invalid() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);

        let wire = frame(b"abcdef");
        let mut reordered: Vec<u8, MAX_FRAME_LEN> = Vec::from_slice(&wire[..wire.len() - 2]).unwrap();
        reordered.push(0xF1).unwrap();
        assert_eq!(
            feed(&mut handler, &reordered),
            [HandlerError::MarkerAccumulatorInvalid]
        );
        assert!(!listener.is_raised());
        assert!(handler.application_buffer().is_empty());
    }

    #[test]
    fn test_stray_end_code_is_invalid() {
        let mut handler = FrameHandler::new(App::new());
        assert_eq!(
            feed(&mut handler, &[0xF1]),
            [HandlerError::MarkerAccumulatorInvalid]
        );
    }

    #[test]
    fn test_control_sequence_errors() {
        let cases: [(&[u8], HandlerError); 6] = [
            (&[0xC1, 0x05], HandlerError::Start1WithoutStart2),
            (&[0xC1, 0xD2], HandlerError::UnexpectedControlByte),
            (&[0xC0], HandlerError::UnexpectedControlByte),
            (&[0xC1, 0xD1, 0xD1], HandlerError::MarkerOutOfPositionSequence),
            (&[0xC1, 0xD1, 0x05], HandlerError::ReentrantBlock),
            (&[0xC2, 0xD2, 0xE2], HandlerError::BlockIndexOutOfBounds),
        ];
        for (wire, expected) in cases {
            let mut handler = FrameHandler::new(App::new());
            assert_eq!(feed(&mut handler, wire), [expected], "{wire:?}");
        }
    }

    #[test]
    fn test_extra_block_is_out_of_bounds() {
        let mut handler = FrameHandler::new(App::new());
        let wire = frame(b"abcdef");
        let mut extra: Vec<u8, MAX_FRAME_LEN> = Vec::from_slice(&wire[..2 + BLOCK_LEN]).unwrap();
        extra.extend_from_slice(&wire[2..2 + BLOCK_LEN]).unwrap();
        assert_eq!(
            feed(&mut handler, &extra),
            [HandlerError::BlockIndexOutOfBounds]
        );
    }

    #[test]
    fn test_noise_inside_frame_exceeds_stuffing_limit() {
        let mut handler = FrameHandler::new(App::new());
        let wire = frame(b"resync");
        let mut noisy: Vec<u8, MAX_FRAME_LEN> = Vec::from_slice(&wire[..2]).unwrap();
        noisy.extend_from_slice(&[0x80, 0x11, 0x22]).unwrap();
        noisy.extend_from_slice(&wire[2..]).unwrap();

        assert_eq!(
            feed(&mut handler, &noisy),
            [HandlerError::ExcessiveStuffing]
        );
        assert_eq!(handler.resyncs, 1);
        assert!(handler.application_buffer().is_empty());
    }

    #[test]
    fn test_lost_bytes_resync_on_next_block() {
        let mut handler = FrameHandler::new(App::new());
        let wire = frame(b"twelve bytes");
        let second_block = 2 + BLOCK_LEN;
        let mut lossy: Vec<u8, MAX_FRAME_LEN> = Vec::from_slice(&wire[..second_block - 3]).unwrap();
        lossy.extend_from_slice(&wire[second_block..]).unwrap();

        assert_eq!(
            feed(&mut handler, &lossy),
            [HandlerError::BlockIndexOutOfBounds]
        );
        assert_eq!(handler.resyncs, 1);
        assert!(handler.application_buffer().is_empty());
    }

    #[test]
    fn test_noise_between_frames_is_dropped() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);

        let mut wire: Vec<u8, 64> = Vec::from_slice(&[0x00, 0x7F, 0x55]).unwrap();
        wire.extend_from_slice(&frame(b"quiet!")).unwrap();
        assert!(feed(&mut handler, &wire).is_empty());
        assert_eq!(drain(handler.application_buffer_mut()), *b"quiet!");
    }

    #[test]
    fn test_start1_restarts_frame_in_progress() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);

        let first = frame(b"lost..");
        let mut wire: Vec<u8, 64> = Vec::from_slice(&first[..6]).unwrap();
        wire.extend_from_slice(&frame(b"kept!!")).unwrap();
        assert!(feed(&mut handler, &wire).is_empty());
        assert_eq!(handler.frames_rejected, 1);
        assert_eq!(drain(handler.application_buffer_mut()), *b"kept!!");
    }

    #[test]
    fn test_missing_listener_rejects_frame() {
        let mut handler = FrameHandler::new(App::new());
        assert_eq!(
            feed(&mut handler, &frame(b"nobody")),
            [HandlerError::ListenerNotRegistered]
        );
        assert!(handler.application_buffer().is_empty());
    }

    #[test]
    fn test_full_application_buffer_fails_outbound_write() {
        let listener = Signal::new();
        let mut handler: FrameHandler<'_, RingBuffer<4>> = FrameHandler::new(RingBuffer::new());
        handler.register_application_listener(&listener);
        assert_eq!(
            feed(&mut handler, &frame(b"sixsix")),
            [HandlerError::OutboundWriteFailed]
        );
        assert!(handler.application_buffer().is_empty());
    }

    #[test]
    fn test_full_inbound_buffer_rejects_submit() {
        let mut handler: FrameHandler<'_, App, Crc7, 2> =
            FrameHandler::with_checksum(App::new(), Crc7);
        handler.submit_byte(0).unwrap();
        handler.submit_byte(0).unwrap();
        assert_eq!(handler.submit_byte(0), Err(HandlerError::InboundWriteFailed));
        assert_eq!(handler.pending_bytes(), 2);
    }

    #[test]
    fn test_register_application_buffer_rolls_back() {
        let listener = Signal::new();
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&listener);
        let wire = frame(b"abcdefgh");
        assert!(feed(&mut handler, &wire[..2 + BLOCK_LEN]).is_empty());

        let previous = handler.register_application_buffer(App::new());
        assert!(previous.is_empty());
        assert!(!previous.reversible_write_open());

        assert!(feed(&mut handler, &wire[2 + BLOCK_LEN..]).is_empty());
        assert!(feed(&mut handler, &frame(b"after!")).is_empty());
        assert_eq!(drain(handler.application_buffer_mut()), *b"after!");
    }

    #[test]
    fn test_writer_to_handler_loopback() {
        let sent = Signal::new();
        let received = Signal::new();
        let mut writer = FrameWriter::new(RingBuffer::<OUTBOUND_BUFFER_LEN>::new());
        writer.register_send_listener(&sent);
        let mut handler = FrameHandler::new(App::new());
        handler.register_application_listener(&received);

        let payload = [0x00, 0x7F, 0x80, 0xC0, 0xD5, 0xE0, 0xFF];
        writer.open().unwrap();
        for &b in &payload {
            writer.write(b).unwrap();
        }
        writer.close().unwrap();
        writer.trigger().unwrap();

        for _ in 0..500 {
            if sent.take() {
                break;
            }
            let _ = writer.poll();
            while let Some(b) = writer.outbound_mut().get() {
                handler.submit_byte(b).unwrap();
            }
            let _ = handler.poll();
        }
        let mut errors = Vec::new();
        drive(&mut handler, &mut errors);

        assert!(errors.is_empty());
        assert!(received.take());
        let got = drain(handler.application_buffer_mut());
        assert_eq!(&got[..payload.len()], &payload);
        assert!(got[payload.len()..].iter().all(|&b| b == 0xFF));
        assert_eq!(got.len(), 12);
    }
}
