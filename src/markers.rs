//! Control codes and the marker accumulator.
//!
//! Four control codes delimit a frame: `Start1 (0xC_)`, `Start2 (0xD_)`,
//! `End1 (0xE_)` and `End2 (0xF_)`, the low nibble of each carrying the
//! block count. While receiving, the handler folds every control code it
//! sees into a [`MarkerAccumulator`]; only the strictly ordered prefixes
//! `0, 1, 3, 7, 15` are legal.

use crate::consts::{CONTROL_COUNT_MASK, CONTROL_KIND_MASK};
use crate::error::HandlerError;

/// One of the four reserved frame delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum ControlCode {
    /// First start code, `0xC0 | n`.
    Start1 = 0xC0,
    /// Second start code, `0xD0 | n`.
    Start2 = 0xD0,
    /// First end code, `0xE0 | n`.
    End1 = 0xE0,
    /// Second end code, `0xF0 | n`.
    End2 = 0xF0,
}

impl ControlCode {
    /// Splits a byte into its control code and block count, or `None` if the
    /// byte is not a control code.
    pub fn classify(byte: u8) -> Option<(ControlCode, u8)> {
        let code = match byte & CONTROL_KIND_MASK {
            0xC0 => ControlCode::Start1,
            0xD0 => ControlCode::Start2,
            0xE0 => ControlCode::End1,
            0xF0 => ControlCode::End2,
            _ => return None,
        };
        Some((code, byte & CONTROL_COUNT_MASK))
    }

    /// The wire byte for this code announcing `count` blocks.
    ///
    /// Only the low nibble of `count` is used.
    pub fn encode(self, count: u8) -> u8 {
        self as u8 | (count & CONTROL_COUNT_MASK)
    }

    fn marker_bit(self) -> u8 {
        match self {
            ControlCode::Start1 => 0b0001,
            ControlCode::Start2 => 0b0010,
            ControlCode::End1 => 0b0100,
            ControlCode::End2 => 0b1000,
        }
    }
}

/// The legal values of a [`MarkerAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum Marker {
    /// No control code seen yet.
    #[default]
    None = 0,
    /// `Start1` seen.
    PreStart = 1,
    /// `Start1, Start2` seen; blocks are being received.
    Started = 3,
    /// `End1` seen after the blocks.
    PreFinish = 7,
    /// The frame is delimited completely.
    Finished = 15,
}

/// Cumulative record of the control codes seen for the frame in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct MarkerAccumulator(u8);

impl MarkerAccumulator {
    /// An empty accumulator.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw accumulated bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Folds a control code into the accumulator.
    ///
    /// `Start1` always restarts the sequence. Any other code ORs its bit in,
    /// failing with [`HandlerError::MarkerOutOfPositionSequence`] if that
    /// bit was already set. The result may still be an illegal combination;
    /// check it with [`marker`](MarkerAccumulator::marker).
    pub fn observe(&mut self, code: ControlCode) -> Result<(), HandlerError> {
        if code == ControlCode::Start1 {
            self.0 = Marker::PreStart as u8;
            return Ok(());
        }
        if self.0 & code.marker_bit() != 0 {
            return Err(HandlerError::MarkerOutOfPositionSequence);
        }
        self.0 |= code.marker_bit();
        Ok(())
    }

    /// The current marker, or [`HandlerError::MarkerAccumulatorInvalid`] if
    /// the accumulated codes arrived out of order.
    pub fn marker(self) -> Result<Marker, HandlerError> {
        match self.0 {
            0 => Ok(Marker::None),
            1 => Ok(Marker::PreStart),
            3 => Ok(Marker::Started),
            7 => Ok(Marker::PreFinish),
            15 => Ok(Marker::Finished),
            _ => Err(HandlerError::MarkerAccumulatorInvalid),
        }
    }

    /// Whether the accumulator holds a legal value.
    pub fn is_valid(self) -> bool {
        self.marker().is_ok()
    }

    /// Whether the accumulator currently equals `marker`.
    pub fn is(self, marker: Marker) -> bool {
        self.0 == marker as u8
    }

    /// Forgets every code seen.
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
