//! Scheduling helpers for the framing engines.
//!
//! Both [`FrameWriter`](crate::writer::FrameWriter) and
//! [`FrameHandler`](crate::handler::FrameHandler) are advanced by polling,
//! and both implement [`Poll`]. This module offers two ways to drive them:
//! an interrupt service routine using `critical_section::with` (`timer-isr`
//! feature), or a blocking delay loop (`delay-loop` feature).
//!
//! Contains:
//! - `byte_period_us`: time on the wire of one UART byte
//! - `compute_poll_ocr`: compare value for a timer polling once per byte
//! - `run_poll_loop` and `poll_until`: delay driven loops (feature `delay-loop`)
//! - `global_engine_poll` and `poll_bus_engine!()`: interrupt-based poll
//!   wrappers (feature `timer-isr`)
//!
//! Compare values for a 16 MHz CPU: (For use with `compute_poll_ocr`)
//!
//! | BAUD    | PRESCALER | OCR | Poll Interval |
//! |---------|-----------|-----|---------------|
//! |   9 600 |        64 | 260 |      1.04 ms  |
//! |  19 200 |        64 | 130 |       520 µs  |
//! |  57 600 |         8 | 347 |       174 µs  |
//! | 115 200 |         8 | 174 |        87 µs  |

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;

/// A state machine advanced one transition per call.
pub trait Poll {
    /// Error reported when the machine drops the unit of work in flight.
    type Error;

    /// Performs at most one transition.
    ///
    /// `Err(nb::Error::WouldBlock)` means there is nothing to do until
    /// more input arrives or a listener is acknowledged.
    fn poll(&mut self) -> nb::Result<(), Self::Error>;
}

/// Bit times per byte with 8N1 framing (start + 8 data + stop).
pub const BITS_PER_BYTE: u32 = 10;
/// 1,000,000 microseconds = 1 second
pub const MICROSECONDS_PER_SECOND: u32 = 1_000_000;

/// Time one byte occupies on the wire, rounded up to whole microseconds.
///
/// A `baud` of zero is treated as one.
pub const fn byte_period_us(baud: u32) -> u32 {
    let baud = if baud == 0 { 1 } else { baud };
    (BITS_PER_BYTE * MICROSECONDS_PER_SECOND).div_ceil(baud)
}

/// Computes the OCR value for an AVR timer (CTC mode) that fires once per
/// received byte.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
/// - `baud`: UART baud rate of the bus
///
/// # Returns
/// - OCR value for OCRnA, rounded to the nearest integer and saturated at
///   `u16::MAX`
pub const fn compute_poll_ocr(f_cpu: u32, prescaler: u32, baud: u32) -> u16 {
    let divisor = prescaler as u64 * baud as u64;
    if divisor == 0 {
        return u16::MAX;
    }
    let ticks = (f_cpu as u64 * BITS_PER_BYTE as u64 + divisor / 2) / divisor;
    if ticks > u16::MAX as u64 {
        u16::MAX
    } else {
        ticks as u16
    }
}
