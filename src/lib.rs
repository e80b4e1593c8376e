//! # busframe
//!
//! A portable, no_std framing engine for byte-oriented embedded serial buses.
//!
//! Payloads are cut into 6-byte blocks, each carried on the wire as a mask
//! byte, a CRC-7 checksum and six 7-bit data bytes. Bytes with the high bit
//! set are reserved for framing, so a receiver can always find frame and block
//! boundaries, even after losing bytes. This crate implements:
//! - a poll-driven [`FrameWriter`](writer::FrameWriter) that turns queued
//!   payloads into frames
//! - a poll-driven [`FrameHandler`](handler::FrameHandler) that validates
//!   incoming frames and commits them atomically into an application buffer
//! - one-shot [`encode_frame`](frame::encode_frame) and
//!   [`decode_frame`](frame::decode_frame) for hosts and test vectors
//! - optional poll sources using either timer interrupts or blocking delay
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support |
//! | `delay-loop`          | Uses `embedded_hal::delay::DelayNs` to pace polling |
//! | `timer-isr` (default) | Uses `critical_section::with` to share engines with an ISR |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Wire Format
//!
//! ```text
//! 0xC0|n  0xD0|n  [mask crc d0 d1 d2 d3 d4 d5] x n  0xE0|n  0xF0|n
//! ```
//!
//! - `n` is the block count, 1..=15, so a frame carries at most 90 bytes
//! - the final block is padded with `0xFF`
//!
//! ## Usage
//!
//! ```rust
//! use busframe::buffer::{ByteBuffer, RingBuffer};
//! use busframe::handler::FrameHandler;
//! use busframe::signal::Signal;
//! use busframe::writer::FrameWriter;
//!
//! let received = Signal::new();
//! let mut writer = FrameWriter::new(RingBuffer::<124>::new());
//! let mut handler = FrameHandler::new(RingBuffer::<90>::new());
//! handler.register_application_listener(&received);
//!
//! writer.open().unwrap();
//! for &b in b"ping" {
//!     writer.write(b).unwrap();
//! }
//! writer.close().unwrap();
//! writer.trigger().unwrap();
//!
//! // Called from a timer tick in firmware; the bus is a wire here.
//! while !received.is_raised() {
//!     let _ = writer.poll();
//!     while let Some(b) = writer.outbound_mut().get() {
//!         handler.submit_byte(b).unwrap();
//!     }
//!     let _ = handler.poll();
//! }
//!
//! let app = handler.application_buffer_mut();
//! assert_eq!(app.get(), Some(b'p'));
//! received.acknowledge();
//! ```
//!
//! ## Integration Notes
//!
//! - Poll each engine at least once per byte time of the bus; see
//!   [`timer::byte_period_us`]
//! - [`FrameHandler::submit_byte`](handler::FrameHandler::submit_byte) may be
//!   called from a receive ISR when the handler lives in a
//!   [`timer::GlobalEngine`]
//! - Only one instance of each engine should drive a given bus
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub use heapless;

pub mod buffer;
pub mod consts;
pub mod crc;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod handler;
pub mod markers;
pub mod signal;
pub mod timer;
pub mod writer;

pub use buffer::{ByteBuffer, RingBuffer};
pub use error::{BufferError, CodecError, HandlerError, WriterError};
pub use handler::FrameHandler;
pub use signal::Signal;
pub use writer::FrameWriter;
