//! Whole-frame encoding and decoding.
//!
//! These functions perform in one call what [`FrameWriter`](crate::writer::FrameWriter)
//! and [`FrameHandler`](crate::handler::FrameHandler) do one poll at a time.
//! They are handy for building test vectors, for hosts that talk to the bus
//! through an ordinary serial port, and as the reference the engines are
//! checked against.
//!
//! Frame layout:
//! - `Start1 (0xC0 | n)`, `Start2 (0xD0 | n)`
//! - `n` blocks of 8 bytes, see [`crate::encoding`]
//! - `End1 (0xE0 | n)`, `End2 (0xF0 | n)`

use heapless::Vec;

use crate::consts::{BLOCK_DATA_LEN, BLOCK_LEN, MAX_BLOCKS, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};
use crate::crc::Checksum;
use crate::encoding::Block;
use crate::error::{HandlerError, WriterError};
use crate::markers::ControlCode;

/// Number of blocks needed to carry `payload_len` bytes.
///
/// An empty payload still occupies one (all padding) block.
pub fn block_count(payload_len: usize) -> usize {
    payload_len.div_ceil(BLOCK_DATA_LEN).max(1)
}

/// Encodes `payload` into a complete frame.
///
/// # Errors
/// [`WriterError::PayloadTooLarge`] if the payload needs more than 15 blocks.
pub fn encode_frame<C: Checksum>(
    payload: &[u8],
    checksum: &C,
) -> Result<Vec<u8, MAX_FRAME_LEN>, WriterError> {
    let blocks = block_count(payload.len());
    if blocks > MAX_BLOCKS as usize {
        return Err(WriterError::PayloadTooLarge);
    }
    let n = blocks as u8;

    let mut out = Vec::new();
    out.push(ControlCode::Start1.encode(n))
        .map_err(|_| WriterError::BufferFull)?;
    out.push(ControlCode::Start2.encode(n))
        .map_err(|_| WriterError::BufferFull)?;
    for i in 0..blocks {
        let start = (i * BLOCK_DATA_LEN).min(payload.len());
        let end = (start + BLOCK_DATA_LEN).min(payload.len());
        let block = Block::encode(&payload[start..end], checksum);
        out.extend_from_slice(&block.to_wire())
            .map_err(|_| WriterError::BufferFull)?;
    }
    out.push(ControlCode::End1.encode(n))
        .map_err(|_| WriterError::BufferFull)?;
    out.push(ControlCode::End2.encode(n))
        .map_err(|_| WriterError::BufferFull)?;
    Ok(out)
}

fn expect_code(byte: u8, code: ControlCode, count: u8) -> Result<(), HandlerError> {
    match ControlCode::classify(byte) {
        Some((found, n)) if found == code && n == count => Ok(()),
        Some((found, _)) if found == code => Err(HandlerError::UnexpectedControlByte),
        Some(_) => Err(HandlerError::MarkerAccumulatorInvalid),
        None if code == ControlCode::Start2 => Err(HandlerError::Start1WithoutStart2),
        None => Err(HandlerError::UnexpectedControlByte),
    }
}

/// Decodes one complete frame.
///
/// The returned payload includes the padding of the final block; see
/// [`crate::encoding`].
///
/// # Errors
/// The [`HandlerError`] the frame handler would report for the same bytes.
pub fn decode_frame<C: Checksum>(
    wire: &[u8],
    checksum: &C,
) -> Result<Vec<u8, MAX_PAYLOAD_LEN>, HandlerError> {
    if wire.len() < 4 {
        return Err(HandlerError::BlockIndexOutOfBounds);
    }
    let n = match ControlCode::classify(wire[0]) {
        Some((ControlCode::Start1, n)) if n > 0 => n,
        Some((ControlCode::Start1, _)) => return Err(HandlerError::UnexpectedControlByte),
        _ => return Err(HandlerError::MarkerAccumulatorInvalid),
    };
    expect_code(wire[1], ControlCode::Start2, n)?;
    expect_code(wire[wire.len() - 2], ControlCode::End1, n)?;
    expect_code(wire[wire.len() - 1], ControlCode::End2, n)?;

    let body = &wire[2..wire.len() - 2];
    let expected = n as usize * BLOCK_LEN;
    if body.len() > expected {
        return Err(HandlerError::ExcessiveStuffing);
    }
    if body.len() < expected {
        return Err(HandlerError::BlockIndexOutOfBounds);
    }

    let mut payload = Vec::new();
    for chunk in body.chunks_exact(BLOCK_LEN) {
        let mut bytes = [0; BLOCK_LEN];
        bytes.copy_from_slice(chunk);
        let raw = Block::from_wire(&bytes)?.decode(checksum)?;
        payload
            .extend_from_slice(&raw)
            .map_err(|_| HandlerError::OutboundWriteFailed)?;
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::Crc7;

    fn padded(payload: &[u8]) -> Vec<u8, MAX_PAYLOAD_LEN> {
        let mut out: Vec<u8, MAX_PAYLOAD_LEN> = Vec::from_slice(payload).unwrap();
        while out.len() < block_count(payload.len()) * BLOCK_DATA_LEN {
            out.push(0xFF).unwrap();
        }
        out
    }

    #[test]
    fn test_single_block_frame_layout() {
        let frame = encode_frame(&[0x41, 0xFF, 0x00, 0x80, 0x7F, 0x01], &Crc7).unwrap();
        assert_eq!(
            frame,
            [0xC1, 0xD1, 0x8A, 0x19, 0x41, 0x7F, 0x00, 0x00, 0x7F, 0x01, 0xE1, 0xF1]
        );
    }

    #[test]
    fn test_seven_bytes_need_two_blocks() {
        let frame = encode_frame(&[1, 2, 3, 4, 5, 6, 7], &Crc7).unwrap();
        assert_eq!(frame.len(), 4 + 2 * BLOCK_LEN);
        assert_eq!(frame[0], 0xC2);
        assert_eq!(frame[1], 0xD2);
        let second = &frame[2 + BLOCK_LEN..2 + 2 * BLOCK_LEN];
        assert_eq!(second[0], 0x80 | 0b0011_1110);
        assert_eq!(&second[2..], &[7, 0x7F, 0x7F, 0x7F, 0x7F, 0x7F]);
        assert_eq!(&frame[frame.len() - 2..], &[0xE2, 0xF2]);
    }

    #[test]
    fn test_round_trip_all_lengths() {
        let mut source = [0u8; MAX_PAYLOAD_LEN];
        for (i, b) in source.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(0x55);
        }
        for len in 0..=MAX_PAYLOAD_LEN {
            let payload = &source[..len];
            let frame = encode_frame(payload, &Crc7).unwrap();
            assert_eq!(decode_frame(&frame, &Crc7).unwrap(), padded(payload), "len {len}");
        }
    }

    #[test]
    fn test_empty_payload_is_one_padding_block() {
        let frame = encode_frame(&[], &Crc7).unwrap();
        assert_eq!(frame.len(), 4 + BLOCK_LEN);
        assert_eq!(decode_frame(&frame, &Crc7).unwrap(), [0xFF; 6]);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode_frame(&payload, &Crc7),
            Err(WriterError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_frame_bytes_never_look_like_control_codes() {
        let payload: [u8; 12] = [0xC0, 0xD0, 0xE0, 0xF0, 0xFF, 0x80, 0xC5, 0xD5, 0xE5, 0xF5, 0xBF, 0x7F];
        let frame = encode_frame(&payload, &Crc7).unwrap();
        let body = &frame[2..frame.len() - 2];
        assert!(body.iter().all(|&b| ControlCode::classify(b).is_none()));
    }

    #[test]
    fn test_decode_detects_corruption() {
        let mut frame = encode_frame(&[1, 2, 3, 4, 5, 6], &Crc7).unwrap();
        frame[5] ^= 0x01;
        assert_eq!(
            decode_frame(&frame, &Crc7),
            Err(HandlerError::ChecksumMismatch)
        );
    }

    #[test]
    fn test_decode_structural_errors() {
        let frame = encode_frame(&[1, 2, 3, 4, 5, 6, 7], &Crc7).unwrap();

        let mut missing_start2 = frame.clone();
        missing_start2[1] = 0x10;
        assert_eq!(
            decode_frame(&missing_start2, &Crc7),
            Err(HandlerError::Start1WithoutStart2)
        );

        let mut wrong_count = frame.clone();
        wrong_count[1] = 0xD3;
        assert_eq!(
            decode_frame(&wrong_count, &Crc7),
            Err(HandlerError::UnexpectedControlByte)
        );

        let mut truncated: Vec<u8, MAX_FRAME_LEN> = Vec::from_slice(&frame[..2 + BLOCK_LEN]).unwrap();
        truncated.extend_from_slice(&[0xE2, 0xF2]).unwrap();
        assert_eq!(
            decode_frame(&truncated, &Crc7),
            Err(HandlerError::BlockIndexOutOfBounds)
        );

        let mut swapped = frame.clone();
        let last = swapped.len() - 1;
        swapped.swap(last - 1, last);
        assert_eq!(
            decode_frame(&swapped, &Crc7),
            Err(HandlerError::MarkerAccumulatorInvalid)
        );
    }
}
