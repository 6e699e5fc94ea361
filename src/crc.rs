//! CRC-24 engine for Mode S frames
//!
//! Every Mode S downlink carries a 24-bit CRC in its last three bytes,
//! computed with the generator polynomial 0x1FFF409. The byte table and the
//! per-bit syndrome tables used for single-bit repair are all derived from
//! the polynomial at compile time.

use crate::frame::{LONG_FRAME_BITS, LONG_FRAME_BYTES, SHORT_FRAME_BITS, SHORT_FRAME_BYTES};

/// Mode S generator polynomial, 25 bits.
const GENERATOR: u32 = 0x1FF_F409;

/// Returned by [`checksum`] for inputs that are neither short nor long
/// frames. Wider than 24 bits, so it can never collide with a real
/// checksum.
pub const CHECKSUM_INVALID: u32 = 0x0F00_0000;

/// Byte-at-a-time CRC table.
const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut crc = (n as u32) << 16;
        let mut k = 0;
        while k < 8 {
            crc = if crc & 0x80_0000 != 0 {
                ((crc << 1) ^ GENERATOR) & 0xFF_FFFF
            } else {
                (crc << 1) & 0xFF_FFFF
            };
            k += 1;
        }
        table[n] = crc;
        n += 1;
    }
    table
}

/// Syndromes of single-bit errors in a 112-bit frame, indexed by the
/// flipped bit's position. The first five entries are zero: an error inside
/// the DF field cannot be trusted and is never corrected.
pub const LONG_FRAME_SYNDROMES: [u32; LONG_FRAME_BITS] = bit_syndromes::<LONG_FRAME_BITS>();

/// Single-bit error syndromes for 56-bit frames.
pub const SHORT_FRAME_SYNDROMES: [u32; SHORT_FRAME_BITS] = bit_syndromes::<SHORT_FRAME_BITS>();

const fn bit_syndromes<const BITS: usize>() -> [u32; BITS] {
    let mut table = [0u32; BITS];

    // A flip in the parity region leaves the checksum alone and toggles
    // the matching bit of the received parity.
    let mut i = BITS - 24;
    while i < BITS {
        table[i] = 1u32 << (BITS - 1 - i);
        i += 1;
    }

    // A flip of data bit i contributes x^(BITS-1-i) mod G, walked up from
    // the last data bit (x^24 mod G is the generator's low 24 bits).
    let mut acc = GENERATOR & 0xFF_FFFF;
    let mut i = BITS - 24;
    loop {
        i -= 1;
        table[i] = acc;
        if i == 0 {
            break;
        }
        acc = if acc & 0x80_0000 != 0 {
            ((acc << 1) ^ GENERATOR) & 0xFF_FFFF
        } else {
            (acc << 1) & 0xFF_FFFF
        };
    }

    // DF field positions are reserved.
    let mut i = 0;
    while i < 5 {
        table[i] = 0;
        i += 1;
    }

    table
}

/// Calculate the Mode S checksum over a frame's data bits.
///
/// Accepts 7- or 14-byte frames and processes every byte except the final
/// three, which hold the transmitted parity. Any other length returns
/// [`CHECKSUM_INVALID`].
pub fn checksum(frame: &[u8]) -> u32 {
    if frame.len() != SHORT_FRAME_BYTES && frame.len() != LONG_FRAME_BYTES {
        return CHECKSUM_INVALID;
    }

    let mut crc = 0u32;
    for &byte in &frame[..frame.len() - 3] {
        let idx = (((crc >> 16) ^ u32::from(byte)) & 0xFF) as usize;
        crc = ((crc << 8) & 0xFF_FFFF) ^ CRC_TABLE[idx];
    }
    crc
}

/// Read the transmitted parity: the last three bytes, big-endian.
pub fn transmitted_parity(frame: &[u8]) -> u32 {
    debug_assert!(frame.len() == SHORT_FRAME_BYTES || frame.len() == LONG_FRAME_BYTES);
    let n = frame.len();
    (u32::from(frame[n - 3]) << 16) | (u32::from(frame[n - 2]) << 8) | u32::from(frame[n - 1])
}

/// Computed checksum XOR transmitted parity.
///
/// Zero means an error-free frame on parity/interrogator downlinks; on
/// address/parity downlinks the syndrome of a correctly received frame is
/// the transmitter's ICAO address.
pub fn syndrome(frame: &[u8]) -> u32 {
    checksum(frame) ^ transmitted_parity(frame)
}

/// Locate the single flipped bit that accounts for `syndrome` in a frame of
/// `frame_len` bytes.
///
/// Returns the 0-based bit position within the frame, or `None` when no
/// single-bit error matches. The reserved DF-field positions hold zero in
/// the tables and are never reported.
pub fn error_bit(frame_len: usize, syndrome: u32) -> Option<usize> {
    let table: &[u32] = match frame_len {
        LONG_FRAME_BYTES => &LONG_FRAME_SYNDROMES,
        SHORT_FRAME_BYTES => &SHORT_FRAME_SYNDROMES,
        _ => return None,
    };
    if syndrome == 0 {
        return None;
    }
    table.iter().position(|&s| s == syndrome)
}
