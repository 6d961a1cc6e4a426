//! Bit layout resolution
//!
//! Translates a signal's declared `start_bit`/`bit_length`/byte order into the
//! concrete byte and bit positions it occupies in a frame. Encoding, decoding and
//! catalog validation all go through [`resolve_bit_positions`], so the two
//! numbering conventions are handled in exactly one place.
//!
//! Both conventions number bits the same way inside the frame: bit `n` is bit
//! `n % 8` (0 = LSB) of byte `n / 8`. They differ in what `start_bit` names and
//! in which direction the field grows:
//!
//! - Intel (little-endian): `start_bit` is the field's LSB and the field grows
//!   upward through consecutive bit numbers.
//! - Motorola (big-endian): `start_bit` is the field's MSB. Less significant bits
//!   run downward inside the byte and wrap to bit 7 of the *next* byte
//!   (the "sawtooth" numbering used by DBC files).

use crate::signals::ByteOrder;

/// One bit of a signal inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitPosition {
    /// Byte index in the frame payload
    pub byte_index: usize,
    /// Bit index inside that byte (0 = least significant)
    pub bit_index: u8,
}

impl BitPosition {
    fn from_linear(bit: usize) -> Self {
        Self {
            byte_index: bit / 8,
            bit_index: (bit % 8) as u8,
        }
    }

    /// Linear bit number (`byte_index * 8 + bit_index`)
    pub fn linear(&self) -> usize {
        self.byte_index * 8 + self.bit_index as usize
    }
}

/// Resolve the positions a field occupies, ordered from its least significant
/// bit to its most significant bit
///
/// Element `i` of the result holds bit `i` of the raw value.
pub fn resolve_bit_positions(
    start_bit: u16,
    bit_length: u16,
    byte_order: ByteOrder,
) -> Vec<BitPosition> {
    let start = start_bit as usize;
    let length = bit_length as usize;

    match byte_order {
        ByteOrder::LittleEndian => (start..start + length)
            .map(BitPosition::from_linear)
            .collect(),
        ByteOrder::BigEndian => {
            let mut positions = Vec::with_capacity(length);
            let mut bit = start;
            for _ in 0..length {
                positions.push(BitPosition::from_linear(bit));
                if bit % 8 == 0 {
                    bit += 15;
                } else {
                    bit -= 1;
                }
            }
            // Walked MSB first; callers expect LSB first
            positions.reverse();
            positions
        }
    }
}

/// Bitmask of every linear bit a field occupies, or `None` if any bit falls
/// outside a frame of `byte_length` bytes
///
/// Only meaningful for classic frames (at most 64 bits).
pub(crate) fn occupancy_mask(positions: &[BitPosition], byte_length: usize) -> Option<u64> {
    let mut mask = 0u64;
    for position in positions {
        if position.byte_index >= byte_length || position.linear() >= 64 {
            return None;
        }
        mask |= 1u64 << position.linear();
    }
    Some(mask)
}
