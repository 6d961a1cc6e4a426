//! Signal encoding and decoding engine
//!
//! Packs physical values into raw CAN frames and extracts them again, based on
//! signal definitions from the message catalog. Handles bit placement for both
//! byte orders, sign extension, linear scaling, range enforcement and value-table
//! resolution. Everything here is pure: no state, no locks.

use crate::config::RangePolicy;
use crate::layout::resolve_bit_positions;
use crate::signals::database::{MessageDefinition, SignalDefinition, SignalValues, ValueTable};
use crate::types::{DecodeError, DecodedMessage, DecodedSignal, EncodeError, Frame};

/// Signal codec - converts between physical values and frame bits
pub struct SignalCodec;

impl SignalCodec {
    /// Decode every signal of a message from a frame
    ///
    /// Fails only if the frame length does not match the message definition.
    pub fn decode_message(
        message: &MessageDefinition,
        frame: &Frame,
    ) -> Result<DecodedMessage, DecodeError> {
        if frame.data.len() != message.byte_length {
            return Err(DecodeError::LengthMismatch {
                message_id: message.id,
                expected: message.byte_length,
                actual: frame.data.len(),
            });
        }

        let signals = message
            .signals
            .iter()
            .map(|signal| {
                Self::decode_signal(&frame.data, signal, message.value_table(&signal.name))
            })
            .collect();

        Ok(DecodedMessage {
            id: message.id,
            name: message.name.clone(),
            signals,
        })
    }

    /// Encode a message from physical values
    ///
    /// Signals missing from `values` are left as raw zero. A name in `values`
    /// that the message does not define is rejected, as is any value that does
    /// not fit under `policy`.
    pub fn encode_message(
        message: &MessageDefinition,
        values: &SignalValues,
        policy: RangePolicy,
    ) -> Result<Frame, EncodeError> {
        if let Some(unknown) = values.keys().find(|name| message.signal(name).is_none()) {
            return Err(EncodeError::UnknownSignal {
                message_id: message.id,
                signal: unknown.clone(),
            });
        }

        let mut frame = Frame::new(message.id, message.byte_length);
        for signal in &message.signals {
            if let Some(physical) = values.get(&signal.name) {
                Self::encode_signal(&mut frame.data, signal, *physical, policy)?;
            }
        }

        log::trace!("Encoded message {} -> {}", message.name, frame);
        Ok(frame)
    }

    /// Decode a single signal from frame data
    ///
    /// An unknown raw value against the value table is not an error: the
    /// signal simply carries no label.
    pub fn decode_signal(
        data: &[u8],
        signal: &SignalDefinition,
        table: Option<&ValueTable>,
    ) -> DecodedSignal {
        let raw_value = Self::decode_raw(data, signal);
        let physical = Self::raw_to_physical(signal, raw_value);
        let label = table
            .and_then(|t| t.label(raw_value))
            .map(str::to_string);

        DecodedSignal {
            name: signal.name.clone(),
            raw_value,
            physical,
            unit: if signal.unit.is_empty() {
                None
            } else {
                Some(signal.unit.clone())
            },
            label,
        }
    }

    /// Encode a physical value into frame data
    ///
    /// Only the signal's own bits are modified.
    pub fn encode_signal(
        data: &mut [u8],
        signal: &SignalDefinition,
        physical: f64,
        policy: RangePolicy,
    ) -> Result<(), EncodeError> {
        let raw = Self::physical_to_raw(signal, physical, policy)?;
        Self::encode_raw(data, signal, raw)
    }

    /// Extract the raw integer for a signal, sign-extended if signed
    ///
    /// Bits beyond the end of `data` read as zero.
    pub fn decode_raw(data: &[u8], signal: &SignalDefinition) -> i128 {
        let positions =
            resolve_bit_positions(signal.start_bit, signal.bit_length, signal.byte_order);

        let mut bits: u64 = 0;
        for (i, position) in positions.iter().enumerate() {
            if let Some(byte) = data.get(position.byte_index) {
                let bit_value = (byte >> position.bit_index) & 0x01;
                bits |= (bit_value as u64) << i;
            }
        }

        if signal.is_signed() {
            Self::sign_extend(bits, signal.bit_length as usize) as i128
        } else {
            bits as i128
        }
    }

    /// Write a raw integer into a signal's bits (read-modify-write)
    ///
    /// Fails if `raw` is not representable in the signal's width and signedness.
    pub fn encode_raw(
        data: &mut [u8],
        signal: &SignalDefinition,
        raw: i128,
    ) -> Result<(), EncodeError> {
        let (min, max) = Self::raw_range(signal);
        if raw < min || raw > max {
            return Err(EncodeError::OutOfRange {
                signal: signal.name.clone(),
                value: raw as f64,
            });
        }

        // Two's complement bit pattern, truncated to the field by the loop below
        let bits = raw as u64;
        let positions =
            resolve_bit_positions(signal.start_bit, signal.bit_length, signal.byte_order);

        for (i, position) in positions.iter().enumerate() {
            if let Some(byte) = data.get_mut(position.byte_index) {
                let mask = 1u8 << position.bit_index;
                if (bits >> i) & 0x01 != 0 {
                    *byte |= mask;
                } else {
                    *byte &= !mask;
                }
            }
        }

        Ok(())
    }

    /// Inclusive raw range a signal can represent
    pub fn raw_range(signal: &SignalDefinition) -> (i128, i128) {
        let bits = signal.bit_length as u32;
        if signal.is_signed() {
            let half = 1i128 << (bits - 1);
            (-half, half - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    /// Apply the linear conversion `raw * scale + offset`
    pub fn raw_to_physical(signal: &SignalDefinition, raw: i128) -> f64 {
        raw as f64 * signal.scale + signal.offset
    }

    /// Invert the linear conversion, rounding half away from zero
    ///
    /// Under [`RangePolicy::Fail`] a value outside the enforced physical bounds,
    /// or one whose raw form does not fit the field, is rejected. Under
    /// [`RangePolicy::Clamp`] it is saturated instead.
    pub fn physical_to_raw(
        signal: &SignalDefinition,
        physical: f64,
        policy: RangePolicy,
    ) -> Result<i128, EncodeError> {
        if !physical.is_finite() {
            return Err(EncodeError::NotFinite(signal.name.clone()));
        }

        let out_of_range = || EncodeError::OutOfRange {
            signal: signal.name.clone(),
            value: physical,
        };

        let mut value = physical;
        if let Some((min, max)) = signal.physical_bounds() {
            if value < min || value > max {
                match policy {
                    RangePolicy::Fail => return Err(out_of_range()),
                    RangePolicy::Clamp => value = value.clamp(min, max),
                }
            }
        }

        // f64::round rounds half away from zero
        let raw = ((value - signal.offset) / signal.scale).round();
        let (min_raw, max_raw) = Self::raw_range(signal);

        if raw < min_raw as f64 || raw > max_raw as f64 {
            return match policy {
                RangePolicy::Fail => Err(out_of_range()),
                RangePolicy::Clamp if raw < min_raw as f64 => Ok(min_raw),
                RangePolicy::Clamp => Ok(max_raw),
            };
        }

        // Rounding the upper bound of a 64-bit field up to 2^64 lands here
        let raw = raw as i128;
        Ok(raw.clamp(min_raw, max_raw))
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// If the value's MSB is 1, fill the upper bits with 1s.
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}
