//! Core types for the CAN codec library
//!
//! This module defines the values that flow through the codec (frames, decoded
//! signals) and every error type the library can return. Definitions of messages
//! and signals live in [`crate::signals`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used for scheduler events
pub type Timestamp = DateTime<Utc>;

/// Result type for catalog construction
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Highest identifier representable in a standard (11-bit) frame
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Highest identifier representable in an extended (29-bit) frame
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Largest payload of a classic CAN frame
pub const MAX_FRAME_BYTES: usize = 8;

/// Raw CAN frame: an identifier and exactly `byte_length` payload bytes
///
/// Produced by encoding, consumed by decoding. Frames are plain values owned by
/// whoever created them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// CAN message ID (11-bit or 29-bit)
    pub id: u32,
    /// Frame data bytes
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a zero-filled frame of the given length
    pub fn new(id: u32, byte_length: usize) -> Self {
        Self {
            id,
            data: vec![0; byte_length],
        }
    }

    /// Create a frame from received bytes
    pub fn from_bytes(id: u32, data: &[u8]) -> Self {
        Self {
            id,
            data: data.to_vec(),
        }
    }

    /// Number of payload bytes (the data length code for classic CAN)
    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    /// True if the identifier needs the 29-bit extended format
    pub fn is_extended(&self) -> bool {
        self.id > MAX_STANDARD_ID
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "0x{:08X} [{}]", self.id, self.data.len())?;
        } else {
            write!(f, "0x{:03X} [{}]", self.id, self.data.len())?;
        }
        for byte in &self.data {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

/// A decoded signal with its physical value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedSignal {
    /// Signal name from the message definition
    pub name: String,
    /// Raw integer extracted from the frame (sign-extended for signed signals)
    pub raw_value: i128,
    /// Physical value: `raw * scale + offset`
    pub physical: f64,
    /// Engineering unit (e.g., "kW", "Amphours", "V")
    pub unit: Option<String>,
    /// Label from the signal's value table, if the raw value has an entry
    pub label: Option<String>,
}

impl DecodedSignal {
    /// The value a consumer should display: the label when one resolved,
    /// otherwise the numeric physical value
    pub fn value(&self) -> SignalValue {
        match &self.label {
            Some(label) => SignalValue::Label(label.clone()),
            None => SignalValue::Physical(self.physical),
        }
    }
}

/// The resolved value of a decoded signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    /// Scaled engineering value
    Physical(f64),
    /// Enumerated state label from a value table
    Label(String),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Physical(v) => write!(f, "{}", v),
            SignalValue::Label(label) => write!(f, "{}", label),
        }
    }
}

impl SignalValue {
    /// Numeric value, if this is not a label
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Physical(v) => Some(*v),
            SignalValue::Label(_) => None,
        }
    }

    /// Label text, if one resolved
    pub fn as_label(&self) -> Option<&str> {
        match self {
            SignalValue::Physical(_) => None,
            SignalValue::Label(label) => Some(label),
        }
    }
}

/// All signals decoded from one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    /// CAN message ID
    pub id: u32,
    /// Message name from the catalog
    pub name: String,
    /// Decoded signals, in definition order
    pub signals: Vec<DecodedSignal>,
}

impl DecodedMessage {
    /// Find a decoded signal by name
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// Errors raised while building a message catalog
///
/// These are fatal: a catalog is either fully valid or not built at all.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate message ID 0x{0:X}")]
    DuplicateMessageId(u32),

    #[error("Duplicate message name '{name}' (0x{first:X} and 0x{second:X})")]
    DuplicateMessageName { name: String, first: u32, second: u32 },

    #[error("Duplicate signal '{signal}' in message 0x{message_id:X}")]
    DuplicateSignalName { message_id: u32, signal: String },

    #[error("Signal '{signal}' in message 0x{message_id:X} exceeds the {byte_length}-byte frame")]
    SignalOutOfBounds {
        message_id: u32,
        signal: String,
        byte_length: usize,
    },

    #[error("Signals '{first}' and '{second}' overlap in message 0x{message_id:X}")]
    OverlappingSignals {
        message_id: u32,
        first: String,
        second: String,
    },

    #[error("Signal '{signal}' in message 0x{message_id:X} references undefined value table '{table}'")]
    UndefinedValueTable {
        message_id: u32,
        signal: String,
        table: String,
    },

    #[error("Duplicate value table '{0}'")]
    DuplicateValueTable(String),

    #[error("Duplicate raw value {raw} in value table '{table}'")]
    DuplicateValueTableKey { table: String, raw: i64 },

    #[error("Invalid message 0x{message_id:X}: {reason}")]
    InvalidMessage { message_id: u32, reason: String },

    #[error("Invalid signal '{signal}' in message 0x{message_id:X}: {reason}")]
    InvalidSignal {
        message_id: u32,
        signal: String,
        reason: String,
    },

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while encoding physical values into a frame
///
/// No partial frame is ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("Value {value} for signal '{signal}' is out of range")]
    OutOfRange { signal: String, value: f64 },

    #[error("Value for signal '{0}' is not a finite number")]
    NotFinite(String),

    #[error("Message not found: CAN ID 0x{0:X}")]
    UnknownMessage(u32),

    #[error("Signal '{signal}' not found in message 0x{message_id:X}")]
    UnknownSignal { message_id: u32, signal: String },
}

/// Errors raised while decoding a frame
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Frame 0x{message_id:X} has {actual} bytes, expected {expected}")]
    LengthMismatch {
        message_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Message not found: CAN ID 0x{0:X}")]
    UnknownMessage(u32),
}

/// Failure reported by a bus transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Bus write failed: {0}")]
pub struct BusError(pub String);

/// Errors raised while framing or parsing radio-link batches
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Batch does not begin with the start marker")]
    BadStartMarker,

    #[error("Batch end marker missing or corrupt")]
    BadEndMarker,

    #[error("Batch checksum mismatch: expected 0x{expected:04X}, computed 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Batch truncated")]
    Truncated,

    #[error("Frame 0x{id:X} carries {len} bytes, at most 8 fit a record")]
    FrameTooLong { id: u32, len: usize },

    #[error("Batch of {0} records exceeds the 16-bit record count")]
    TooManyRecords(usize),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => LinkError::Truncated,
            _ => LinkError::Io(e.to_string()),
        }
    }
}

/// Errors raised by the transmission scheduler
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler has been stopped")]
    Stopped,

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Message not found: CAN ID 0x{0:X}")]
    UnknownMessage(u32),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
