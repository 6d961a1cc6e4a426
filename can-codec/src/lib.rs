//! CAN Signal Codec Library
//!
//! Table-driven encoding and decoding of raw CAN frames, plus a scheduler that
//! transmits periodic messages at their declared cadence.
//!
//! # Architecture
//!
//! - A [`MessageCatalog`] is built once from schema data (usually a DBC file)
//!   and validated up front: overlapping signals, out-of-frame bit ranges and
//!   dangling value-table references are rejected before any frame is touched.
//! - [`SignalCodec`] is a pure, lock-free engine that packs and unpacks signals
//!   in both Intel and Motorola bit numbering through one shared bit resolver.
//! - [`TransmissionScheduler`] runs one timer per periodic message on tokio and
//!   funnels every write through a single dispatcher that owns the [`BusSink`].
//! - [`link`] frames CAN traffic for the telemetry radio.
//!
//! The library does NOT:
//! - Talk to CAN hardware (bring your own [`BusSink`])
//! - Merge schemas across files (each file is its own catalog)
//! - Handle multiplexed signals
//!
//! # Example Usage
//!
//! ```no_run
//! use can_codec::{load_catalog, Frame, RangePolicy, SignalValues};
//! use std::path::Path;
//!
//! let catalog = load_catalog(Path::new("bms.dbc")).unwrap();
//!
//! // Decode a received frame
//! let frame = Frame::from_bytes(0x340, &[0x0A, 0x00]);
//! let decoded = catalog.decode(&frame).unwrap();
//! for signal in &decoded.signals {
//!     println!("{} = {} {}", signal.name, signal.physical, signal.unit.as_deref().unwrap_or(""));
//! }
//!
//! // Encode physical values into a frame
//! let mut values = SignalValues::new();
//! values.insert("Max_Charge_Power".to_string(), 150.0);
//! let frame = catalog.encode(0x310, &values, RangePolicy::Fail).unwrap();
//! println!("{}", frame);
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod layout;
pub mod link;
pub mod scheduler;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use codec::SignalCodec;
pub use config::{RangePolicy, SchedulerConfig};
pub use layout::{resolve_bit_positions, BitPosition};
pub use link::{decode_batch, encode_batch, BatchingLinkSink, LinkBatcher, LinkRecord, LinkSink};
pub use scheduler::{
    BusSink, SchedulerEvent, StaticValues, TimerState, TransmissionScheduler, ValueSource,
};
pub use signals::dbc::{load_catalog, parse_dbc_file, parse_dbc_str};
pub use signals::{
    ByteOrder, CatalogStats, MessageCatalog, MessageDefinition, SchemaInput, SignalDefinition,
    SignalValues, ValueTable, ValueType,
};
pub use types::{
    BusError, DecodeError, DecodedMessage, DecodedSignal, EncodeError, Frame, LinkError,
    SchedulerError, SchemaError, SchemaResult, SignalValue, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty schema builds an empty catalog
        let catalog = MessageCatalog::build(SchemaInput::default()).unwrap();
        let stats = catalog.stats();
        assert_eq!(stats.num_messages, 0);
        assert!(catalog.lookup(0x100).is_none());
    }
}
