//! Message catalog
//!
//! Message, signal and value-table definitions, and the validated catalog that
//! owns them. A catalog is built once from a [`SchemaInput`] and is read-only
//! afterwards, so it can be shared freely between threads.

use crate::codec::SignalCodec;
use crate::config::RangePolicy;
use crate::layout::{occupancy_mask, resolve_bit_positions};
use crate::types::{
    DecodeError, DecodedMessage, EncodeError, Frame, SchemaError, SchemaResult, MAX_EXTENDED_ID,
    MAX_FRAME_BYTES, MAX_STANDARD_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Flag bit some tools (and DBC files) set on extended identifiers
pub const EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// Physical values keyed by signal name, as supplied to the encoder
pub type SignalValues = HashMap<String, f64>;

/// A CAN message definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDefinition {
    /// CAN message ID (11-bit, or 29-bit when above 0x7FF)
    pub id: u32,
    /// Message name
    pub name: String,
    /// Frame payload size in bytes (1-8)
    pub byte_length: usize,
    /// Transmitting node name (informational)
    pub transmitter: Option<String>,
    /// Transmission period in milliseconds (0 = sent on request only)
    pub cycle_time_ms: u64,
    /// All signals in this message, in definition order
    pub signals: Vec<SignalDefinition>,
    /// Value tables resolved by the catalog, keyed by signal name
    #[serde(skip)]
    value_tables: HashMap<String, ValueTable>,
}

impl MessageDefinition {
    /// Create an aperiodic message with no signals
    pub fn new(id: u32, name: impl Into<String>, byte_length: usize) -> Self {
        Self {
            id,
            name: name.into(),
            byte_length,
            transmitter: None,
            cycle_time_ms: 0,
            signals: Vec::new(),
            value_tables: HashMap::new(),
        }
    }

    /// Builder method: set the transmitting node
    pub fn with_transmitter(mut self, transmitter: impl Into<String>) -> Self {
        self.transmitter = Some(transmitter.into());
        self
    }

    /// Builder method: set the transmission period
    pub fn with_cycle_time(mut self, cycle_time_ms: u64) -> Self {
        self.cycle_time_ms = cycle_time_ms;
        self
    }

    /// Builder method: append a signal
    pub fn with_signal(mut self, signal: SignalDefinition) -> Self {
        self.signals.push(signal);
        self
    }

    /// Find a signal by name
    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Value table attached to a signal of this message
    pub fn value_table(&self, signal_name: &str) -> Option<&ValueTable> {
        self.value_tables.get(signal_name)
    }

    /// True if the scheduler should transmit this message periodically
    pub fn is_periodic(&self) -> bool {
        self.cycle_time_ms > 0
    }
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Length in bits
    pub bit_length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub scale: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value (`0|0` bounds are not enforced)
    pub physical_min: f64,
    /// Maximum physical value
    pub physical_max: f64,
    /// Engineering unit (e.g., "kW", "V"); empty if none
    pub unit: String,
    /// Name of the value table describing this signal's raw values
    pub value_table: Option<String>,
    /// Receiving node names (informational)
    pub receivers: Vec<String>,
}

impl SignalDefinition {
    /// Create an unsigned, unscaled signal
    pub fn new(
        name: impl Into<String>,
        start_bit: u16,
        bit_length: u16,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            name: name.into(),
            start_bit,
            bit_length,
            byte_order,
            value_type: ValueType::Unsigned,
            scale: 1.0,
            offset: 0.0,
            physical_min: 0.0,
            physical_max: 0.0,
            unit: String::new(),
            value_table: None,
            receivers: Vec::new(),
        }
    }

    /// Builder method: mark the signal as two's-complement signed
    pub fn signed(mut self) -> Self {
        self.value_type = ValueType::Signed;
        self
    }

    /// Builder method: set the linear conversion
    pub fn with_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Builder method: set the enforced physical range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.physical_min = min;
        self.physical_max = max;
        self
    }

    /// Builder method: set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Builder method: reference a value table by name
    pub fn with_value_table(mut self, table: impl Into<String>) -> Self {
        self.value_table = Some(table.into());
        self
    }

    /// True for two's-complement signals
    pub fn is_signed(&self) -> bool {
        self.value_type == ValueType::Signed
    }

    /// The physical range to enforce, or `None` when declared as `0|0`
    pub fn physical_bounds(&self) -> Option<(f64, f64)> {
        if self.physical_min == 0.0 && self.physical_max == 0.0 {
            None
        } else {
            Some((self.physical_min, self.physical_max))
        }
    }
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Enumeration of raw values to state labels for one signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTable {
    name: String,
    entries: BTreeMap<i64, String>,
}

impl ValueTable {
    /// Create a table, rejecting duplicate raw keys
    pub fn new<I, S>(name: impl Into<String>, entries: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        let name = name.into();
        let mut map = BTreeMap::new();
        for (raw, label) in entries {
            if map.insert(raw, label.into()).is_some() {
                return Err(SchemaError::DuplicateValueTableKey { table: name, raw });
            }
        }
        Ok(Self { name, entries: map })
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label for a raw value
    pub fn label(&self, raw: i128) -> Option<&str> {
        let raw = i64::try_from(raw).ok()?;
        self.entries.get(&raw).map(String::as_str)
    }

    /// Raw value carrying the given label
    pub fn raw_for_label(&self, label: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(raw, _)| *raw)
    }

    /// Entries in ascending raw order
    pub fn entries(&self) -> impl Iterator<Item = (i64, &str)> {
        self.entries.iter().map(|(raw, label)| (*raw, label.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed schema content handed to [`MessageCatalog::build`]
#[derive(Debug, Clone, Default)]
pub struct SchemaInput {
    /// Message definitions
    pub messages: Vec<MessageDefinition>,
    /// Value tables referenced by signals, by table name
    pub value_tables: Vec<ValueTable>,
    /// Where the schema came from (file name), for logging
    pub source: String,
}

/// The validated, immutable message catalog
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    /// All message definitions by CAN ID
    messages: HashMap<u32, MessageDefinition>,

    /// Message name lookup
    names: HashMap<String, u32>,

    /// Where the schema came from
    source: String,
}

impl MessageCatalog {
    /// Validate a schema and build the catalog
    pub fn build(input: SchemaInput) -> SchemaResult<Self> {
        let SchemaInput {
            messages: definitions,
            value_tables,
            source,
        } = input;

        let mut tables: HashMap<String, ValueTable> = HashMap::new();
        for table in value_tables {
            if tables.contains_key(table.name()) {
                return Err(SchemaError::DuplicateValueTable(table.name().to_string()));
            }
            tables.insert(table.name().to_string(), table);
        }

        let mut messages = HashMap::with_capacity(definitions.len());
        let mut names = HashMap::with_capacity(definitions.len());

        for mut message in definitions {
            validate_message(&message)?;

            // Each signal gets its own copy, so tables never leak across messages
            let mut resolved = HashMap::new();
            for signal in &message.signals {
                if let Some(table_name) = &signal.value_table {
                    let table = tables.get(table_name).ok_or_else(|| {
                        SchemaError::UndefinedValueTable {
                            message_id: message.id,
                            signal: signal.name.clone(),
                            table: table_name.clone(),
                        }
                    })?;
                    resolved.insert(signal.name.clone(), table.clone());
                }
            }
            message.value_tables = resolved;

            if messages.contains_key(&message.id) {
                return Err(SchemaError::DuplicateMessageId(message.id));
            }
            if let Some(&first) = names.get(&message.name) {
                return Err(SchemaError::DuplicateMessageName {
                    name: message.name.clone(),
                    first,
                    second: message.id,
                });
            }
            names.insert(message.name.clone(), message.id);
            messages.insert(message.id, message);
        }

        log::info!(
            "Built catalog from {}: {} messages",
            if source.is_empty() { "<memory>" } else { source.as_str() },
            messages.len()
        );

        Ok(Self {
            messages,
            names,
            source,
        })
    }

    /// Get a message definition by CAN ID
    pub fn lookup(&self, id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&id)
    }

    /// Get a message definition for an identifier as reported by a bus adapter
    ///
    /// Tries the exact ID, then the 29-bit masked form. The 11-bit masked form
    /// is only tried for IDs carrying [`EXTENDED_ID_FLAG`], so an unknown
    /// standard ID never aliases onto another message.
    pub fn lookup_frame_id(&self, raw_id: u32) -> Option<&MessageDefinition> {
        self.lookup(raw_id)
            .or_else(|| self.lookup(raw_id & MAX_EXTENDED_ID))
            .or_else(|| {
                if raw_id & EXTENDED_ID_FLAG != 0 {
                    self.lookup(raw_id & MAX_STANDARD_ID)
                } else {
                    None
                }
            })
    }

    /// Get a message definition by name
    pub fn lookup_by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.names.get(name).and_then(|id| self.messages.get(id))
    }

    /// Value table scoped to one (message, signal) pair
    pub fn value_table(&self, id: u32, signal_name: &str) -> Option<&ValueTable> {
        self.lookup(id).and_then(|m| m.value_table(signal_name))
    }

    /// All messages in ascending ID order
    pub fn messages(&self) -> Vec<&MessageDefinition> {
        let mut messages: Vec<&MessageDefinition> = self.messages.values().collect();
        messages.sort_unstable_by_key(|m| m.id);
        messages
    }

    /// Messages with a nonzero cycle time, in ascending ID order
    pub fn periodic_messages(&self) -> Vec<&MessageDefinition> {
        self.messages()
            .into_iter()
            .filter(|m| m.is_periodic())
            .collect()
    }

    /// Where the schema came from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Decode a frame using the message registered for its ID
    pub fn decode(&self, frame: &Frame) -> Result<DecodedMessage, DecodeError> {
        let message = self
            .lookup_frame_id(frame.id)
            .ok_or(DecodeError::UnknownMessage(frame.id))?;
        SignalCodec::decode_message(message, frame)
    }

    /// Encode physical values into a frame for the given message ID
    pub fn encode(
        &self,
        id: u32,
        values: &SignalValues,
        policy: RangePolicy,
    ) -> Result<Frame, EncodeError> {
        let message = self.lookup(id).ok_or(EncodeError::UnknownMessage(id))?;
        SignalCodec::encode_message(message, values, policy)
    }

    /// Get catalog statistics
    pub fn stats(&self) -> CatalogStats {
        let num_signals = self.messages.values().map(|m| m.signals.len()).sum();
        let num_periodic = self.messages.values().filter(|m| m.is_periodic()).count();
        let num_value_tables = self.messages.values().map(|m| m.value_tables.len()).sum();

        CatalogStats {
            num_messages: self.messages.len(),
            num_signals,
            num_periodic,
            num_value_tables,
        }
    }
}

/// Catalog statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
    /// Messages with a nonzero cycle time
    pub num_periodic: usize,
    /// Value tables attached to signals
    pub num_value_tables: usize,
}

fn validate_message(message: &MessageDefinition) -> SchemaResult<()> {
    let invalid = |reason: String| SchemaError::InvalidMessage {
        message_id: message.id,
        reason,
    };

    if message.id > MAX_EXTENDED_ID {
        return Err(invalid("identifier exceeds 29 bits".to_string()));
    }
    if message.byte_length == 0 || message.byte_length > MAX_FRAME_BYTES {
        return Err(invalid(format!(
            "byte length {} outside 1-{}",
            message.byte_length, MAX_FRAME_BYTES
        )));
    }

    let mut occupied: Vec<(&str, u64)> = Vec::with_capacity(message.signals.len());

    for signal in &message.signals {
        validate_signal(message.id, signal)?;

        if occupied.iter().any(|(name, _)| *name == signal.name) {
            return Err(SchemaError::DuplicateSignalName {
                message_id: message.id,
                signal: signal.name.clone(),
            });
        }

        let positions =
            resolve_bit_positions(signal.start_bit, signal.bit_length, signal.byte_order);
        let mask = occupancy_mask(&positions, message.byte_length).ok_or_else(|| {
            SchemaError::SignalOutOfBounds {
                message_id: message.id,
                signal: signal.name.clone(),
                byte_length: message.byte_length,
            }
        })?;

        if let Some((other, _)) = occupied.iter().find(|(_, m)| m & mask != 0) {
            return Err(SchemaError::OverlappingSignals {
                message_id: message.id,
                first: other.to_string(),
                second: signal.name.clone(),
            });
        }
        occupied.push((signal.name.as_str(), mask));
    }

    Ok(())
}

fn validate_signal(message_id: u32, signal: &SignalDefinition) -> SchemaResult<()> {
    let invalid = |reason: &str| SchemaError::InvalidSignal {
        message_id,
        signal: signal.name.clone(),
        reason: reason.to_string(),
    };

    if signal.start_bit > 63 {
        return Err(invalid("start bit above 63"));
    }
    if signal.bit_length == 0 || signal.bit_length > 64 {
        return Err(invalid("bit length outside 1-64"));
    }
    if signal.scale == 0.0 || !signal.scale.is_finite() {
        return Err(invalid("scale must be finite and nonzero"));
    }
    if !signal.offset.is_finite() {
        return Err(invalid("offset must be finite"));
    }
    if let Some((min, max)) = signal.physical_bounds() {
        if !(min <= max) {
            return Err(invalid("physical minimum above maximum"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_message() -> MessageDefinition {
        MessageDefinition::new(0x123, "EngineData", 8)
            .with_transmitter("ECU1")
            .with_cycle_time(100)
            .with_signal(
                SignalDefinition::new("EngineSpeed", 0, 16, ByteOrder::LittleEndian)
                    .with_range(0.0, 8000.0)
                    .with_unit("rpm"),
            )
            .with_signal(
                SignalDefinition::new("EngineTemp", 16, 8, ByteOrder::LittleEndian)
                    .with_scaling(1.0, -40.0),
            )
    }

    fn build(
        messages: Vec<MessageDefinition>,
        tables: Vec<ValueTable>,
    ) -> SchemaResult<MessageCatalog> {
        MessageCatalog::build(SchemaInput {
            messages,
            value_tables: tables,
            source: "test".to_string(),
        })
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = build(vec![], vec![]).unwrap();
        let stats = catalog.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
        assert!(catalog.lookup(0x123).is_none());
    }

    #[test]
    fn test_build_and_lookup() {
        let catalog = build(vec![engine_message()], vec![]).unwrap();

        let stats = catalog.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 2);
        assert_eq!(stats.num_periodic, 1);

        let msg = catalog.lookup(0x123).unwrap();
        assert_eq!(msg.name, "EngineData");
        assert_eq!(msg.signals[0].name, "EngineSpeed");
        assert_eq!(catalog.lookup_by_name("EngineData").unwrap().id, 0x123);
        assert_eq!(catalog.periodic_messages().len(), 1);
    }

    #[test]
    fn test_duplicate_message_id() {
        let result = build(vec![engine_message(), engine_message()], vec![]);
        assert!(matches!(result, Err(SchemaError::DuplicateMessageId(0x123))));
    }

    #[test]
    fn test_duplicate_signal_name() {
        let msg = MessageDefinition::new(0x10, "Dup", 8)
            .with_signal(SignalDefinition::new("A", 0, 8, ByteOrder::LittleEndian))
            .with_signal(SignalDefinition::new("A", 8, 8, ByteOrder::LittleEndian));
        let result = build(vec![msg], vec![]);
        assert!(matches!(result, Err(SchemaError::DuplicateSignalName { .. })));
    }

    #[test]
    fn test_signal_exceeds_frame() {
        let msg = MessageDefinition::new(0x10, "Short", 2)
            .with_signal(SignalDefinition::new("Wide", 8, 16, ByteOrder::LittleEndian));
        let result = build(vec![msg], vec![]);
        assert!(matches!(
            result,
            Err(SchemaError::SignalOutOfBounds { byte_length: 2, .. })
        ));
    }

    #[test]
    fn test_overlapping_signals() {
        let msg = MessageDefinition::new(0x10, "Overlap", 8)
            .with_signal(SignalDefinition::new("A", 0, 12, ByteOrder::LittleEndian))
            .with_signal(SignalDefinition::new("B", 8, 8, ByteOrder::LittleEndian));
        match build(vec![msg], vec![]) {
            Err(SchemaError::OverlappingSignals { first, second, .. }) => {
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("expected overlap error, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_byte_order_overlap_detected() {
        // Motorola field at start 7 occupies all of byte 0
        let msg = MessageDefinition::new(0x10, "Mixed", 8)
            .with_signal(SignalDefinition::new("Intel", 4, 4, ByteOrder::LittleEndian))
            .with_signal(SignalDefinition::new("Moto", 7, 8, ByteOrder::BigEndian));
        assert!(matches!(
            build(vec![msg], vec![]),
            Err(SchemaError::OverlappingSignals { .. })
        ));
    }

    #[test]
    fn test_undefined_value_table() {
        let msg = MessageDefinition::new(0x10, "Status", 1).with_signal(
            SignalDefinition::new("State", 0, 4, ByteOrder::LittleEndian)
                .with_value_table("Missing"),
        );
        assert!(matches!(
            build(vec![msg], vec![]),
            Err(SchemaError::UndefinedValueTable { .. })
        ));
    }

    #[test]
    fn test_invalid_definitions() {
        let zero_len = MessageDefinition::new(0x10, "Empty", 0);
        assert!(matches!(
            build(vec![zero_len], vec![]),
            Err(SchemaError::InvalidMessage { .. })
        ));

        let bad_scale = MessageDefinition::new(0x10, "Scale", 8).with_signal(
            SignalDefinition::new("S", 0, 8, ByteOrder::LittleEndian).with_scaling(0.0, 0.0),
        );
        assert!(matches!(
            build(vec![bad_scale], vec![]),
            Err(SchemaError::InvalidSignal { .. })
        ));

        let too_wide_id = MessageDefinition::new(0x2000_0000, "Wide", 8);
        assert!(matches!(
            build(vec![too_wide_id], vec![]),
            Err(SchemaError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn test_value_table_scoped_per_message() {
        let states = ValueTable::new("A.State", vec![(0, "OFF"), (1, "ON")]).unwrap();
        let other = ValueTable::new("B.State", vec![(0, "IDLE")]).unwrap();
        let a = MessageDefinition::new(0x10, "A", 1).with_signal(
            SignalDefinition::new("State", 0, 4, ByteOrder::LittleEndian)
                .with_value_table("A.State"),
        );
        let b = MessageDefinition::new(0x11, "B", 1).with_signal(
            SignalDefinition::new("State", 0, 4, ByteOrder::LittleEndian)
                .with_value_table("B.State"),
        );
        let catalog = build(vec![a, b], vec![states, other]).unwrap();

        assert_eq!(catalog.value_table(0x10, "State").unwrap().label(1), Some("ON"));
        assert_eq!(catalog.value_table(0x11, "State").unwrap().label(1), None);
        assert_eq!(catalog.stats().num_value_tables, 2);
    }

    #[test]
    fn test_value_table_duplicates() {
        let result = ValueTable::new("T", vec![(1, "A"), (1, "B")]);
        assert!(matches!(
            result,
            Err(SchemaError::DuplicateValueTableKey { raw: 1, .. })
        ));

        let t1 = ValueTable::new("T", vec![(1, "A")]).unwrap();
        let t2 = ValueTable::new("T", vec![(2, "B")]).unwrap();
        assert!(matches!(
            build(vec![], vec![t1, t2]),
            Err(SchemaError::DuplicateValueTable(_))
        ));
    }

    #[test]
    fn test_value_table_reverse_lookup() {
        let table = ValueTable::new("T", vec![(3, "MPPT_CHARGING"), (0, "IDLE")]).unwrap();
        assert_eq!(table.raw_for_label("MPPT_CHARGING"), Some(3));
        assert_eq!(table.raw_for_label("RESERVED"), None);
        let raws: Vec<i64> = table.entries().map(|(raw, _)| raw).collect();
        assert_eq!(raws, vec![0, 3]);
    }

    #[test]
    fn test_lookup_frame_id_masks_extended_flag() {
        let msg = MessageDefinition::new(0x0CF1_1E05, "MotorData", 8);
        let catalog = build(vec![msg], vec![]).unwrap();
        assert!(catalog.lookup_frame_id(0x8CF1_1E05).is_some());
        assert!(catalog.lookup_frame_id(0x0CF1_1E05).is_some());
        assert!(catalog.lookup_frame_id(0x0CF1_1E06).is_none());
    }

    #[test]
    fn test_unknown_standard_id_not_aliased() {
        let msg = MessageDefinition::new(0x310, "BMS_Limits", 8);
        let catalog = build(vec![msg], vec![]).unwrap();

        // 0xB10 & 0x7FF == 0x310, but a standard ID is matched exactly
        let frame = Frame::from_bytes(0xB10, &[0; 8]);
        assert!(matches!(
            catalog.decode(&frame),
            Err(DecodeError::UnknownMessage(0xB10))
        ));
        assert!(catalog.lookup_frame_id(0xB10).is_none());

        // With the extended flag the adapter's raw ID still resolves
        assert_eq!(catalog.lookup_frame_id(0x8000_0310).unwrap().id, 0x310);
        assert_eq!(catalog.lookup_frame_id(0x8000_0B10).unwrap().id, 0x310);
    }

    #[test]
    fn test_duplicate_message_name() {
        let first = MessageDefinition::new(0x10, "Status", 1);
        let second = MessageDefinition::new(0x11, "Status", 1);
        let result = build(vec![first, second], vec![]);
        assert!(matches!(
            result,
            Err(SchemaError::DuplicateMessageName { first: 0x10, second: 0x11, .. })
        ));
    }
}
