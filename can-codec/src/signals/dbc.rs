//! DBC file loader
//!
//! Parses Vector DBC files with the `can-dbc` crate and converts them into a
//! [`SchemaInput`] for [`MessageCatalog::build`](super::MessageCatalog::build).
//! Each file becomes its own catalog; nothing is merged across files.

use crate::signals::database::{
    ByteOrder, MessageCatalog, MessageDefinition, SchemaInput, SignalDefinition, ValueTable,
    ValueType, EXTENDED_ID_FLAG,
};
use crate::types::{SchemaError, SchemaResult};
use std::path::Path;

/// Attribute carrying a message's transmission period
const CYCLE_TIME_ATTRIBUTE: &str = "GenMsgCycleTime";

/// Parse a DBC file and return its schema content
pub fn parse_dbc_file(path: &Path) -> SchemaResult<SchemaInput> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path)?;

    // Try UTF-8 first, then fall back to Latin-1 (compatible with Windows-1252)
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");

    let input = parse_dbc_str(&dbc_content, source)?;

    log::info!(
        "Parsed {} messages from {:?}",
        input.messages.len(),
        path
    );

    Ok(input)
}

/// Parse a DBC file and build a validated catalog from it
pub fn load_catalog(path: &Path) -> SchemaResult<MessageCatalog> {
    MessageCatalog::build(parse_dbc_file(path)?)
}

/// Parse DBC text
pub fn parse_dbc_str(content: &str, source: &str) -> SchemaResult<SchemaInput> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        SchemaError::DbcParseError(format!("Failed to parse DBC {}: {:?}", source, e))
    })?;

    let mut messages = Vec::new();
    let mut value_tables = Vec::new();

    for dbc_msg in dbc.messages() {
        let (message, tables) = convert_message(&dbc, dbc_msg)?;
        messages.push(message);
        value_tables.extend(tables);
    }

    Ok(SchemaInput {
        messages,
        value_tables,
        source: source.to_string(),
    })
}

/// Convert a can-dbc message to our MessageDefinition plus the value tables
/// its signals reference
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
) -> SchemaResult<(MessageDefinition, Vec<ValueTable>)> {
    let dbc_id = *dbc_msg.message_id();
    let id = dbc_id.0 & !EXTENDED_ID_FLAG;

    let mut message = MessageDefinition::new(
        id,
        dbc_msg.message_name().clone(),
        *dbc_msg.message_size() as usize,
    )
    .with_cycle_time(cycle_time_ms(dbc, dbc_id));

    if let can_dbc::Transmitter::NodeName(name) = dbc_msg.transmitter() {
        message = message.with_transmitter(name.clone());
    }

    let mut tables = Vec::new();

    for dbc_sig in dbc_msg.signals() {
        // Multiplexed signals share bits by design; the catalog model has no place for them
        if matches!(
            dbc_sig.multiplexer_indicator(),
            can_dbc::MultiplexIndicator::MultiplexedSignal(_)
        ) {
            log::warn!(
                "Skipping multiplexed signal '{}' in message {}",
                dbc_sig.name(),
                dbc_msg.message_name()
            );
            continue;
        }

        let mut signal = convert_signal(dbc_sig);

        if let Some(descriptions) = dbc.value_descriptions_for_signal(dbc_id, dbc_sig.name()) {
            // Tables are scoped to (message, signal), never shared by signal name
            let table_name = format!("{}.{}", dbc_msg.message_name(), dbc_sig.name());
            let table = ValueTable::new(
                table_name.clone(),
                descriptions.iter().map(|d| (*d.a() as i64, d.b().clone())),
            )?;
            signal.value_table = Some(table_name);
            tables.push(table);
        }

        message.signals.push(signal);
    }

    Ok((message, tables))
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(dbc_sig: &can_dbc::Signal) -> SignalDefinition {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        bit_length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        scale: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        physical_min: *dbc_sig.min(),
        physical_max: *dbc_sig.max(),
        unit: dbc_sig.unit().to_string(),
        value_table: None,
        receivers: dbc_sig.receivers().clone(),
    }
}

/// Read the `GenMsgCycleTime` attribute for a message (0 if absent)
fn cycle_time_ms(dbc: &can_dbc::DBC, message_id: can_dbc::MessageId) -> u64 {
    dbc.attribute_values()
        .iter()
        .filter(|attr| attr.attribute_name() == CYCLE_TIME_ATTRIBUTE)
        .find_map(|attr| match attr.attribute_value() {
            can_dbc::AttributeValuedForObjectType::MessageDefinitionAttributeValue(
                id,
                Some(value),
            ) if *id == message_id => attribute_as_u64(value),
            _ => None,
        })
        .unwrap_or(0)
}

fn attribute_as_u64(value: &can_dbc::AttributeValue) -> Option<u64> {
    match value {
        can_dbc::AttributeValue::AttributeValueU64(v) => Some(*v),
        can_dbc::AttributeValue::AttributeValueI64(v) => u64::try_from(*v).ok(),
        can_dbc::AttributeValue::AttributeValueF64(v) if *v >= 0.0 => Some(*v as u64),
        _ => None,
    }
}
