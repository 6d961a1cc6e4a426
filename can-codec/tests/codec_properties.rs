//! Integration tests for catalog loading and the signal codec against DBC fixtures

use can_codec::{
    load_catalog, resolve_bit_positions, ByteOrder, Frame, MessageCatalog, RangePolicy,
    SchemaError, SignalCodec, SignalDefinition, SignalValue, SignalValues,
};
use std::collections::HashSet;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn bms_catalog() -> MessageCatalog {
    load_catalog(&fixture("bms.dbc")).expect("bms.dbc should load")
}

/// Raw values worth checking for a field: all of them for narrow fields,
/// the edges and a sweep otherwise
fn raw_samples(signal: &SignalDefinition) -> Vec<i128> {
    let (min, max) = SignalCodec::raw_range(signal);
    if signal.bit_length <= 16 {
        return (min..=max).collect();
    }

    let step = (max - min) / 997;
    let mut samples: Vec<i128> = (0..997).map(|i| min + i * step).collect();
    samples.extend([min, min + 1, 0, max - 1, max]);
    samples
}

#[test]
fn test_catalog_loads_fixture() {
    let catalog = bms_catalog();
    let stats = catalog.stats();

    assert_eq!(stats.num_messages, 4);
    assert_eq!(stats.num_signals, 10);
    assert_eq!(stats.num_periodic, 3);
    assert_eq!(stats.num_value_tables, 1);
    assert_eq!(catalog.source(), "bms.dbc");

    let ids: Vec<u32> = catalog.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![784, 800, 832, 1910]);

    assert_eq!(catalog.lookup(784).unwrap().cycle_time_ms, 100);
    assert_eq!(catalog.lookup(832).unwrap().cycle_time_ms, 0);
    assert_eq!(catalog.lookup_by_name("BPS_Status").unwrap().id, 1910);
}

#[test]
fn test_charge_power_vector() {
    let catalog = bms_catalog();

    let frame = Frame::from_bytes(784, &[0, 0, 0, 0, 0, 0, 0xDC, 0x05]);
    let decoded = catalog.decode(&frame).unwrap();
    let power = decoded.signal("Max_Charge_Power").unwrap();

    assert_eq!(power.raw_value, 1500);
    assert!((power.physical - 150.0).abs() < 1e-9);
    assert_eq!(power.unit.as_deref(), Some("kW"));

    let mut values = SignalValues::new();
    values.insert("Max_Charge_Power".to_string(), 150.0);
    let encoded = catalog.encode(784, &values, RangePolicy::Fail).unwrap();
    assert_eq!(encoded, frame);
}

#[test]
fn test_amphours_vector() {
    let catalog = bms_catalog();

    let decoded = catalog.decode(&Frame::from_bytes(832, &[0x0A, 0x00])).unwrap();
    let amphours = decoded.signal("Pack_Amphours").unwrap();

    assert_eq!(amphours.raw_value, 10);
    assert!((amphours.physical - 1.0).abs() < 1e-9);
    assert_eq!(amphours.unit.as_deref(), Some("Amphours"));
}

#[test]
fn test_motorola_full_byte() {
    let catalog = bms_catalog();

    let decoded = catalog.decode(&Frame::from_bytes(1910, &[0xFF])).unwrap();
    let state = decoded.signal("BPS_State").unwrap();

    assert_eq!(state.raw_value, 255);
    assert_eq!(state.label, None);
    assert_eq!(state.value(), SignalValue::Physical(255.0));
}

#[test]
fn test_value_table_labels() {
    let catalog = bms_catalog();

    let decoded = catalog.decode(&Frame::from_bytes(1910, &[0x03])).unwrap();
    assert_eq!(
        decoded.signal("BPS_State").unwrap().value(),
        SignalValue::Label("MPPT_CHARGING".to_string())
    );

    // No RESERVED entry here: falls back to the number
    let decoded = catalog.decode(&Frame::from_bytes(1910, &[0x06])).unwrap();
    let state = decoded.signal("BPS_State").unwrap();
    assert_eq!(state.label, None);
    assert_eq!(state.physical, 6.0);

    let reserved = load_catalog(&fixture("bps_reserved.dbc")).unwrap();
    let decoded = reserved.decode(&Frame::from_bytes(1910, &[0x06])).unwrap();
    assert_eq!(
        decoded.signal("BPS_State").unwrap().label.as_deref(),
        Some("RESERVED")
    );
}

#[test]
fn test_big_endian_signed_pack_values() {
    let catalog = bms_catalog();

    let mut values = SignalValues::new();
    values.insert("Pack_Current".to_string(), -12.5);
    values.insert("Pack_Voltage".to_string(), 400.0);
    values.insert("Pack_Temperature".to_string(), 25.0);
    values.insert("State_Of_Charge".to_string(), 87.5);

    let frame = catalog.encode(800, &values, RangePolicy::Fail).unwrap();
    assert_eq!(frame.data, vec![0xFF, 0x83, 0x9C, 0x40, 0x41, 0xAF]);

    let decoded = catalog.decode(&frame).unwrap();
    assert_eq!(decoded.signal("Pack_Current").unwrap().raw_value, -125);
    assert!((decoded.signal("Pack_Voltage").unwrap().physical - 400.0).abs() < 1e-9);
    assert_eq!(decoded.signal("Pack_Temperature").unwrap().physical, 25.0);
    assert_eq!(decoded.signal("State_Of_Charge").unwrap().physical, 87.5);
}

#[test]
fn test_range_policy() {
    let catalog = bms_catalog();

    let mut values = SignalValues::new();
    values.insert("State_Of_Charge".to_string(), 120.0);

    assert!(catalog.encode(800, &values, RangePolicy::Fail).is_err());

    let frame = catalog.encode(800, &values, RangePolicy::Clamp).unwrap();
    assert_eq!(frame.data[5], 200); // 100 % / 0.5
}

#[test]
fn test_length_mismatch() {
    let catalog = bms_catalog();
    assert!(catalog.decode(&Frame::from_bytes(832, &[0x0A])).is_err());
}

#[test]
fn test_overlapping_schema_rejected() {
    let result = load_catalog(&fixture("overlapping.dbc"));
    assert!(matches!(
        result,
        Err(SchemaError::OverlappingSignals { message_id: 900, .. })
    ));
}

#[test]
fn test_raw_round_trip_every_signal() {
    let catalog = bms_catalog();

    for message in catalog.messages() {
        for signal in &message.signals {
            let mut data = vec![0u8; message.byte_length];
            for raw in raw_samples(signal) {
                SignalCodec::encode_raw(&mut data, signal, raw).unwrap();
                assert_eq!(
                    SignalCodec::decode_raw(&data, signal),
                    raw,
                    "{}.{}",
                    message.name,
                    signal.name
                );
            }
        }
    }
}

#[test]
fn test_physical_round_trip_within_half_step() {
    let catalog = bms_catalog();

    for message in catalog.messages() {
        for signal in &message.signals {
            let (min, max) = signal
                .physical_bounds()
                .unwrap_or_else(|| {
                    let (lo, hi) = SignalCodec::raw_range(signal);
                    (
                        SignalCodec::raw_to_physical(signal, lo),
                        SignalCodec::raw_to_physical(signal, hi),
                    )
                });

            for i in 0..=100 {
                let physical = (min + (max - min) * i as f64 / 100.0).clamp(min, max);
                let mut data = vec![0u8; message.byte_length];
                SignalCodec::encode_signal(&mut data, signal, physical, RangePolicy::Fail).unwrap();

                let decoded = SignalCodec::decode_signal(&data, signal, None);
                assert!(
                    (decoded.physical - physical).abs() <= signal.scale.abs() / 2.0 + 1e-9,
                    "{}.{}: {} -> {}",
                    message.name,
                    signal.name,
                    physical,
                    decoded.physical
                );
            }
        }
    }
}

#[test]
fn test_encode_preserves_neighbouring_bits() {
    let catalog = bms_catalog();
    let message = catalog.lookup(800).unwrap();

    for signal in &message.signals {
        let positions: HashSet<usize> =
            resolve_bit_positions(signal.start_bit, signal.bit_length, signal.byte_order)
                .iter()
                .map(|p| p.linear())
                .collect();

        let mut data = vec![0xA5u8; message.byte_length];
        SignalCodec::encode_raw(&mut data, signal, 0).unwrap();

        for bit in 0..message.byte_length * 8 {
            let original = (0xA5u8 >> (bit % 8)) & 1;
            let now = (data[bit / 8] >> (bit % 8)) & 1;
            if positions.contains(&bit) {
                assert_eq!(now, 0);
            } else {
                assert_eq!(now, original, "{} disturbed bit {}", signal.name, bit);
            }
        }
    }
}

#[test]
fn test_accepted_messages_do_not_overlap() {
    let catalog = bms_catalog();

    for message in catalog.messages() {
        let mut seen = HashSet::new();
        for signal in &message.signals {
            for position in
                resolve_bit_positions(signal.start_bit, signal.bit_length, signal.byte_order)
            {
                assert!(position.byte_index < message.byte_length);
                assert!(
                    seen.insert(position.linear()),
                    "{} reuses bit {}",
                    signal.name,
                    position.linear()
                );
            }
        }
    }
}

#[test]
fn test_byte_order_symmetry() {
    let raw = 0xABC;

    for (start, order) in [
        (4, ByteOrder::LittleEndian),
        (20, ByteOrder::LittleEndian),
        (7, ByteOrder::BigEndian),
        (11, ByteOrder::BigEndian),
        (29, ByteOrder::BigEndian),
    ] {
        let signal = SignalDefinition::new("Field", start, 12, order);
        let mut data = [0u8; 8];
        SignalCodec::encode_raw(&mut data, &signal, raw).unwrap();
        assert_eq!(SignalCodec::decode_raw(&data, &signal), raw, "{:?} @ {}", order, start);
    }
}

#[test]
fn test_cross_convention_differs() {
    let intel = SignalDefinition::new("Word", 0, 16, ByteOrder::LittleEndian);
    let motorola = SignalDefinition::new("Word", 7, 16, ByteOrder::BigEndian);

    let mut data = [0u8; 2];
    SignalCodec::encode_raw(&mut data, &intel, 0x1234).unwrap();
    assert_eq!(data, [0x34, 0x12]);
    assert_eq!(SignalCodec::decode_raw(&data, &motorola), 0x3412);

    // A byte-aligned single byte reads the same either way
    let intel = SignalDefinition::new("Byte", 8, 8, ByteOrder::LittleEndian);
    let motorola = SignalDefinition::new("Byte", 15, 8, ByteOrder::BigEndian);
    let data = [0x00, 0x5A];
    assert_eq!(
        SignalCodec::decode_raw(&data, &intel),
        SignalCodec::decode_raw(&data, &motorola)
    );
}
