//! Message catalog and DBC loader
//!
//! This module contains the definition types, the validated catalog that owns
//! them, and the DBC parser that produces catalog input.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, CatalogStats, MessageCatalog, MessageDefinition, SchemaInput, SignalDefinition,
    SignalValues, ValueTable, ValueType, EXTENDED_ID_FLAG,
};
