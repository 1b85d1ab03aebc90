//! Signal dictionary
//!
//! DBC parsing and the message/signal database built from it.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, MultiplexerInfo, SignalDatabase,
    SignalDefinition, ValueType,
};
