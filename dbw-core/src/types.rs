//! Core types shared by the codec, the report decoder and the command encoder
//!
//! Frames are what travels on the bus, signal sets are what the signal dictionary
//! turns frames into (and back). Everything above this layer works on named
//! signals only and never touches raw bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type used throughout the crate
pub type Timestamp = DateTime<Utc>;

/// Result type for fallible operations
pub type Result<T> = std::result::Result<T, DbwError>;

/// Raw CAN frame as received from or transmitted onto the vehicle bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    /// Timestamp in nanoseconds since epoch
    pub timestamp_ns: u64,
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Frame data bytes (0-8 bytes for classic CAN)
    pub data: Vec<u8>,
    /// True if this is an extended (29-bit) CAN ID
    #[serde(default)]
    pub is_extended: bool,
    /// True if this is an error frame
    #[serde(default)]
    pub is_error_frame: bool,
    /// True if this is a remote frame
    #[serde(default)]
    pub is_remote_frame: bool,
}

impl CanFrame {
    /// Build a standard data frame
    pub fn new(can_id: u32, data: Vec<u8>) -> Self {
        Self {
            timestamp_ns: 0,
            can_id,
            data,
            is_extended: false,
            is_error_frame: false,
            is_remote_frame: false,
        }
    }

    /// Builder method: stamp the frame
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp_ns = timestamp
            .timestamp_nanos_opt()
            .map(|ns| ns.max(0) as u64)
            .unwrap_or(0);
        self
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        let secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let nsecs = (self.timestamp_ns % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nsecs).unwrap_or_else(Utc::now)
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// Data frames are the only frames carrying signals
    pub fn is_data_frame(&self) -> bool {
        !self.is_remote_frame && !self.is_error_frame
    }
}

/// Errors that can occur while loading the signal dictionary or packing frames
#[derive(Debug, thiserror::Error)]
pub enum DbwError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("Message not found: CAN ID 0x{0:X}")]
    MessageNotFound(u32),

    #[error("Message not found: {0}")]
    MessageNameNotFound(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Signal value types carried by a [`SignalSet`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Boolean value (single unscaled bit)
    Boolean(bool),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
            SignalValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
        }
    }
}

impl SignalValue {
    /// Physical value as f64
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Float(v) => *v,
            SignalValue::Boolean(v) => if *v { 1.0 } else { 0.0 },
        }
    }

    /// Convert signal value to i64 (floats truncate toward zero)
    pub fn as_i64(&self) -> i64 {
        match self {
            SignalValue::Integer(v) => *v,
            SignalValue::Float(v) => *v as i64,
            SignalValue::Boolean(v) => if *v { 1 } else { 0 },
        }
    }

    /// Any non-zero value is true
    pub fn as_bool(&self) -> bool {
        match self {
            SignalValue::Boolean(v) => *v,
            SignalValue::Integer(v) => *v != 0,
            SignalValue::Float(v) => *v != 0.0,
        }
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Boolean(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Integer(v)
    }
}

impl From<u8> for SignalValue {
    fn from(v: u8) -> Self {
        SignalValue::Integer(i64::from(v))
    }
}

impl From<u16> for SignalValue {
    fn from(v: u16) -> Self {
        SignalValue::Integer(i64::from(v))
    }
}

/// Named physical signal values of one message
///
/// Produced by decoding a frame and consumed when encoding one. Reads of absent
/// signals yield zero: a multiplexed signal that is not selected, or a signal
/// that did not fit in a short payload, reads the same as an inert one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    values: BTreeMap<String, SignalValue>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a signal, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<SignalValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<SignalValue> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Physical value, 0.0 when absent
    pub fn float(&self, name: &str) -> f64 {
        self.get(name).map(|v| v.as_f64()).unwrap_or(0.0)
    }

    /// Non-zero test, false when absent
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).map(|v| v.as_bool()).unwrap_or(false)
    }

    /// Integer value, 0 when absent
    pub fn int(&self, name: &str) -> i64 {
        self.get(name).map(|v| v.as_i64()).unwrap_or(0)
    }

    /// Integer value saturated into a u8, 0 when absent
    pub fn uint8(&self, name: &str) -> u8 {
        self.int(name).clamp(0, i64::from(u8::MAX)) as u8
    }

    /// Integer value saturated into a u16, 0 when absent
    pub fn uint16(&self, name: &str) -> u16 {
        self.int(name).clamp(0, i64::from(u16::MAX)) as u16
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SignalValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<SignalValue>> FromIterator<(K, V)> for SignalSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = SignalSet::new();
        for (name, value) in iter {
            set.set(name, value);
        }
        set
    }
}
