//! Named-signal codec
//!
//! Turns raw CAN frames into named physical signal values and back, driven by
//! the message definitions of a signal dictionary. Everything above this layer
//! (report decoding, command encoding) talks to the [`SignalCodec`] trait only.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::signals::{DatabaseStats, SignalDatabase};
use crate::types::{CanFrame, DbwError, Result, SignalSet, SignalValue};
use std::path::Path;

/// Built-in signal dictionary for the Pacifica by-wire kit
const BUILTIN_DBC: &str = include_str!("../dbc/pacifica.dbc");

/// Capability to pack and unpack named signals
pub trait SignalCodec {
    /// Message definition for a CAN ID
    fn definition(&self, can_id: u32) -> Option<&MessageDefinition>;

    /// Message definition by message name
    fn definition_by_name(&self, name: &str) -> Option<&MessageDefinition>;

    /// Decode every signal of a frame that fits in its payload
    fn decode(&self, frame: &CanFrame) -> Result<SignalSet>;

    /// Encode the named message from physical signal values
    ///
    /// Signals missing from `signals` are packed as raw zero.
    fn encode(&self, message_name: &str, signals: &SignalSet) -> Result<CanFrame>;
}

/// [`SignalCodec`] backed by a DBC signal database
pub struct DbcCodec {
    signal_db: SignalDatabase,
}

impl DbcCodec {
    /// Create a codec with an empty signal database
    pub fn new() -> Self {
        Self {
            signal_db: SignalDatabase::new(),
        }
    }

    /// Codec over the dictionary shipped with this crate
    pub fn builtin() -> Result<Self> {
        Self::from_dbc_str(BUILTIN_DBC, "pacifica.dbc")
    }

    /// Codec over a DBC file on disk
    pub fn from_dbc_file(path: &Path) -> Result<Self> {
        let mut codec = Self::new();
        codec.add_dbc(path)?;
        Ok(codec)
    }

    /// Codec over DBC text already in memory
    pub fn from_dbc_str(dbc_content: &str, source: &str) -> Result<Self> {
        let mut codec = Self::new();
        for message in crate::signals::dbc::parse_dbc_str(dbc_content, source)? {
            codec.signal_db.add_message(message);
        }
        Ok(codec)
    }

    /// Load a DBC file and add its definitions to the signal database
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Get signal database statistics
    pub fn stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }

    /// All CAN IDs known to the dictionary, sorted
    pub fn message_ids(&self) -> Vec<u32> {
        self.signal_db.get_all_can_ids()
    }
}

impl Default for DbcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalCodec for DbcCodec {
    fn definition(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.signal_db.get_message(can_id)
    }

    fn definition_by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.signal_db.get_message_by_name(name)
    }

    fn decode(&self, frame: &CanFrame) -> Result<SignalSet> {
        let message_def = self
            .definition(frame.can_id)
            .ok_or(DbwError::MessageNotFound(frame.can_id))?;
        Ok(decode_message(&frame.data, message_def))
    }

    fn encode(&self, message_name: &str, signals: &SignalSet) -> Result<CanFrame> {
        let message_def = self
            .definition_by_name(message_name)
            .ok_or_else(|| DbwError::MessageNameNotFound(message_name.to_string()))?;
        let data = encode_message(signals, message_def)?;

        let mut frame = CanFrame::new(message_def.id, data);
        frame.is_extended = message_def.id > 0x7FF;
        Ok(frame)
    }
}

/// Decode all applicable signals of a message from its payload
pub fn decode_message(data: &[u8], message_def: &MessageDefinition) -> SignalSet {
    let mut decoded = SignalSet::new();

    // For multiplexed messages, first extract the multiplexer signal value
    let multiplexer_value = message_def
        .multiplexer_signal
        .as_deref()
        .and_then(|name| message_def.signal(name))
        .and_then(|mux_signal| extract_signal_value(data, mux_signal))
        .map(|value| value as u64);

    for signal in &message_def.signals {
        if let Some(ref mux_info) = signal.multiplexer_info {
            match multiplexer_value {
                Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                _ => continue,
            }
        }

        if let Some(raw_value) = extract_signal_value(data, signal) {
            decoded.set(signal.name.clone(), to_physical(signal, raw_value));
        }
    }

    decoded
}

/// Pack signal values into a zero-filled payload of the message's size
pub fn encode_message(signals: &SignalSet, message_def: &MessageDefinition) -> Result<Vec<u8>> {
    let mut data = vec![0u8; message_def.size];

    for (name, _) in signals.iter() {
        if message_def.signal(name).is_none() {
            return Err(DbwError::SignalNotFound(format!(
                "{} in message {}",
                name, message_def.name
            )));
        }
    }

    let multiplexer_value = message_def
        .multiplexer_signal
        .as_deref()
        .map(|name| signals.int(name).max(0) as u64);

    for signal in &message_def.signals {
        if let Some(ref mux_info) = signal.multiplexer_info {
            match multiplexer_value {
                Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                _ => {
                    if signals.contains(&signal.name) {
                        log::debug!(
                            "Skipping '{}': multiplexer of {} does not select it",
                            signal.name,
                            message_def.name
                        );
                    }
                    continue;
                }
            }
        }

        let Some(value) = signals.get(&signal.name) else {
            continue;
        };

        let raw_value = to_raw(signal, value);
        if !insert_signal_value(&mut data, signal, raw_value) {
            return Err(DbwError::InvalidSignalDefinition(format!(
                "Signal '{}' does not fit in {} bytes of {}",
                signal.name, message_def.size, message_def.name
            )));
        }
    }

    Ok(data)
}

/// Raw to physical conversion
fn to_physical(signal: &SignalDefinition, raw_value: i64) -> SignalValue {
    let physical_value = signal.offset + signal.factor * (raw_value as f64);

    if signal.factor == 1.0 && signal.offset == 0.0 && signal.length == 1 {
        // Boolean signal (single bit, no scaling)
        SignalValue::Boolean(raw_value != 0)
    } else if signal.factor != 1.0 || signal.offset != 0.0 {
        SignalValue::Float(physical_value)
    } else {
        SignalValue::Integer(raw_value)
    }
}

/// Physical to raw conversion, rounded and saturated to the signal's bit range
fn to_raw(signal: &SignalDefinition, value: SignalValue) -> i64 {
    let raw_min = signal.raw_min();
    let raw_max = signal.raw_max();

    match value {
        SignalValue::Integer(v) if signal.factor == 1.0 && signal.offset == 0.0 => {
            v.clamp(raw_min, raw_max)
        }
        _ => {
            let raw = ((value.as_f64() - signal.offset) / signal.factor).round();
            if raw.is_nan() {
                0
            } else {
                // Float to int casts saturate
                (raw as i64).clamp(raw_min, raw_max)
            }
        }
    }
}

/// Frame bit positions of a signal, paired with the value bit they carry
///
/// Bit positions use DBC numbering: bit `n` is bit `n % 8` (LSB = 0) of byte
/// `n / 8`.
fn bit_layout(signal: &SignalDefinition) -> Vec<(usize, usize)> {
    let start_bit = signal.start_bit as usize;
    let length = signal.length as usize;

    match signal.byte_order {
        // Start bit is the LSB, bits grow towards higher positions
        ByteOrder::LittleEndian => (0..length).map(|i| (start_bit + i, i)).collect(),
        // Start bit is the MSB, bits walk down within a byte then on to the
        // MSB of the next byte
        ByteOrder::BigEndian => {
            let mut layout = Vec::with_capacity(length);
            let mut pos = start_bit;
            for i in 0..length {
                layout.push((pos, length - 1 - i));
                pos = if pos % 8 == 0 { pos + 15 } else { pos - 1 };
            }
            layout
        }
    }
}

/// Extract raw signal value from CAN frame data
///
/// Returns `None` when the signal does not fit in the payload.
fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
    let layout = bit_layout(signal);
    if layout.iter().any(|&(pos, _)| pos / 8 >= data.len()) {
        log::debug!(
            "Signal '{}' does not fit in a {} byte payload",
            signal.name,
            data.len()
        );
        return None;
    }

    let mut raw_value: u64 = 0;
    for (pos, value_bit) in layout {
        let bit_value = (data[pos / 8] >> (pos % 8)) & 0x01;
        raw_value |= (bit_value as u64) << value_bit;
    }

    let signed_value = match signal.value_type {
        ValueType::Unsigned => raw_value as i64,
        ValueType::Signed => sign_extend(raw_value, signal.length as usize),
    };

    Some(signed_value)
}

/// Write a raw value into the payload; false when the signal does not fit
fn insert_signal_value(data: &mut [u8], signal: &SignalDefinition, raw_value: i64) -> bool {
    let layout = bit_layout(signal);
    if layout.iter().any(|&(pos, _)| pos / 8 >= data.len()) {
        return false;
    }

    let bits = raw_value as u64;
    for (pos, value_bit) in layout {
        let mask = 1u8 << (pos % 8);
        if (bits >> value_bit) & 0x01 == 1 {
            data[pos / 8] |= mask;
        } else {
            data[pos / 8] &= !mask;
        }
    }

    true
}

/// Sign-extend a value from N bits to 64 bits
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
