//! Signal database
//!
//! Holds the message definitions of the loaded signal dictionary, indexed by
//! CAN ID and by message name.

use std::collections::HashMap;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    /// Look up a signal of this message by name
    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (DBC numbering)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit (e.g., "km/h", "deg", "V")
    pub unit: Option<String>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

impl SignalDefinition {
    /// Smallest representable raw value
    pub fn raw_min(&self) -> i64 {
        match self.value_type {
            ValueType::Unsigned => 0,
            ValueType::Signed if self.length >= 64 => i64::MIN,
            ValueType::Signed => -(1i64 << (self.length - 1)),
        }
    }

    /// Largest representable raw value
    pub fn raw_max(&self) -> i64 {
        match self.value_type {
            ValueType::Unsigned if self.length >= 63 => i64::MAX,
            ValueType::Unsigned => (1i64 << self.length) - 1,
            ValueType::Signed if self.length >= 64 => i64::MAX,
            ValueType::Signed => (1i64 << (self.length - 1)) - 1,
        }
    }
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// The signal database
pub struct SignalDatabase {
    /// All message definitions by CAN ID
    messages: HashMap<u32, MessageDefinition>,

    /// Message name lookup
    /// Key: Message name, Value: CAN ID
    message_lookup: HashMap<String, u32>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            message_lookup: HashMap::new(),
        }
    }

    /// Add a message definition to the database
    ///
    /// A later definition for the same CAN ID replaces the earlier one.
    pub fn add_message(&mut self, message: MessageDefinition) {
        if let Some(previous) = self.messages.get(&message.id) {
            log::warn!(
                "Message 0x{:X} redefined: {} ({}) replaces {} ({})",
                message.id,
                message.name,
                message.source,
                previous.name,
                previous.source
            );
            self.message_lookup.remove(&previous.name);
        }

        self.message_lookup.insert(message.name.clone(), message.id);
        self.messages.insert(message.id, message);
    }

    /// Get the message definition for a CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Get message definition by name
    pub fn get_message_by_name(&self, message_name: &str) -> Option<&MessageDefinition> {
        self.message_lookup
            .get(message_name)
            .and_then(|can_id| self.messages.get(can_id))
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let num_messages = self.messages.len();
        let num_signals: usize = self.messages.values().map(|msg| msg.signals.len()).sum();
        let num_multiplexed = self.messages.values().filter(|msg| msg.is_multiplexed).count();

        DatabaseStats {
            num_messages,
            num_signals,
            num_multiplexed,
        }
    }

    /// Get all CAN IDs in the database, sorted
    pub fn get_all_can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
    /// Messages carrying a multiplexer
    pub num_multiplexed: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}
