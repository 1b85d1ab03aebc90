//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{
    ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
};
use crate::types::{DbwError, Result};
use std::path::Path;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        DbwError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Try UTF-8 first, then fall back to Latin-1/Windows-1252 encoding
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    let messages = parse_dbc_str(&dbc_content, &source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC text already in memory; `source` names it in diagnostics
pub fn parse_dbc_str(dbc_content: &str, source: &str) -> Result<Vec<MessageDefinition>> {
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        DbwError::DbcParseError(format!("Failed to parse DBC {}: {:?}", source, e))
    })?;

    dbc.messages()
        .iter()
        .map(|dbc_msg| convert_message(dbc_msg, source))
        .collect()
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message, source: &str) -> Result<MessageDefinition> {
    let mut is_multiplexed = false;
    let mut multiplexer_signal_name: Option<String> = None;

    // First pass: identify multiplexer signal
    for dbc_sig in dbc_msg.signals() {
        match dbc_sig.multiplexer_indicator() {
            can_dbc::MultiplexIndicator::Multiplexor => {
                is_multiplexed = true;
                multiplexer_signal_name = Some(dbc_sig.name().to_string());
                break;
            }
            can_dbc::MultiplexIndicator::MultiplexedSignal(_) => is_multiplexed = true,
            _ => {}
        }
    }

    // Second pass: convert all signals
    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| convert_signal(dbc_sig, multiplexer_signal_name.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    Ok(MessageDefinition {
        id: dbc_msg.message_id().0, // Extract raw ID from MessageId tuple struct
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let length = *dbc_sig.signal_size() as u16;
    if length == 0 || length > 64 {
        return Err(DbwError::InvalidSignalDefinition(format!(
            "Signal '{}' has unsupported length {}",
            dbc_sig.name(),
            length
        )));
    }

    if *dbc_sig.factor() == 0.0 {
        return Err(DbwError::InvalidSignalDefinition(format!(
            "Signal '{}' has a zero factor",
            dbc_sig.name()
        )));
    }

    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => Some(MultiplexerInfo {
            multiplexer_signal: multiplexer_signal_name
                .ok_or_else(|| {
                    DbwError::InvalidSignalDefinition(format!(
                        "Multiplexed signal '{}' but no multiplexer found",
                        dbc_sig.name()
                    ))
                })?
                .to_string(),
            multiplexer_values: vec![switch_value],
        }),
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        multiplexer_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SIMPLE_DBC: &str = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: DBW AKIT

BO_ 97 DBW_BrakeReport: 8 DBW
 SG_ DBW_BrakePedalDriverInput : 0|10@1+ (0.1,0) [0|100] "%" AKIT
 SG_ DBW_BrakeEnabled : 20|1@1+ (1,0) [0|1] "" AKIT

BO_ 100 AKit_SteeringCommand: 8 AKIT
 SG_ AKit_SteeringWhlAngleCmd : 0|16@1- (0.1,0) [-500|500] "deg" DBW
"#;

    #[test]
    fn test_parse_simple_dbc() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(SIMPLE_DBC.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let messages = parse_dbc_file(temp_file.path()).unwrap();
        assert_eq!(messages.len(), 2);

        let brake = &messages[0];
        assert_eq!(brake.id, 0x61);
        assert_eq!(brake.name, "DBW_BrakeReport");
        assert_eq!(brake.size, 8);
        assert_eq!(brake.sender, Some("DBW".to_string()));
        assert_eq!(brake.signals.len(), 2);

        let input = &brake.signals[0];
        assert_eq!(input.name, "DBW_BrakePedalDriverInput");
        assert_eq!(input.start_bit, 0);
        assert_eq!(input.length, 10);
        assert_eq!(input.factor, 0.1);
        assert_eq!(input.unit, Some("%".to_string()));

        let angle = &messages[1].signals[0];
        assert_eq!(angle.value_type, ValueType::Signed);
        assert_eq!(angle.byte_order, ByteOrder::LittleEndian);
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: DBW

BO_ 126 DBW_Vin: 8 DBW
 SG_ DBW_VinMultiplexor M : 0|8@1+ (1,0) [0|2] "" DBW
 SG_ DBW_VinDigit_01 m0 : 8|8@1+ (1,0) [0|255] "" DBW
 SG_ DBW_VinDigit_08 m1 : 8|8@1+ (1,0) [0|255] "" DBW
"#;

        let messages = parse_dbc_str(dbc_content, "vin.dbc").unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert!(msg.is_multiplexed);
        assert_eq!(msg.multiplexer_signal, Some("DBW_VinMultiplexor".to_string()));
        assert_eq!(msg.signals.len(), 3);

        let digit = msg.signal("DBW_VinDigit_08").unwrap();
        let mux = digit.multiplexer_info.as_ref().unwrap();
        assert_eq!(mux.multiplexer_signal, "DBW_VinMultiplexor");
        assert_eq!(mux.multiplexer_values, vec![1]);
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let result = parse_dbc_file(Path::new("/nonexistent/pacifica.dbc"));
        assert!(matches!(result, Err(DbwError::DbcParseError(_))));
    }
}
