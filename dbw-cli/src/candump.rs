//! candump log reader
//!
//! Reads the `candump -l` format, one frame per line:
//!
//! ```text
//! (1700000000.123456) can0 061#0102030405060708
//! (1700000000.124001) can0 12345678#R
//! ```

use anyhow::{anyhow, bail, Context, Result};
use dbw_core::CanFrame;
use std::fs;
use std::path::Path;

/// Error flag carried in the identifier of error frames
const CAN_ERR_FLAG: u32 = 0x2000_0000;
const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

/// Read every frame of a candump log
pub fn read_log(path: &Path) -> Result<Vec<CanFrame>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read candump log: {:?}", path))?;

    let mut frames = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let frame = parse_line(line)
            .with_context(|| format!("{:?} line {}", path, index + 1))?;
        frames.extend(frame);
    }

    log::info!("Read {} frames from {:?}", frames.len(), path);
    Ok(frames)
}

/// Parse one log line; blank lines and comments give `None`
pub fn parse_line(line: &str) -> Result<Option<CanFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let stamp = fields.next().ok_or_else(|| anyhow!("Missing timestamp"))?;
    let _interface = fields.next().ok_or_else(|| anyhow!("Missing interface"))?;
    let body = fields.next().ok_or_else(|| anyhow!("Missing frame"))?;

    let timestamp_ns = parse_timestamp(stamp)?;
    let (id_text, payload) = body
        .split_once('#')
        .ok_or_else(|| anyhow!("Frame without '#': {}", body))?;

    let raw_id = u32::from_str_radix(id_text, 16)
        .with_context(|| format!("Invalid CAN ID: {}", id_text))?;
    let is_extended = id_text.len() > 3;

    let mut frame = CanFrame::new(raw_id & CAN_EFF_MASK, Vec::new());
    frame.timestamp_ns = timestamp_ns;
    frame.is_extended = is_extended;
    frame.is_error_frame = is_extended && raw_id & CAN_ERR_FLAG != 0;

    if payload.starts_with('R') {
        frame.is_remote_frame = true;
        return Ok(Some(frame));
    }

    // CAN FD frames carry a flags nibble after a second '#'
    let data_text = match payload.strip_prefix('#') {
        Some(fd) => fd.get(1..).unwrap_or(""),
        None => payload,
    };
    frame.data = parse_hex(data_text)?;
    Ok(Some(frame))
}

fn parse_timestamp(stamp: &str) -> Result<u64> {
    let inner = stamp
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| anyhow!("Timestamp not in parentheses: {}", stamp))?;
    let (secs, frac) = inner.split_once('.').unwrap_or((inner, "0"));

    let secs: u64 = secs
        .parse()
        .with_context(|| format!("Invalid timestamp: {}", stamp))?;
    // Pad or cut the fraction to nanoseconds
    let mut digits: String = frac.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos: u64 = digits
        .parse()
        .with_context(|| format!("Invalid timestamp: {}", stamp))?;

    secs.checked_mul(1_000_000_000)
        .and_then(|ns| ns.checked_add(nanos))
        .ok_or_else(|| anyhow!("Timestamp out of range: {}", stamp))
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Invalid hex data: {}", text);
    }
    if text.len() % 2 != 0 {
        bail!("Odd number of hex digits: {}", text);
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair)?;
            u8::from_str_radix(digits, 16)
                .with_context(|| format!("Invalid data byte: {}", digits))
        })
        .collect()
}
