//! Vehicle identification number assembly
//!
//! The VIN arrives in three multiplexed fragments of 7, 7 and 3 characters.

use crate::ids::{VIN_MUX_FIRST, VIN_MUX_LAST, VIN_MUX_MIDDLE};

const VIN_LENGTH: usize = 17;

#[derive(Debug, Clone, Default)]
pub struct VinAssembler {
    partial: String,
    /// Next fragment expected (None until a first fragment arrives)
    expected: Option<u64>,
    published: Option<String>,
}

impl VinAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns the VIN when a full cycle completes with a new value
    pub fn push(&mut self, mux: u64, digits: &[u8]) -> Option<String> {
        match mux {
            VIN_MUX_FIRST => {
                self.partial.clear();
                if self.append(mux, digits) {
                    self.expected = Some(VIN_MUX_MIDDLE);
                }
                None
            }
            VIN_MUX_MIDDLE | VIN_MUX_LAST if self.expected == Some(mux) => {
                if !self.append(mux, digits) {
                    return None;
                }
                if mux == VIN_MUX_MIDDLE {
                    self.expected = Some(VIN_MUX_LAST);
                    return None;
                }

                self.expected = None;
                let vin = std::mem::take(&mut self.partial);
                if vin.len() != VIN_LENGTH {
                    log::debug!("Discarding VIN of length {}", vin.len());
                    return None;
                }
                if self.published.as_deref() == Some(vin.as_str()) {
                    return None;
                }
                log::info!("Detected VIN: {}", vin);
                self.published = Some(vin.clone());
                Some(vin)
            }
            _ => {
                log::debug!("Out of order VIN fragment {}, restarting", mux);
                self.partial.clear();
                self.expected = None;
                None
            }
        }
    }

    /// Last published VIN
    pub fn vin(&self) -> Option<&str> {
        self.published.as_deref()
    }

    /// Append a fragment's digits; a non-ASCII digit abandons the cycle
    fn append(&mut self, mux: u64, digits: &[u8]) -> bool {
        if !digits.is_ascii() {
            log::warn!(
                "Discarding VIN cycle: fragment {} has non-ASCII digits {:02X?}",
                mux,
                digits
            );
            self.partial.clear();
            self.expected = None;
            return false;
        }
        self.partial.extend(digits.iter().map(|&b| b as char));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIN: &[u8; 17] = b"2C4RC1BG5LR123456";

    fn feed_cycle(asm: &mut VinAssembler, vin: &[u8; 17]) -> Option<String> {
        assert_eq!(asm.push(0, &vin[0..7]), None);
        assert_eq!(asm.push(1, &vin[7..14]), None);
        asm.push(2, &vin[14..17])
    }

    #[test]
    fn test_full_cycle_publishes() {
        let mut asm = VinAssembler::new();
        assert_eq!(feed_cycle(&mut asm, VIN), Some("2C4RC1BG5LR123456".to_string()));
        assert_eq!(asm.vin(), Some("2C4RC1BG5LR123456"));
    }

    #[test]
    fn test_unchanged_vin_not_republished() {
        let mut asm = VinAssembler::new();
        feed_cycle(&mut asm, VIN);
        assert_eq!(feed_cycle(&mut asm, VIN), None);

        let other = b"1C4RC1BG5LR654321";
        assert_eq!(feed_cycle(&mut asm, other), Some("1C4RC1BG5LR654321".to_string()));
    }

    #[test]
    fn test_out_of_order_discards_partial() {
        let mut asm = VinAssembler::new();
        assert_eq!(asm.push(1, &VIN[7..14]), None);
        assert_eq!(asm.push(2, &VIN[14..17]), None);

        asm.push(0, &VIN[0..7]);
        assert_eq!(asm.push(2, &VIN[14..17]), None);
        assert_eq!(asm.push(1, &VIN[7..14]), None);
        assert_eq!(asm.vin(), None);

        // Recovers on the next clean cycle
        assert!(feed_cycle(&mut asm, VIN).is_some());
    }

    #[test]
    fn test_non_ascii_digit_abandons_cycle() {
        let mut asm = VinAssembler::new();
        asm.push(0, &VIN[0..7]);
        assert_eq!(asm.push(1, &[b'C', 0xC3, b'R', b'C', b'1', b'B', b'G']), None);
        assert_eq!(asm.push(2, &VIN[14..17]), None);
        assert_eq!(asm.vin(), None);

        assert_eq!(asm.push(0, &[0x80; 7]), None);
        assert_eq!(asm.push(1, &VIN[7..14]), None);
        assert_eq!(asm.push(2, &VIN[14..17]), None);
        assert_eq!(asm.vin(), None);

        assert_eq!(feed_cycle(&mut asm, VIN), Some("2C4RC1BG5LR123456".to_string()));
    }
}
