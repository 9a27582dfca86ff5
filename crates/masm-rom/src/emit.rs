//! ROM image rendering: hex dump, raw binary, JSON.

use std::fmt;
use std::str::FromStr;

use crate::control::ControlRom;
use crate::decision::DecisionRom;

/// Output format for a ROM image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RomFormat {
    /// Space-separated uppercase hex words, zero padded to the word width.
    #[default]
    Hex,
    /// Little-endian words of `ceil(bits / 8)` bytes each.
    Binary,
    /// JSON array of integers.
    Json,
}

impl fmt::Display for RomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RomFormat::Hex => write!(f, "hex"),
            RomFormat::Binary => write!(f, "binary"),
            RomFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for RomFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hex" => Ok(RomFormat::Hex),
            "binary" | "bin" => Ok(RomFormat::Binary),
            "json" => Ok(RomFormat::Json),
            other => Err(format!(
                "unknown ROM format '{other}' (expected hex, binary, or json)"
            )),
        }
    }
}

/// A table of fixed-width words that can be written out as a ROM image.
pub trait RomImage {
    /// Significant bits per word.
    fn word_bits(&self) -> u32;

    /// Words in address order.
    fn words(&self) -> &[u64];

    /// Render the image in the given format.
    fn render(&self, format: RomFormat) -> Vec<u8> {
        let bits = self.word_bits().max(1);
        match format {
            RomFormat::Hex => {
                let digits = (bits.div_ceil(4) as usize).max(2);
                let cells: Vec<String> = self
                    .words()
                    .iter()
                    .map(|w| format!("{w:0digits$X}"))
                    .collect();
                let mut out = cells.join(" ");
                out.push('\n');
                out.into_bytes()
            }
            RomFormat::Binary => {
                let bytes = bits.div_ceil(8) as usize;
                self.words()
                    .iter()
                    .flat_map(|w| w.to_le_bytes().into_iter().take(bytes))
                    .collect()
            }
            RomFormat::Json => {
                let mut out = serde_json::to_string(self.words())
                    .unwrap_or_else(|_| String::from("[]"))
                    .into_bytes();
                out.push(b'\n');
                out
            }
        }
    }
}

impl RomImage for DecisionRom {
    fn word_bits(&self) -> u32 {
        self.layout().state_bits
    }

    fn words(&self) -> &[u64] {
        self.entries()
    }
}

impl RomImage for ControlRom {
    fn word_bits(&self) -> u32 {
        ControlRom::word_bits(self)
    }

    fn words(&self) -> &[u64] {
        ControlRom::words(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Words(u32, Vec<u64>);

    impl RomImage for Words {
        fn word_bits(&self) -> u32 {
            self.0
        }
        fn words(&self) -> &[u64] {
            &self.1
        }
    }

    #[test]
    fn hex_pads_to_two_digits() {
        let img = Words(5, vec![0, 0x1F, 3]);
        assert_eq!(img.render(RomFormat::Hex), b"00 1F 03\n");
    }

    #[test]
    fn hex_pads_to_word_width() {
        let img = Words(22, vec![0xA, 0x3FFFFF]);
        assert_eq!(img.render(RomFormat::Hex), b"00000A 3FFFFF\n");
    }

    #[test]
    fn binary_is_little_endian() {
        let img = Words(12, vec![0x0ABC, 0x0001]);
        assert_eq!(img.render(RomFormat::Binary), vec![0xBC, 0x0A, 0x01, 0x00]);

        let img = Words(1, vec![1, 0, 1]);
        assert_eq!(img.render(RomFormat::Binary), vec![1, 0, 1]);
    }

    #[test]
    fn json_array() {
        let img = Words(4, vec![1, 0, 15]);
        assert_eq!(img.render(RomFormat::Json), b"[1,0,15]\n");
    }

    #[test]
    fn zero_width_words_still_render() {
        let img = Words(0, vec![0]);
        assert_eq!(img.render(RomFormat::Hex), b"00\n");
        assert_eq!(img.render(RomFormat::Binary), vec![0]);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("hex".parse::<RomFormat>().unwrap(), RomFormat::Hex);
        assert_eq!("bin".parse::<RomFormat>().unwrap(), RomFormat::Binary);
        assert_eq!("json".parse::<RomFormat>().unwrap(), RomFormat::Json);
        assert!("ihex".parse::<RomFormat>().is_err());
        assert_eq!(RomFormat::Binary.to_string(), "binary");
    }
}
