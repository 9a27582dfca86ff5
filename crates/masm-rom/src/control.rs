//! Control-ROM assembly.
//!
//! One control word per state code. Lines pack in declaration order with the
//! first declared line in the most significant bits; lines a state does not
//! mention are driven low.

use tracing::info;

use crate::arch::Architecture;
use crate::error::{Result, RomError};
use crate::state::StateTable;

/// Control words indexed by state code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRom {
    word_bits: u32,
    words: Vec<u64>,
}

impl ControlRom {
    /// Width of each control word.
    pub fn word_bits(&self) -> u32 {
        self.word_bits
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Pack every state's control assignments into a control word.
pub fn assemble_control_rom(arch: &Architecture, states: &StateTable) -> Result<ControlRom> {
    let width = arch.control_width();
    if width > u64::from(u64::BITS) {
        return Err(RomError::ControlWordTooWide { width });
    }
    let word_bits = width as u32;

    let mut words = Vec::with_capacity(states.len());
    for (_, name, def) in states.iter() {
        if let Some(unknown) = def.control.keys().find(|k| arch.control(k).is_none()) {
            return Err(RomError::UnknownControl {
                state: name.to_string(),
                control: unknown.clone(),
            });
        }

        // u128 so a full 64-bit word can still be shifted by its last line.
        let mut word: u128 = 0;
        for line in arch.controls() {
            let value = def.control.get(&line.name).copied().unwrap_or(0);
            if line.width < u64::BITS && value >> line.width != 0 {
                return Err(RomError::ControlOverflow {
                    state: name.to_string(),
                    control: line.name.clone(),
                    value,
                    width: line.width,
                });
            }
            word = (word << line.width) | u128::from(value);
        }
        words.push(word as u64);
    }

    info!(words = words.len(), word_bits, "control ROM assembled");
    Ok(ControlRom { word_bits, words })
}
