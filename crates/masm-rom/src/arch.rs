//! Architecture description: field widths, opcodes, flags, control lines.
//!
//! Opcodes, flags and control lines are kept as explicit ordered registries
//! so that codes and bit positions never depend on how a particular document
//! happened to store its mappings.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::address::{AddressLayout, FlagBits};
use crate::error::{Result, RomError};

/// A named instruction class and its fixed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub name: String,
    pub code: u64,
}

/// A control output of the sequencer and its width in bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLine {
    pub name: String,
    pub width: u32,
}

/// The `platform` section as written in a description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlatformSection {
    opcode_size: u32,
    state_size: u32,
    #[serde(default)]
    opcodes: IndexMap<String, u64>,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    controls: IndexMap<String, u32>,
}

/// Immutable architecture description owned by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    opcode_size: u32,
    state_size: u32,
    opcodes: Vec<Opcode>,
    opcode_index: HashMap<String, usize>,
    flags: Vec<String>,
    controls: Vec<ControlLine>,
}

impl Architecture {
    /// Build an architecture from field widths, opcodes and flag names.
    ///
    /// Opcodes keep the order given; a repeated name replaces the earlier code.
    pub fn new<N, F>(
        opcode_size: u32,
        state_size: u32,
        opcodes: impl IntoIterator<Item = (N, u64)>,
        flags: impl IntoIterator<Item = F>,
    ) -> Self
    where
        N: Into<String>,
        F: Into<String>,
    {
        let mut arch = Self {
            opcode_size,
            state_size,
            opcodes: Vec::new(),
            opcode_index: HashMap::new(),
            flags: flags.into_iter().map(Into::into).collect(),
            controls: Vec::new(),
        };
        for (name, code) in opcodes {
            arch.insert_opcode(name.into(), code);
        }
        arch
    }

    /// Attach control lines, in the order they pack into a control word.
    pub fn with_controls<N: Into<String>>(
        mut self,
        controls: impl IntoIterator<Item = (N, u32)>,
    ) -> Self {
        self.controls = controls
            .into_iter()
            .map(|(name, width)| ControlLine {
                name: name.into(),
                width,
            })
            .collect();
        self
    }

    /// Build from the `platform` section of a loaded document.
    pub fn from_section(value: &Value) -> Result<Self> {
        let section: PlatformSection =
            serde_json::from_value(value.clone()).map_err(|source| RomError::InvalidSection {
                section: masm_document::PLATFORM_SECTION,
                source,
            })?;
        Ok(Self::new(
            section.opcode_size,
            section.state_size,
            section.opcodes,
            section.flags,
        )
        .with_controls(section.controls))
    }

    fn insert_opcode(&mut self, name: String, code: u64) {
        match self.opcode_index.get(&name) {
            Some(&idx) => self.opcodes[idx].code = code,
            None => {
                self.opcode_index.insert(name.clone(), self.opcodes.len());
                self.opcodes.push(Opcode { name, code });
            }
        }
    }

    /// Bits of the opcode field.
    pub fn opcode_size(&self) -> u32 {
        self.opcode_size
    }

    /// Bits of the current-state field.
    pub fn state_size(&self) -> u32 {
        self.state_size
    }

    /// Declared opcodes in order.
    pub fn opcodes(&self) -> &[Opcode] {
        &self.opcodes
    }

    /// Declared flag names in order; the first is the most significant flag bit.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Declared control lines in packing order.
    pub fn controls(&self) -> &[ControlLine] {
        &self.controls
    }

    /// Code of a named opcode.
    pub fn opcode_code(&self, name: &str) -> Result<u64> {
        self.opcode_index
            .get(name)
            .map(|&idx| self.opcodes[idx].code)
            .ok_or_else(|| RomError::UnknownOpcode(name.to_string()))
    }

    /// First declared opcode carrying `code`.
    pub fn opcode_name(&self, code: u64) -> Option<&str> {
        self.opcodes
            .iter()
            .find(|op| op.code == code)
            .map(|op| op.name.as_str())
    }

    /// Position of a flag in declaration order.
    pub fn flag_index(&self, name: &str) -> Result<usize> {
        self.flags
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| RomError::UnknownFlag(name.to_string()))
    }

    /// Mask selecting a flag within the packed flag field.
    pub fn flag_mask(&self, name: &str) -> Result<u64> {
        let idx = self.flag_index(name)?;
        Ok(1u64 << (self.flags.len() - 1 - idx))
    }

    /// Look up a control line by name.
    pub fn control(&self, name: &str) -> Option<&ControlLine> {
        self.controls.iter().find(|c| c.name == name)
    }

    /// Total width of a control word. Summed in `u64` so no declared widths overflow it.
    pub fn control_width(&self) -> u64 {
        self.controls.iter().map(|c| u64::from(c.width)).sum()
    }

    /// Bit layout of the decision-ROM address.
    pub fn layout(&self) -> AddressLayout {
        AddressLayout {
            opcode_bits: self.opcode_size,
            flag_bits: self.flags.len() as u32,
            state_bits: self.state_size,
        }
    }

    /// Total address width `W = opcode_size + state_size + len(flags)`.
    pub fn address_width(&self) -> u32 {
        self.layout().width()
    }

    /// Encode a symbolic (state, opcode, flags) triple into an address.
    pub fn encode(&self, state: u64, opcode: &str, flags: FlagBits<'_>) -> Result<u64> {
        let opcode = self.opcode_code(opcode)?;
        let flags = self.pack_flags(flags)?;
        self.layout().encode_raw(state, opcode, flags)
    }

    /// Resolve a flag argument into the packed flag field.
    pub fn pack_flags(&self, flags: FlagBits<'_>) -> Result<u64> {
        match flags {
            FlagBits::Packed(mask) => Ok(mask),
            FlagBits::Named(values) => {
                if let Some(unknown) = values
                    .keys()
                    .find(|k| !self.flags.iter().any(|f| f == *k))
                {
                    return Err(RomError::UnknownFlag(unknown.clone()));
                }
                Ok(self.flags.iter().fold(0u64, |acc, name| {
                    let bit = values.get(name).copied().unwrap_or(false);
                    (acc << 1) | u64::from(bit)
                }))
            }
        }
    }
}
