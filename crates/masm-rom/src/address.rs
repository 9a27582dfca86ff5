//! Decision-ROM address encoding.
//!
//! The address concatenates the sequencer's hardware inputs the way they
//! reach the ROM's address bus, most significant first:
//!
//! ```text
//! ┌─────────────────────┬─────────────────────────┬──────────────────────┐
//! │ opcode (opcode_bits)│ flags (flag_bits)       │ state (state_bits)   │
//! └─────────────────────┴─────────────────────────┴──────────────────────┘
//! ```
//!
//! Within the flag field the first declared flag is the most significant bit.

use std::collections::HashMap;

use crate::error::{AddressField, Result, RomError};

/// Flag values supplied to [`Architecture::encode`](crate::Architecture::encode).
#[derive(Debug, Clone, Copy)]
pub enum FlagBits<'a> {
    /// Already packed flag field.
    Packed(u64),
    /// One value per flag name; missing names read as clear.
    Named(&'a HashMap<String, bool>),
}

/// Widths of the three address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLayout {
    pub opcode_bits: u32,
    pub flag_bits: u32,
    pub state_bits: u32,
}

/// An address split back into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFields {
    pub opcode: u64,
    pub flags: u64,
    pub state: u64,
}

impl AddressLayout {
    /// Total address width in bits.
    ///
    /// Saturates at `u32::MAX`, which every size check then rejects.
    pub fn width(&self) -> u32 {
        self.opcode_bits
            .saturating_add(self.flag_bits)
            .saturating_add(self.state_bits)
    }

    /// Number of ROM entries, `2^width`.
    pub fn entries(&self) -> Result<usize> {
        let width = self.width();
        if width >= usize::BITS {
            return Err(RomError::AddressSpaceTooLarge { width });
        }
        Ok(1usize << width)
    }

    /// Number of distinct values of a field.
    pub fn field_values(&self, field: AddressField) -> u64 {
        let bits = match field {
            AddressField::Opcode => self.opcode_bits,
            AddressField::Flags => self.flag_bits,
            AddressField::State => self.state_bits,
        };
        1u64 << bits
    }

    /// Pack numeric fields into an address.
    ///
    /// Every field must fit its width; anything wider would bleed into the
    /// neighbouring field.
    pub fn encode_raw(&self, state: u64, opcode: u64, flags: u64) -> Result<u64> {
        let width = self.width();
        if width >= u64::BITS {
            return Err(RomError::AddressSpaceTooLarge { width });
        }
        check_field(AddressField::Opcode, opcode, self.opcode_bits)?;
        check_field(AddressField::Flags, flags, self.flag_bits)?;
        check_field(AddressField::State, state, self.state_bits)?;

        let mut address = opcode;
        address = (address << self.flag_bits) | flags;
        address = (address << self.state_bits) | state;
        Ok(address)
    }

    /// Split an address into its fields.
    pub fn decode(&self, address: u64) -> Result<AddressFields> {
        let width = self.width();
        if width >= u64::BITS {
            return Err(RomError::AddressSpaceTooLarge { width });
        }
        if address >> width != 0 {
            return Err(RomError::FieldOverflow {
                field: AddressField::Opcode,
                value: address,
                bits: width,
            });
        }
        Ok(AddressFields {
            state: address & mask(self.state_bits),
            flags: (address >> self.state_bits) & mask(self.flag_bits),
            opcode: address >> (self.state_bits + self.flag_bits),
        })
    }
}

fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

fn check_field(field: AddressField, value: u64, bits: u32) -> Result<()> {
    if value >> bits != 0 {
        return Err(RomError::FieldOverflow { field, value, bits });
    }
    Ok(())
}
