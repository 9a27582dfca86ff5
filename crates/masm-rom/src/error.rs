//! Error types for ROM compilation.

use std::fmt;

/// A field of the decision-ROM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Opcode,
    Flags,
    State,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressField::Opcode => write!(f, "opcode"),
            AddressField::Flags => write!(f, "flags"),
            AddressField::State => write!(f, "state"),
        }
    }
}

/// Errors from ROM compilation.
#[derive(Debug, thiserror::Error)]
pub enum RomError {
    #[error("missing or empty '{0}' section")]
    MissingSection(&'static str),

    #[error("invalid '{section}' section: {source}")]
    InvalidSection {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid definition of state '{state}': {detail}")]
    InvalidState { state: String, detail: String },

    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("state code {code} out of range for {count} states")]
    StateCodeOutOfRange { code: u64, count: usize },

    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),

    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("state '{state}' sets unknown control line '{control}'")]
    UnknownControl { state: String, control: String },

    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: AddressField,
        value: u64,
        bits: u32,
    },

    #[error("state '{state}' sets control '{control}' to {value}, which does not fit in {width} bits")]
    ControlOverflow {
        state: String,
        control: String,
        value: u64,
        width: u32,
    },

    #[error("address width of {width} bits cannot be indexed on this platform")]
    AddressSpaceTooLarge { width: u32 },

    #[error("control word of {width} bits exceeds 64 bits")]
    ControlWordTooWide { width: u64 },
}

/// Result type for ROM operations.
pub type Result<T> = std::result::Result<T, RomError>;
