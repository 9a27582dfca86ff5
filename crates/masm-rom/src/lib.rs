//! Decision and control ROM compiler for microcode sequencers.
//!
//! A microassembly description declares an architecture (opcode, state and
//! flag widths) and an ordered table of control-states. Compilation turns it
//! into a **decision ROM**: for every address formed from
//! `(opcode, flags, current state)` the code of the next control-state.
//!
//! The pipeline is:
//! - [`validate::load_sections`]: pull the `platform` and `states` sections
//!   out of a loaded [`masm_document::Document`]
//! - [`validate::validate`]: structural checks, reported as a list of issues
//! - [`compile_decision_rom`]: enumerate the address space and fill the table
//! - [`assemble_control_rom`]: optional per-state control words
//! - [`RomImage::render`]: hex, binary or JSON output

pub mod address;
pub mod arch;
pub mod control;
pub mod decision;
pub mod emit;
pub mod error;
pub mod state;
pub mod validate;

pub use address::{AddressFields, AddressLayout, FlagBits};
pub use arch::{Architecture, ControlLine, Opcode};
pub use control::{assemble_control_rom, ControlRom};
pub use decision::{compile_decision_rom, CompileOptions, DecisionRom, TransitionScope};
pub use emit::{RomFormat, RomImage};
pub use error::{AddressField, Result, RomError};
pub use state::{NextState, StateDef, StateTable, TransitionRule};
pub use validate::{has_errors, load_sections, validate, Severity, ValidationIssue};

use masm_document::Document;

/// Everything produced from one description.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub arch: Architecture,
    pub states: StateTable,
    pub decision: DecisionRom,
    /// Present when the architecture declares control lines.
    pub control: Option<ControlRom>,
}

/// Load sections from a document and compile both ROMs.
///
/// Structural validation is left to the caller; this only fails on the
/// errors compilation itself runs into.
pub fn compile_document(document: &Document, options: &CompileOptions) -> Result<Compilation> {
    let (arch, states) = load_sections(document)?;
    let decision = compile_decision_rom(&arch, &states, options)?;
    let control = if arch.controls().is_empty() {
        None
    } else {
        Some(assemble_control_rom(&arch, &states)?)
    };
    Ok(Compilation {
        arch,
        states,
        decision,
        control,
    })
}
