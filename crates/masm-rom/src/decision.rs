//! Decision-ROM compilation.
//!
//! The decision ROM maps every address (opcode, flags, current state) to the
//! code of the next control-state. Compilation enumerates the whole address
//! space once per state and fills each cell; cells no state writes keep the
//! default code 0.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::address::AddressLayout;
use crate::arch::Architecture;
use crate::error::{AddressField, Result};
use crate::state::{NextState, StateTable, TransitionRule};

/// Which current-state values a state's transitions are written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionScope {
    /// Only cells whose state field equals the compiled state's own code.
    #[default]
    CurrentState,
    /// Every state-field value; later states overwrite earlier ones.
    AllStates,
}

/// Options for [`compile_decision_rom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub scope: TransitionScope,
}

/// The compiled decision table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRom {
    layout: AddressLayout,
    entries: Vec<u64>,
}

impl DecisionRom {
    /// Address layout the table is indexed by.
    pub fn layout(&self) -> AddressLayout {
        self.layout
    }

    /// Next-state codes indexed by address.
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next-state code stored at an address.
    pub fn get(&self, address: u64) -> Option<u64> {
        usize::try_from(address)
            .ok()
            .and_then(|idx| self.entries.get(idx).copied())
    }

    /// Next-state code for numeric (state, opcode, flags) fields.
    pub fn lookup(&self, state: u64, opcode: u64, flags: u64) -> Result<u64> {
        let address = self.layout.encode_raw(state, opcode, flags)?;
        // encode_raw keeps the address below 2^width, which entries covers.
        Ok(self.entries[address as usize])
    }

    pub fn into_entries(self) -> Vec<u64> {
        self.entries
    }
}

/// A transition rule with names resolved to codes.
struct ResolvedRule {
    opcodes: Option<HashSet<u64>>,
    flags: Vec<(u64, bool)>,
    target: u64,
}

impl ResolvedRule {
    fn resolve(arch: &Architecture, states: &StateTable, rule: &TransitionRule) -> Result<Self> {
        let opcodes = match &rule.opcodes {
            Some(names) => Some(
                names
                    .iter()
                    .map(|name| arch.opcode_code(name))
                    .collect::<Result<HashSet<_>>>()?,
            ),
            None => None,
        };
        let flags = rule
            .flags
            .iter()
            .map(|(name, value)| Ok((arch.flag_mask(name)?, *value)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            opcodes,
            flags,
            target: states.state_code_for_name(&rule.target)?,
        })
    }

    fn matches(&self, opcode: u64, flags: u64) -> bool {
        let opcode_ok = self
            .opcodes
            .as_ref()
            .map_or(true, |set| set.contains(&opcode));
        opcode_ok
            && self
                .flags
                .iter()
                .all(|(mask, value)| (flags & mask != 0) == *value)
    }
}

/// Compile the decision ROM for an architecture and state table.
///
/// Fails on the first unresolvable name or out-of-width field; no partial
/// table is returned.
pub fn compile_decision_rom(
    arch: &Architecture,
    states: &StateTable,
    options: &CompileOptions,
) -> Result<DecisionRom> {
    let layout = arch.layout();
    let mut entries = vec![0u64; layout.entries()?];

    let opcode_values = layout.field_values(AddressField::Opcode);
    let flag_values = layout.field_values(AddressField::Flags);

    for (code, name, def) in states.iter() {
        let current_states = match options.scope {
            TransitionScope::CurrentState => code..code + 1,
            TransitionScope::AllStates => 0..layout.field_values(AddressField::State),
        };

        match &def.next {
            NextState::Unconditional(target) => {
                let next = states.state_code_for_name(target)?;
                debug!(state = name, code, next, "unconditional transition");
                for cur_state in current_states {
                    for opcode in 0..opcode_values {
                        for flags in 0..flag_values {
                            let address = layout.encode_raw(cur_state, opcode, flags)?;
                            entries[address as usize] = next;
                        }
                    }
                }
            }
            NextState::Conditional(rules) => {
                let rules = rules
                    .iter()
                    .map(|rule| ResolvedRule::resolve(arch, states, rule))
                    .collect::<Result<Vec<_>>>()?;
                debug!(state = name, code, rules = rules.len(), "conditional transition");
                for cur_state in current_states {
                    for opcode in 0..opcode_values {
                        for flags in 0..flag_values {
                            let next = rules
                                .iter()
                                .find(|rule| rule.matches(opcode, flags))
                                .map_or(code, |rule| rule.target);
                            let address = layout.encode_raw(cur_state, opcode, flags)?;
                            entries[address as usize] = next;
                        }
                    }
                }
            }
        }
    }

    info!(
        width = layout.width(),
        entries = entries.len(),
        states = states.len(),
        "decision ROM compiled"
    );
    Ok(DecisionRom { layout, entries })
}
