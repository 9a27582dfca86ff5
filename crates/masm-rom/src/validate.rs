//! Section presence checks and structural validation of a description.

use std::collections::{HashMap, HashSet};
use std::fmt;

use masm_document::Document;

use crate::arch::Architecture;
use crate::error::{Result, RomError};
use crate::state::{NextState, StateTable};

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found in an architecture or state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: {}", self.message),
            Severity::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

/// Extract the architecture and state table from a loaded document.
///
/// Both sections must be present and non-empty.
pub fn load_sections(document: &Document) -> Result<(Architecture, StateTable)> {
    let platform = document
        .platform()
        .filter(|v| v.as_object().is_some_and(|m| !m.is_empty()))
        .ok_or(RomError::MissingSection(masm_document::PLATFORM_SECTION))?;
    let states = document
        .states()
        .ok_or(RomError::MissingSection(masm_document::STATES_SECTION))?;

    Ok((
        Architecture::from_section(platform)?,
        StateTable::from_section(states)?,
    ))
}

/// Check an architecture and state table for structural correctness.
///
/// Returns `Ok(())` if no issues were found, or `Err(issues)` listing every
/// error and warning.
pub fn validate(
    arch: &Architecture,
    states: &StateTable,
) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    // 1. Opcode codes fit the opcode field and are distinct
    let mut seen_codes: HashMap<u64, &str> = HashMap::new();
    for op in arch.opcodes() {
        if arch.opcode_size() < u64::BITS && op.code >> arch.opcode_size() != 0 {
            issues.push(ValidationIssue::error(format!(
                "opcode '{}' code 0x{:X} does not fit in {} bits",
                op.name,
                op.code,
                arch.opcode_size()
            )));
        }
        if let Some(prev) = seen_codes.insert(op.code, op.name.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "opcodes '{}' and '{}' share code 0x{:X}",
                prev, op.name, op.code
            )));
        }
    }

    // 2. Flag names are unique
    let mut seen_flags = HashSet::new();
    for flag in arch.flags() {
        if !seen_flags.insert(flag.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "flag '{flag}' declared more than once"
            )));
        }
    }

    // 3. Every state code fits the state field
    if arch.state_size() < u64::BITS && (states.len() as u64) > (1u64 << arch.state_size()) {
        issues.push(ValidationIssue::error(format!(
            "{} states do not fit in a {}-bit state field (max {})",
            states.len(),
            arch.state_size(),
            1u64 << arch.state_size()
        )));
    }

    // 4. The whole address fits a 64-bit index
    let width = u64::from(arch.opcode_size())
        + arch.flags().len() as u64
        + u64::from(arch.state_size());
    if width >= u64::from(u64::BITS) {
        issues.push(ValidationIssue::error(format!(
            "decision ROM address is {width} bits wide (max {})",
            u64::BITS - 1
        )));
    }

    // 5. Transition targets, opcodes and flags resolve
    let mut targeted: HashSet<&str> = HashSet::new();
    for (_, name, def) in states.iter() {
        match &def.next {
            NextState::Unconditional(target) => {
                targeted.insert(target.as_str());
                if states.get(target).is_none() {
                    issues.push(ValidationIssue::error(format!(
                        "state '{name}' transitions to unknown state '{target}'"
                    )));
                }
            }
            NextState::Conditional(rules) => {
                for (idx, rule) in rules.iter().enumerate() {
                    targeted.insert(rule.target.as_str());
                    if states.get(&rule.target).is_none() {
                        issues.push(ValidationIssue::error(format!(
                            "state '{name}' rule {idx} targets unknown state '{}'",
                            rule.target
                        )));
                    }
                    for op in rule.opcodes.iter().flatten() {
                        if arch.opcode_code(op).is_err() {
                            issues.push(ValidationIssue::error(format!(
                                "state '{name}' rule {idx} names unknown opcode '{op}'"
                            )));
                        }
                    }
                    for (flag, _) in &rule.flags {
                        if arch.flag_index(flag).is_err() {
                            issues.push(ValidationIssue::error(format!(
                                "state '{name}' rule {idx} tests unknown flag '{flag}'"
                            )));
                        }
                    }
                    if rule.opcodes.is_none() && rule.flags.is_empty() && idx + 1 < rules.len() {
                        issues.push(ValidationIssue::warning(format!(
                            "state '{name}' rule {idx} matches everything; later rules are unreachable"
                        )));
                    }
                }
            }
        }
    }

    // 6. Control lines are well formed and assignments fit
    for line in arch.controls() {
        if line.width == 0 {
            issues.push(ValidationIssue::error(format!(
                "control line '{}' has width 0",
                line.name
            )));
        }
    }
    if arch.control_width() > u64::from(u64::BITS) {
        issues.push(ValidationIssue::error(format!(
            "control word is {} bits wide (max 64)",
            arch.control_width()
        )));
    }
    for (_, name, def) in states.iter() {
        for (control, value) in &def.control {
            match arch.control(control) {
                None => issues.push(ValidationIssue::error(format!(
                    "state '{name}' sets unknown control line '{control}'"
                ))),
                Some(line) if line.width < u64::BITS && value >> line.width != 0 => {
                    issues.push(ValidationIssue::error(format!(
                        "state '{name}' sets control '{control}' to {value}, wider than {} bits",
                        line.width
                    )))
                }
                Some(_) => {}
            }
        }
    }

    // 7. Every state other than the initial one is reachable
    for (code, name, _) in states.iter() {
        if code != 0 && !targeted.contains(name) {
            issues.push(ValidationIssue::warning(format!(
                "state '{name}' is never the target of a transition"
            )));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// True when any issue is an error.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}
