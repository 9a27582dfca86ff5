//! Control-state table and next-state rules.
//!
//! State codes are not stored: a state's code is its position in the table,
//! which follows the order of the source document.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, RomError};

/// Where the sequencer goes after a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextState {
    /// Always the named state.
    Unconditional(String),
    /// The first matching rule decides; no match stays in the current state.
    Conditional(Vec<TransitionRule>),
}

/// One branch of a conditional transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    /// Opcodes this rule applies to; `None` matches every opcode.
    pub opcodes: Option<Vec<String>>,
    /// Required flag values, by flag name.
    pub flags: Vec<(String, bool)>,
    /// Target state name.
    pub target: String,
}

impl TransitionRule {
    /// Rule without conditions.
    pub fn always(target: impl Into<String>) -> Self {
        Self {
            opcodes: None,
            flags: Vec::new(),
            target: target.into(),
        }
    }

    /// Restrict the rule to the given opcodes.
    pub fn on_opcodes<S: Into<String>>(mut self, opcodes: impl IntoIterator<Item = S>) -> Self {
        self.opcodes = Some(opcodes.into_iter().map(Into::into).collect());
        self
    }

    /// Require a flag value.
    pub fn when_flag(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.flags.push((flag.into(), value));
        self
    }
}

/// A single state definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDef {
    pub next: NextState,
    /// Control-line assignments, in source order.
    pub control: IndexMap<String, u64>,
}

impl StateDef {
    /// State that always transitions to `target`.
    pub fn goto(target: impl Into<String>) -> Self {
        Self {
            next: NextState::Unconditional(target.into()),
            control: IndexMap::new(),
        }
    }

    /// State with conditional transitions.
    pub fn branch(rules: Vec<TransitionRule>) -> Self {
        Self {
            next: NextState::Conditional(rules),
            control: IndexMap::new(),
        }
    }

    /// Set a control-line value.
    pub fn with_control(mut self, name: impl Into<String>, value: u64) -> Self {
        self.control.insert(name.into(), value);
        self
    }
}

/// Ordered mapping from state name to definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateTable {
    states: IndexMap<String, StateDef>,
}

impl StateTable {
    /// Build a table from definitions in code order.
    pub fn from_definitions<N: Into<String>>(defs: impl IntoIterator<Item = (N, StateDef)>) -> Self {
        Self {
            states: defs.into_iter().map(|(n, d)| (n.into(), d)).collect(),
        }
    }

    /// Build from the `states` section of a loaded document.
    pub fn from_section(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(RomError::MissingSection(masm_document::STATES_SECTION)),
        };

        let mut states = IndexMap::with_capacity(map.len());
        for (name, def) in map {
            states.insert(name.clone(), parse_state(name, def)?);
        }
        Ok(Self { states })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterate `(code, name, definition)` in code order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str, &StateDef)> {
        self.states
            .iter()
            .enumerate()
            .map(|(code, (name, def))| (code as u64, name.as_str(), def))
    }

    /// Definition of a named state.
    pub fn get(&self, name: &str) -> Option<&StateDef> {
        self.states.get(name)
    }

    /// Code of a named state: its 0-based position in the table.
    pub fn state_code_for_name(&self, name: &str) -> Result<u64> {
        debug_assert!(!self.states.is_empty(), "state lookup on an empty table");
        self.states
            .get_index_of(name)
            .map(|idx| idx as u64)
            .ok_or_else(|| RomError::UnknownState(name.to_string()))
    }

    /// Name of the state at position `code`.
    pub fn state_name_for_code(&self, code: u64) -> Result<&str> {
        debug_assert!(!self.states.is_empty(), "state lookup on an empty table");
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.states.get_index(idx))
            .map(|(name, _)| name.as_str())
            .ok_or(RomError::StateCodeOutOfRange {
                code,
                count: self.states.len(),
            })
    }
}

fn invalid(state: &str, detail: impl Into<String>) -> RomError {
    RomError::InvalidState {
        state: state.to_string(),
        detail: detail.into(),
    }
}

fn parse_state(name: &str, value: &Value) -> Result<StateDef> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(name, "expected a mapping"))?;

    let mut next = None;
    let mut control = IndexMap::new();
    for (key, field) in obj {
        match key.as_str() {
            "next" => next = Some(parse_next(name, field)?),
            "control" => control = parse_control(name, field)?,
            other => return Err(invalid(name, format!("unknown field '{other}'"))),
        }
    }

    let next = next.ok_or_else(|| invalid(name, "missing 'next'"))?;
    Ok(StateDef { next, control })
}

fn parse_next(name: &str, value: &Value) -> Result<NextState> {
    match value {
        Value::String(target) => Ok(NextState::Unconditional(target.clone())),
        Value::Array(rules) => rules
            .iter()
            .map(|rule| parse_rule(name, rule))
            .collect::<Result<Vec<_>>>()
            .map(NextState::Conditional),
        _ => Err(invalid(
            name,
            "'next' must be a state name or a list of rules",
        )),
    }
}

fn parse_rule(name: &str, value: &Value) -> Result<TransitionRule> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(name, "transition rule must be a mapping"))?;

    let mut target = None;
    let mut opcodes = None;
    let mut flags = Vec::new();
    for (key, field) in obj {
        match key.as_str() {
            "state" => {
                let t = field
                    .as_str()
                    .ok_or_else(|| invalid(name, "rule 'state' must be a string"))?;
                target = Some(t.to_string());
            }
            "opcodes" => {
                let list = field
                    .as_array()
                    .ok_or_else(|| invalid(name, "rule 'opcodes' must be a list"))?;
                let names = list
                    .iter()
                    .map(|op| {
                        op.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| invalid(name, "opcode names must be strings"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                opcodes = Some(names);
            }
            flag => {
                let v = as_bit(field).ok_or_else(|| {
                    invalid(name, format!("condition on '{flag}' must be a boolean"))
                })?;
                flags.push((flag.to_string(), v == 1));
            }
        }
    }

    let target = target.ok_or_else(|| invalid(name, "transition rule missing 'state'"))?;
    Ok(TransitionRule {
        opcodes,
        flags,
        target,
    })
}

fn parse_control(name: &str, value: &Value) -> Result<IndexMap<String, u64>> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(name, "'control' must be a mapping"))?;
    obj.iter()
        .map(|(line, v)| {
            let value = match v {
                Value::Bool(b) => Some(u64::from(*b)),
                other => other.as_u64(),
            };
            value
                .map(|value| (line.clone(), value))
                .ok_or_else(|| {
                    invalid(
                        name,
                        format!("control '{line}' must be a non-negative integer or boolean"),
                    )
                })
        })
        .collect()
}

/// Booleans and 0/1 integers both read as a single bit.
fn as_bit(value: &Value) -> Option<u64> {
    match value {
        Value::Bool(b) => Some(u64::from(*b)),
        Value::Number(n) => n.as_u64().filter(|v| *v <= 1),
        _ => None,
    }
}
