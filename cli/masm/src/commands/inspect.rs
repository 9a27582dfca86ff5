//! `masm inspect`: architecture summary, state codes, single-address decoding.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use masm_rom::{compile_decision_rom, Architecture, CompileOptions, NextState, StateTable};

use crate::manifest::MasmManifest;

/// Print the summary, or explain one decision-ROM address.
///
/// The address is explained against the ROM `build` would write, so the
/// transition scope resolves the same way.
pub fn run(
    project_dir: &Path,
    manifest: Option<&MasmManifest>,
    input: Option<&Path>,
    address: Option<&str>,
    scope: Option<&str>,
) -> Result<()> {
    let config = manifest.map(|m| m.build.clone()).unwrap_or_default();
    let path = super::resolve_source(project_dir, manifest, input)?;
    let (arch, states) = super::load_description(&path)?;

    match address {
        None => print!("{}", summary(&arch, &states)),
        Some(text) => {
            let address = parse_address(text)?;
            super::ensure_valid(&path, &arch, &states)?;
            super::ensure_address_fits(&arch, config.max_address_bits)?;
            let options = CompileOptions {
                scope: super::resolve_scope(scope, &config)?,
            };
            print!("{}", explain(&arch, &states, &options, address)?);
        }
    }
    Ok(())
}

/// Accepts decimal, `0x` hex and `0b` binary.
fn parse_address(text: &str) -> Result<u64> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        text.parse()
    };
    parsed.with_context(|| format!("invalid address '{text}'"))
}

fn summary(arch: &Architecture, states: &StateTable) -> String {
    let layout = arch.layout();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Address: [opcode:{}][flags:{}][state:{}] = {} bits",
        layout.opcode_bits,
        layout.flag_bits,
        layout.state_bits,
        layout.width()
    );

    let _ = writeln!(out, "Opcodes ({}):", arch.opcodes().len());
    for op in arch.opcodes() {
        let _ = writeln!(out, "  0x{:02X}  {}", op.code, op.name);
    }

    if !arch.flags().is_empty() {
        let _ = writeln!(out, "Flags (MSB first): {}", arch.flags().join(", "));
    }

    if !arch.controls().is_empty() {
        let _ = writeln!(out, "Control lines ({} bits):", arch.control_width());
        for line in arch.controls() {
            let _ = writeln!(out, "  {:<20} {}", line.name, line.width);
        }
    }

    let _ = writeln!(out, "States ({}):", states.len());
    for (code, name, def) in states.iter() {
        let next = match &def.next {
            NextState::Unconditional(target) => format!("-> {target}"),
            NextState::Conditional(rules) => format!("{} rule(s)", rules.len()),
        };
        let _ = writeln!(out, "  {code:>3}  {name:<24} {next}");
    }
    out
}

fn explain(
    arch: &Architecture,
    states: &StateTable,
    options: &CompileOptions,
    address: u64,
) -> Result<String> {
    let fields = arch
        .layout()
        .decode(address)
        .with_context(|| format!("address 0x{address:X}"))?;
    let rom = compile_decision_rom(arch, states, options)?;
    let next = rom
        .get(address)
        .with_context(|| format!("address 0x{address:X} is outside the decision ROM"))?;

    let flags: Vec<String> = arch
        .flags()
        .iter()
        .map(|name| {
            let set = arch
                .flag_mask(name)
                .map(|mask| fields.flags & mask != 0)
                .unwrap_or(false);
            format!("{name}={}", u8::from(set))
        })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "Address 0x{address:X}:");
    let _ = writeln!(
        out,
        "  opcode: 0x{:02X} ({})",
        fields.opcode,
        arch.opcode_name(fields.opcode).unwrap_or("undeclared")
    );
    if !flags.is_empty() {
        let _ = writeln!(out, "  flags:  {}", flags.join(" "));
    }
    let _ = writeln!(out, "  state:  {} ({})", fields.state, state_label(states, fields.state));
    let _ = writeln!(out, "  next:   {} ({})", next, state_label(states, next));
    Ok(out)
}

fn state_label(states: &StateTable, code: u64) -> &str {
    if (code as usize) < states.len() {
        states.state_name_for_code(code).unwrap_or("?")
    } else {
        "unused"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU16: &str = include_str!("../../../../demos/cpu16.masm");

    fn cpu16() -> (Architecture, StateTable) {
        let doc = masm_document::parse_document(CPU16).unwrap();
        masm_rom::load_sections(&doc).unwrap()
    }

    #[test]
    fn address_literals() {
        assert_eq!(parse_address("42").unwrap(), 42);
        assert_eq!(parse_address("0x2A").unwrap(), 42);
        assert_eq!(parse_address("0b101010").unwrap(), 42);
        assert!(parse_address("forty-two").is_err());
    }

    #[test]
    fn summary_lists_states_in_code_order() {
        let (arch, states) = cpu16();
        let text = summary(&arch, &states);
        assert!(text.starts_with("Address: [opcode:7][flags:2][state:5] = 14 bits\n"));
        assert!(text.contains("Flags (MSB first): zero, negative"));
        assert!(text.contains("Control lines (21 bits):"));
        let init = text.find("INIT").unwrap();
        let fetch = text.find("FETCH_DECODE ").unwrap();
        assert!(init < fetch);
        assert!(text.contains("11 rule(s)"));
    }

    #[test]
    fn explains_branch_address() {
        let (arch, states) = cpu16();
        let beq = states.state_code_for_name("BRANCH_IF_EQUAL").unwrap();
        let address = arch
            .encode(beq, "BEQ", masm_rom::FlagBits::Packed(0b10))
            .unwrap();
        let text = explain(&arch, &states, &CompileOptions::default(), address).unwrap();
        assert!(text.contains("opcode: 0x40 (BEQ)"));
        assert!(text.contains("flags:  zero=1 negative=0"));
        assert!(text.contains("state:  10 (BRANCH_IF_EQUAL)"));
        assert!(text.contains("next:   6 (JUMP_IMMEDIATE)"));
    }

    #[test]
    fn explains_unused_state_code() {
        let (arch, states) = cpu16();
        let address = arch.layout().encode_raw(31, 0x7F, 0).unwrap();
        let text = explain(&arch, &states, &CompileOptions::default(), address).unwrap();
        assert!(text.contains("(undeclared)"));
        assert!(text.contains("state:  31 (unused)"));
        assert!(text.contains("next:   0 (INIT)"));
    }

    #[test]
    fn explains_with_configured_scope() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("two.masm"),
            "{ platform: { opcode_size: 1, state_size: 1, opcodes: { NOP: 0 } },\n\
               states: { FETCH: { next: 'EXEC' }, EXEC: { next: 'FETCH' } } }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("masm.toml"),
            "[project]\nname = \"two\"\nsource = \"two.masm\"\n\n[build]\nscope = \"all-states\"\n",
        )
        .unwrap();
        let (manifest, _) = MasmManifest::find_and_load(dir.path()).unwrap().unwrap();
        let (arch, states) =
            crate::commands::load_description(&dir.path().join("two.masm")).unwrap();

        // build.scope = "all-states": EXEC, compiled last, fills every cell
        let options = CompileOptions {
            scope: crate::commands::resolve_scope(None, &manifest.build).unwrap(),
        };
        let text = explain(&arch, &states, &options, 0).unwrap();
        assert!(text.contains("next:   0 (FETCH)"));

        let text = explain(&arch, &states, &CompileOptions::default(), 0).unwrap();
        assert!(text.contains("next:   1 (EXEC)"));

        run(dir.path(), Some(&manifest), None, Some("0"), None).unwrap();
        run(dir.path(), Some(&manifest), None, Some("0"), Some("current-state")).unwrap();
        assert!(run(dir.path(), Some(&manifest), None, Some("0"), Some("every")).is_err());
    }

    #[test]
    fn rejects_address_beyond_width() {
        let (arch, states) = cpu16();
        assert!(explain(&arch, &states, &CompileOptions::default(), 1 << 14).is_err());
    }
}
