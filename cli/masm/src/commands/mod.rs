//! CLI command implementations.

pub mod build;
pub mod check;
pub mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use masm_rom::{Architecture, StateTable, TransitionScope, ValidationIssue};

use crate::manifest::{parse_scope, BuildConfig, MasmManifest};

/// Pick the description file: an explicit argument wins, then `project.source`.
pub fn resolve_source(
    project_dir: &Path,
    manifest: Option<&MasmManifest>,
    input: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = input {
        return Ok(path.to_path_buf());
    }
    match manifest.and_then(|m| m.project.source.as_deref()) {
        Some(source) => Ok(project_dir.join(source)),
        None => bail!("no description file given and no `project.source` in masm.toml"),
    }
}

/// Load a description file and pull out its two sections.
pub fn load_description(path: &Path) -> Result<(Architecture, StateTable)> {
    let document = masm_document::load_document(path)
        .with_context(|| format!("loading {}", path.display()))?;
    masm_rom::load_sections(&document).with_context(|| format!("reading {}", path.display()))
}

/// Print validation issues to stderr. Returns true when any is an error.
pub fn report_issues(issues: &[ValidationIssue]) -> bool {
    for issue in issues {
        eprintln!("{issue}");
    }
    masm_rom::has_errors(issues)
}

/// Validate and stop on errors; warnings are printed and ignored.
pub fn ensure_valid(path: &Path, arch: &Architecture, states: &StateTable) -> Result<()> {
    if let Err(issues) = masm_rom::validate(arch, states) {
        if report_issues(&issues) {
            let errors = issues
                .iter()
                .filter(|i| i.severity == masm_rom::Severity::Error)
                .count();
            bail!("{} has {errors} validation error(s)", path.display());
        }
    }
    Ok(())
}

/// Transition scope from the command line, else `build.scope`, else the default.
pub fn resolve_scope(arg: Option<&str>, config: &BuildConfig) -> Result<TransitionScope> {
    match arg.or(config.scope.as_deref()) {
        Some(name) => parse_scope(name),
        None => Ok(TransitionScope::default()),
    }
}

/// Refuse address spaces wider than the configured limit.
pub fn ensure_address_fits(arch: &Architecture, max_address_bits: u32) -> Result<()> {
    let width = arch.address_width();
    if width > max_address_bits {
        bail!(
            "decision ROM address is {width} bits wide, above the limit of {max_address_bits} \
             (raise build.max-address-bits in masm.toml)"
        );
    }
    Ok(())
}
