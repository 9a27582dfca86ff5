//! `masm check`: load and validate a description without emitting anything.

use std::path::Path;

use anyhow::Result;

use crate::manifest::MasmManifest;

/// Validate the description and print a one-line summary.
pub fn run(project_dir: &Path, manifest: Option<&MasmManifest>, input: Option<&Path>) -> Result<()> {
    let path = super::resolve_source(project_dir, manifest, input)?;
    let (arch, states) = super::load_description(&path)?;
    super::ensure_valid(&path, &arch, &states)?;

    println!(
        "{}: ok ({} states, {} opcodes, {}-bit address)",
        path.display(),
        states.len(),
        arch.opcodes().len(),
        arch.address_width()
    );
    Ok(())
}
