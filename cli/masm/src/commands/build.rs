//! `masm build`: load, validate, compile, write ROM images.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use masm_rom::{assemble_control_rom, compile_decision_rom, CompileOptions, RomFormat, RomImage};
use sha2::{Digest, Sha256};

use crate::manifest::MasmManifest;

/// Run the build pipeline.
///
/// Arguments override the manifest's `[build]` section. Without an output
/// path the decision ROM goes to stdout.
#[allow(clippy::too_many_arguments)]
pub fn run(
    project_dir: &Path,
    manifest: Option<&MasmManifest>,
    input: Option<&Path>,
    output: Option<&Path>,
    format: Option<&str>,
    control: bool,
    scope: Option<&str>,
) -> Result<()> {
    let config = manifest.map(|m| m.build.clone()).unwrap_or_default();

    let path = super::resolve_source(project_dir, manifest, input)?;
    let (arch, states) = super::load_description(&path)?;
    super::ensure_valid(&path, &arch, &states)?;
    super::ensure_address_fits(&arch, config.max_address_bits)?;

    let format = match format.or(config.format.as_deref()) {
        Some(name) => name.parse::<RomFormat>().map_err(anyhow::Error::msg)?,
        None => RomFormat::default(),
    };
    let scope = super::resolve_scope(scope, &config)?;
    let output = output
        .map(Path::to_path_buf)
        .or_else(|| config.output.as_ref().map(|o| project_dir.join(o)));
    tracing::debug!(source = %path.display(), %format, ?scope, "building");

    // Everything is compiled before the first file is written.
    let decision = compile_decision_rom(&arch, &states, &CompileOptions { scope })
        .with_context(|| format!("compiling {}", path.display()))?;
    let control_rom = if control || config.control {
        if arch.controls().is_empty() {
            bail!(
                "control ROM requested but {} declares no control lines",
                path.display()
            );
        }
        if output.is_none() {
            bail!("the control ROM needs an output file (use --output or build.output)");
        }
        Some(
            assemble_control_rom(&arch, &states)
                .with_context(|| format!("assembling control ROM for {}", path.display()))?,
        )
    } else {
        None
    };

    let Some(out) = output else {
        std::io::stdout()
            .write_all(&decision.render(format))
            .context("writing decision ROM to stdout")?;
        return Ok(());
    };

    write_image(&out, &decision.render(format))?;
    println!(
        "Decision ROM: {} entries x {} bits -> {}",
        decision.len(),
        decision.word_bits(),
        out.display()
    );
    println!("  sha256: {}", image_digest(&decision));

    if let Some(rom) = control_rom {
        let control_out = control_path(&out);
        write_image(&control_out, &rom.render(format))?;
        println!(
            "Control ROM: {} words x {} bits -> {}",
            rom.len(),
            rom.word_bits(),
            control_out.display()
        );
        println!("  sha256: {}", image_digest(&rom));
    }

    Ok(())
}

/// SHA-256 of the binary rendering, independent of the output format.
pub fn image_digest(image: &impl RomImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.render(RomFormat::Binary));
    format!("{:x}", hasher.finalize())
}

/// `build/decision.hex` → `build/decision.control.hex`.
fn control_path(decision: &Path) -> PathBuf {
    let stem = decision
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rom".to_string());
    let name = match decision.extension() {
        Some(ext) => format!("{stem}.control.{}", ext.to_string_lossy()),
        None => format!("{stem}.control"),
    };
    decision.with_file_name(name)
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU16: &str = include_str!("../../../../demos/cpu16.masm");

    fn project(manifest: &str) -> (tempfile::TempDir, MasmManifest) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpu16.masm"), CPU16).unwrap();
        fs::write(dir.path().join("masm.toml"), manifest).unwrap();
        let (manifest, _) = MasmManifest::find_and_load(dir.path()).unwrap().unwrap();
        (dir, manifest)
    }

    #[test]
    fn builds_from_manifest() {
        let (dir, manifest) = project(
            "[project]\nname = \"cpu16\"\nsource = \"cpu16.masm\"\n\n\
             [build]\noutput = \"build/decision.hex\"\ncontrol = true\n",
        );
        run(dir.path(), Some(&manifest), None, None, None, false, None).unwrap();

        let hex = fs::read_to_string(dir.path().join("build/decision.hex")).unwrap();
        assert_eq!(hex.split_whitespace().count(), 1 << 14);

        let control = fs::read_to_string(dir.path().join("build/decision.control.hex")).unwrap();
        let words: Vec<&str> = control.split_whitespace().collect();
        assert_eq!(words.len(), 14);
        assert_eq!(words[1], "000011");
    }

    #[test]
    fn flags_override_manifest() {
        let (dir, manifest) = project(
            "[project]\nname = \"cpu16\"\nsource = \"cpu16.masm\"\n\n\
             [build]\noutput = \"build/decision.hex\"\n",
        );
        let out = dir.path().join("rom.bin");
        run(
            dir.path(),
            Some(&manifest),
            None,
            Some(&out),
            Some("binary"),
            false,
            None,
        )
        .unwrap();

        assert_eq!(fs::read(&out).unwrap().len(), 1 << 14);
        assert!(!dir.path().join("build/decision.hex").exists());
    }

    #[test]
    fn address_limit_blocks_build() {
        let (dir, manifest) = project(
            "[project]\nname = \"cpu16\"\nsource = \"cpu16.masm\"\n\n\
             [build]\noutput = \"rom.hex\"\nmax-address-bits = 12\n",
        );
        let err = run(dir.path(), Some(&manifest), None, None, None, false, None).unwrap_err();
        assert!(err.to_string().contains("14 bits wide"));
        assert!(!dir.path().join("rom.hex").exists());
    }

    #[test]
    fn validation_errors_block_build() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.masm");
        fs::write(
            &source,
            "{ platform: { opcode_size: 1, state_size: 1, opcodes: { NOP: 0 } },\n\
               states: { A: { next: 'B' } } }",
        )
        .unwrap();
        let out = dir.path().join("rom.hex");
        let err = run(dir.path(), None, Some(&source), Some(&out), None, false, None).unwrap_err();
        assert!(err.to_string().contains("1 validation error(s)"));
        assert!(!out.exists());
    }

    #[test]
    fn control_without_lines_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("two.masm");
        fs::write(
            &source,
            "{ platform: { opcode_size: 1, state_size: 1, opcodes: { NOP: 0 } },\n\
               states: { FETCH: { next: 'EXEC' }, EXEC: { next: 'FETCH' } } }",
        )
        .unwrap();
        let out = dir.path().join("rom.json");
        let err = run(dir.path(), None, Some(&source), Some(&out), None, true, None).unwrap_err();
        assert!(err.to_string().contains("declares no control lines"));

        run(dir.path(), None, Some(&source), Some(&out), Some("json"), false, None).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "[1,0,1,0]\n");

        run(
            dir.path(),
            None,
            Some(&source),
            Some(&out),
            Some("json"),
            false,
            Some("all-states"),
        )
        .unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "[0,0,0,0]\n");
    }

    #[test]
    fn control_file_names() {
        assert_eq!(
            control_path(Path::new("build/decision.hex")),
            PathBuf::from("build/decision.control.hex")
        );
        assert_eq!(
            control_path(Path::new("rom")),
            PathBuf::from("rom.control")
        );
    }

    #[test]
    fn digest_ignores_output_format() {
        let doc = masm_document::parse_document(CPU16).unwrap();
        let compiled = masm_rom::compile_document(&doc, &CompileOptions::default()).unwrap();
        let digest = image_digest(&compiled.decision);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, image_digest(&compiled.decision));
    }
}
