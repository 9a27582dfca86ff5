//! `masm.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use masm_rom::TransitionScope;
use serde::{Deserialize, Serialize};

/// File name searched for by [`MasmManifest::find_and_load`].
pub const MANIFEST_FILE: &str = "masm.toml";

/// Widest decision ROM a build will allocate unless configured otherwise.
pub const DEFAULT_MAX_ADDRESS_BITS: u32 = 24;

/// The top-level manifest structure for a microcode project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasmManifest {
    /// Project metadata (required).
    pub project: ProjectConfig,
    /// Build defaults; CLI flags take precedence.
    #[serde(default)]
    pub build: BuildConfig,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required).
    pub name: String,
    /// Description file, relative to the manifest directory.
    #[serde(default)]
    pub source: Option<String>,
}

/// Build configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Decision ROM output path, relative to the manifest directory.
    #[serde(default)]
    pub output: Option<String>,
    /// Image format (hex, binary, json).
    #[serde(default)]
    pub format: Option<String>,
    /// Also emit the control ROM.
    #[serde(default)]
    pub control: bool,
    /// Transition scope for unconditional states (current-state, all-states).
    #[serde(default)]
    pub scope: Option<String>,
    /// Refuse to build a decision ROM with a wider address.
    #[serde(default = "default_max_address_bits")]
    pub max_address_bits: u32,
}

fn default_max_address_bits() -> u32 {
    DEFAULT_MAX_ADDRESS_BITS
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: None,
            format: None,
            control: false,
            scope: None,
            max_address_bits: DEFAULT_MAX_ADDRESS_BITS,
        }
    }
}

impl MasmManifest {
    /// Search upward from `start_dir` for a `masm.toml` file, parse and return it
    /// along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: MasmManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                tracing::debug!(path = %candidate.display(), "loaded manifest");
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing masm.toml")
    }
}

/// Parse a transition scope name as written in `masm.toml` or on the command line.
pub fn parse_scope(name: &str) -> Result<TransitionScope> {
    match name {
        "current-state" | "current" => Ok(TransitionScope::CurrentState),
        "all-states" | "all" => Ok(TransitionScope::AllStates),
        other => bail!("unknown transition scope '{other}' (expected current-state or all-states)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
[project]
name = "cpu16"
source = "cpu16.masm"

[build]
output = "build/decision.hex"
format = "hex"
control = true
scope = "all-states"
max-address-bits = 16
"#;
        let manifest = MasmManifest::from_str(toml_str).unwrap();
        assert_eq!(manifest.project.name, "cpu16");
        assert_eq!(manifest.project.source.as_deref(), Some("cpu16.masm"));
        assert_eq!(manifest.build.output.as_deref(), Some("build/decision.hex"));
        assert_eq!(manifest.build.format.as_deref(), Some("hex"));
        assert!(manifest.build.control);
        assert_eq!(manifest.build.scope.as_deref(), Some("all-states"));
        assert_eq!(manifest.build.max_address_bits, 16);
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = MasmManifest::from_str("[project]\nname = \"minimal\"\n").unwrap();
        assert_eq!(manifest.project.name, "minimal");
        assert!(manifest.project.source.is_none());
        assert!(!manifest.build.control);
        assert_eq!(manifest.build.max_address_bits, DEFAULT_MAX_ADDRESS_BITS);
    }

    #[test]
    fn build_section_defaults_limit() {
        let manifest =
            MasmManifest::from_str("[project]\nname = \"x\"\n\n[build]\nformat = \"json\"\n")
                .unwrap();
        assert_eq!(manifest.build.max_address_bits, DEFAULT_MAX_ADDRESS_BITS);
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(MasmManifest::from_str("this is not valid toml [[[").is_err());
        assert!(MasmManifest::from_str("[build]\ncontrol = true\n").is_err());
    }

    #[test]
    fn scope_names() {
        assert_eq!(
            parse_scope("current-state").unwrap(),
            TransitionScope::CurrentState
        );
        assert_eq!(parse_scope("all").unwrap(), TransitionScope::AllStates);
        assert!(parse_scope("every").is_err());
    }

    #[test]
    fn find_and_load_in_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[project]\nname = \"here\"\n").unwrap();

        let (manifest, found_dir) = MasmManifest::find_and_load(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.project.name, "here");
        assert_eq!(found_dir, dir.path());
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[project]\nname = \"parent\"\n").unwrap();

        let nested = dir.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found_dir) = MasmManifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.project.name, "parent");
        assert_eq!(found_dir, dir.path());
    }

    #[test]
    fn find_and_load_reports_bad_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[project]\n").unwrap();

        let err = MasmManifest::find_and_load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
