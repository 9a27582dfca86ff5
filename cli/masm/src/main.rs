//! masm: compile microassembly descriptions into sequencer decision ROMs.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use manifest::MasmManifest;

#[derive(Parser)]
#[command(name = "masm", version, about = "Microcode decision-ROM compiler")]
struct Cli {
    /// Log compilation progress (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a description into a decision ROM image
    Build {
        /// Description file (default: project.source from masm.toml)
        file: Option<PathBuf>,
        /// Output file (default: build.output from masm.toml, else stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Image format (hex, binary, json)
        #[arg(short, long)]
        format: Option<String>,
        /// Also emit the control ROM next to the decision ROM
        #[arg(long)]
        control: bool,
        /// Which current states an unconditional transition covers (current-state, all-states)
        #[arg(long)]
        scope: Option<String>,
    },
    /// Load and validate a description
    Check {
        /// Description file (default: project.source from masm.toml)
        file: Option<PathBuf>,
    },
    /// Show the address layout and state codes, or explain one address
    Inspect {
        /// Description file (default: project.source from masm.toml)
        file: Option<PathBuf>,
        /// Decision-ROM address to decode (decimal, 0x hex or 0b binary)
        #[arg(long)]
        address: Option<String>,
        /// Transition scope used to explain --address (current-state, all-states)
        #[arg(long)]
        scope: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,masm=debug,masm_document=debug,masm_rom=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let (manifest, project_dir) = load_manifest_optional(&cwd)?;
    let project_dir = project_dir.unwrap_or(cwd);

    match cli.command {
        Commands::Build {
            file,
            output,
            format,
            control,
            scope,
        } => commands::build::run(
            &project_dir,
            manifest.as_ref(),
            file.as_deref(),
            output.as_deref(),
            format.as_deref(),
            control,
            scope.as_deref(),
        ),

        Commands::Check { file } => {
            commands::check::run(&project_dir, manifest.as_ref(), file.as_deref())
        }

        Commands::Inspect {
            file,
            address,
            scope,
        } => commands::inspect::run(
            &project_dir,
            manifest.as_ref(),
            file.as_deref(),
            address.as_deref(),
            scope.as_deref(),
        ),
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<MasmManifest>, Option<PathBuf>)> {
    match MasmManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    const CPU16: &str = include_str!("../../../demos/cpu16.masm");

    /// Full workflow: manifest discovery → check → inspect → build.
    #[test]
    fn check_inspect_build_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("cpu16");
        let nested = project_path.join("src").join("alu");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(project_path.join("cpu16.masm"), CPU16).unwrap();
        std::fs::write(
            project_path.join("masm.toml"),
            "[project]\nname = \"cpu16\"\nsource = \"cpu16.masm\"\n\n\
             [build]\noutput = \"out/decision.bin\"\nformat = \"binary\"\ncontrol = true\n",
        )
        .unwrap();

        // 1. Discover from a nested directory
        let (manifest, project_dir) = load_manifest_optional(&nested).unwrap();
        let manifest = manifest.unwrap();
        let project_dir = project_dir.unwrap();
        assert_eq!(project_dir, project_path);

        // 2. Check
        commands::check::run(&project_dir, Some(&manifest), None).unwrap();

        // 3. Inspect, summary and one address
        commands::inspect::run(&project_dir, Some(&manifest), None, None, None).unwrap();
        commands::inspect::run(&project_dir, Some(&manifest), None, Some("0x1234"), None)
            .unwrap();

        // 4. Build
        commands::build::run(&project_dir, Some(&manifest), None, None, None, false, None)
            .unwrap();
        let decision = std::fs::read(project_path.join("out/decision.bin")).unwrap();
        assert_eq!(decision.len(), 1 << 14);
        // 21-bit control words take three bytes each
        let control = std::fs::read(project_path.join("out/decision.control.bin")).unwrap();
        assert_eq!(control.len(), 14 * 3);
        assert_eq!(&control[3..6], &[0x11, 0x00, 0x00]);
    }

    #[test]
    fn no_manifest_needs_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = commands::check::run(dir.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("no description file given"));
    }

    #[test]
    fn cli_parses_global_verbose() {
        let cli = Cli::try_parse_from(["masm", "build", "cpu.masm", "-v", "--format", "json"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Build { file, format, .. } => {
                assert_eq!(file, Some(PathBuf::from("cpu.masm")));
                assert_eq!(format.as_deref(), Some("json"));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn cli_parses_inspect_scope() {
        let cli = Cli::try_parse_from([
            "masm",
            "inspect",
            "--address",
            "0x3",
            "--scope",
            "all-states",
        ])
        .unwrap();
        match cli.command {
            Commands::Inspect { address, scope, .. } => {
                assert_eq!(address.as_deref(), Some("0x3"));
                assert_eq!(scope.as_deref(), Some("all-states"));
            }
            _ => panic!("expected inspect"),
        }
    }
}
