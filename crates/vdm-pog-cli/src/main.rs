//! vdm-pog CLI
//!
//! # Commands
//!
//! - `vdm-pog generate <module.json>` - Print the proof obligations of a module
//! - `vdm-pog generate <module.json> --json` - Same, as a JSON array
//!
//! The module is the type checker's typed tree serialised as JSON. Set
//! `RUST_LOG=vdm_pog=debug` to trace the walk.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vdm_core::Module;
use vdm_pog::{generate, ObligationList, PogOptions};

#[derive(Parser)]
#[command(name = "vdm-pog")]
#[command(about = "Proof obligation generator for type-checked VDM models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the proof obligations of a module
    Generate {
        /// Typed module tree (JSON)
        module: PathBuf,
        /// Options file (JSON); missing fields take their defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Emit obligations as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Only show obligations of this definition
        #[arg(short, long)]
        definition: Option<String>,
        /// Omit obligations decided by inspection
        #[arg(long)]
        skip_trivial: bool,
    },
}

fn load_options(path: Option<&Path>, skip_trivial: bool) -> anyhow::Result<PogOptions> {
    let mut options = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading options {}", path.display()))?;
            PogOptions::from_json(&text)
                .with_context(|| format!("parsing options {}", path.display()))?
        }
        None => PogOptions::default(),
    };
    options.skip_trivial |= skip_trivial;
    Ok(options)
}

fn load_module(path: &Path) -> anyhow::Result<Module> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading module {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing module {}", path.display()))
}

/// Generate, filter and format the obligations of the module at `path`
fn run_generate(
    path: &Path,
    options: &PogOptions,
    definition: Option<&str>,
    json: bool,
) -> anyhow::Result<String> {
    let module = load_module(path)?;
    let mut obligations: ObligationList = generate(&module, options)
        .with_context(|| format!("generating obligations for {}", module.file))?;

    if let Some(name) = definition {
        obligations.retain(|po| po.name == name);
        info!(definition = name, count = obligations.len(), "filtered obligations");
    }

    if json {
        return Ok(serde_json::to_string_pretty(&obligations)?);
    }
    let rendered: Vec<String> = obligations
        .iter()
        .map(|po| po.render(options.line_width))
        .collect();
    Ok(rendered.join("\n\n"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            module,
            config,
            json,
            definition,
            skip_trivial,
        } => {
            let options = load_options(config.as_deref(), skip_trivial)?;
            let output = run_generate(&module, &options, definition.as_deref(), json)?;
            if !output.is_empty() {
                println!("{output}");
            }
        }
    }

    Ok(())
}
