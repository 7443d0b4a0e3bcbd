//! Flag table generator binary.
//!
//! Reads an instruction template listing and writes the Rust source of the
//! frozen flag table.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use x86_encode_core::core::FlagRegistry;
use x86_encode_core::flaggen;
use x86_encode_core::x86::standard_registry;

#[derive(Parser, Debug)]
#[command(name = "flaggen", about = "Generate an interned instruction flag table")]
struct Args {
    /// Template listing: `MNEMONIC FLAG,FLAG,...` per line.
    #[arg(short, long)]
    templates: PathBuf,

    /// Flag declaration file; defaults to the built-in x86 flags.
    #[arg(short, long)]
    declarations: Option<PathBuf>,

    /// Output file; defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log build progress.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let custom;
    let registry: &FlagRegistry = match &args.declarations {
        Some(path) => {
            custom = FlagRegistry::parse(&flaggen::read_source(path)?)?;
            log::info!("loaded {} flags from {}", custom.flags().len(), path.display());
            &custom
        }
        None => standard_registry(),
    };

    let listing = flaggen::read_source(&args.templates)?;
    let source = flaggen::generate(registry, &listing)?;

    match &args.output {
        Some(path) => {
            fs::write(path, source)?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{source}"),
    }

    Ok(())
}
