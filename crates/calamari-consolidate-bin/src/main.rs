use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use calamari_consolidate::{
    CompressionLevel, ConsolidateConfig, ConsolidationOutcome, Consolidator, PackageReference,
};
use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, util::SubscriberInitExt, EnvFilter};

fn parse_package_reference(value: &str) -> Result<PackageReference, String> {
    match value.splitn(3, '=').collect::<Vec<_>>().as_slice() {
        [name, version, path] if !name.is_empty() && !version.is_empty() && !path.is_empty() => {
            Ok(PackageReference::new(*name, *version, *path))
        }
        _ => Err(format!(
            "`{value}` is not a package reference, expected NAME=VERSION=PATH"
        )),
    }
}

/// Command line options available through the `consolidate-calamari` cli.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None, after_help = "Examples:
    $ consolidate-calamari --output-dir out --package Calamari=12.0.2=~/.nuget/packages/calamari/12.0.2
    $ consolidate-calamari --output-dir out --packages-file packages.json")]
struct Args {
    /// The directory the consolidated package is written to. It must exist.
    #[arg(short, long, env = "CALAMARI_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// A resolved package in the form `NAME=VERSION=PATH`. Can be repeated.
    #[arg(short, long = "package", value_parser = parse_package_reference)]
    packages: Vec<PackageReference>,

    /// A JSON file containing an array of `{"Name", "Version", "ResolvedPath"}`
    /// objects.
    #[arg(long)]
    packages_file: Option<PathBuf>,

    /// Overrides the engine version that is part of the package fingerprint.
    #[arg(long)]
    engine_version: Option<String>,

    /// The compression level: `lowest`, `default`, `highest` or 1-9.
    #[arg(long, default_value = "lowest")]
    compression: CompressionLevel,

    /// Read the input packages one after the other.
    #[arg(long)]
    no_parallel: bool,

    /// Log verbose
    #[clap(short, long, global = true)]
    verbose: bool,
}

fn read_packages_file(path: &Path) -> anyhow::Result<Vec<PackageReference>> {
    let contents = fs_err::read_to_string(path)?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse the packages in {}", path.display()))
}

/// Entry point of the `consolidate-calamari` cli.
fn main() -> anyhow::Result<ExitCode> {
    // Parse the command line arguments
    let opt = Args::parse();

    // Determine the logging level based on the the verbose flag and the RUST_LOG environment
    // variable.
    let default_filter = if opt.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_filter.into())
        .from_env()?;

    // Setup the tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish()
        .try_init()?;

    let mut references = opt.packages;
    if let Some(packages_file) = &opt.packages_file {
        references.extend(read_packages_file(packages_file)?);
    }
    if references.is_empty() {
        tracing::warn!("no packages were specified");
    }

    let mut config = ConsolidateConfig {
        compression: opt.compression,
        parallel_extraction: !opt.no_parallel,
        ..ConsolidateConfig::default()
    };
    if let Some(engine_version) = opt.engine_version {
        config.engine_version = engine_version;
    }

    let outcome = Consolidator::new(config)
        .execute(&opt.output_dir, &references)
        .context("failed to consolidate the Calamari packages")?;

    if let ConsolidationOutcome::Created(package) = &outcome {
        if !package.conflicts.is_empty() {
            tracing::warn!("{} paths have conflicting contents", package.conflicts.len());
        }
    }

    match outcome.output_path() {
        Some(path) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}
