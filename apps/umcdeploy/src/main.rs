//! umcdeploy entry point.

mod app;
mod config;
mod display;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use umcdeploy_content_store::KuboConnector;

/// Publish the UMC landing page to IPFS.
///
/// By default an existing build is reused and the project is built only
/// when no build directory is present.
#[derive(Parser, Debug)]
#[command(name = "umcdeploy", version, about, long_about = None)]
struct Cli {
    /// Force rebuild before deployment.
    #[arg(short, long)]
    build: bool,

    /// Skip build step (use existing build directory).
    #[arg(short, long)]
    skip_build: bool,

    /// Project root containing package.json and the build directory.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to configuration file (default: <root>/umcdeploy.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging. Repeat for more verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "umcdeploy starting");

    let options = app::RunOptions {
        build: cli.build,
        skip_build: cli.skip_build,
        root: cli.root,
        config: cli.config,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            display::failure(&anyhow::Error::new(e).context("cannot start async runtime"));
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(app::run(options, Box::new(KuboConnector))) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            display::failure(&e);
            ExitCode::FAILURE
        }
    }
}
