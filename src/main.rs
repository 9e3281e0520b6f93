use anyhow::Result;
use clap::Parser;
use hookbox::cli::{self, Command};
use hookbox::infra::config::DEFAULT_HOOKS_FILE;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hookbox",
    about = "Lifecycle hooks and readiness waits for compose groups"
)]
struct Cli {
    /// Hooks file (TOML or YAML)
    #[arg(long, short, env = "HOOKBOX_CONFIG", default_value = DEFAULT_HOOKS_FILE)]
    config: std::path::PathBuf,

    /// Log hook polling and engine calls
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    cli::run(cli.command, &cli.config)
}
