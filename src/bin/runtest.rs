use anyhow::Result;
use clap::Parser;
use remember::config::Config;
use remember::runtest::{self, RunOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "runtest", version)]
#[command(about = "Run the Python test enclosing a cursor position")]
struct Cli {
    /// Python source file (relative paths resolve against the current directory)
    file: PathBuf,

    /// Cursor line; lines above it are scanned for the enclosing class/def.
    /// Negative values count back from the end of the file.
    #[arg(allow_negative_numbers = true)]
    position: i64,

    /// Print the test command instead of running it
    #[arg(long)]
    dry_run: bool,

    /// Test command template, `{}` is replaced with the test identifier
    #[arg(long = "cmd")]
    command: Option<String>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    let opts = RunOptions {
        dry_run: cli.dry_run,
        command: cli.command,
        verbose: cli.verbose,
    };
    runtest::run_cli(&cli.file, cli.position, &config.runtest, &opts)
}
