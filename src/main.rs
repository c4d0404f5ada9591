use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use remember::config::{self, Config};
use remember::session_store::SessionStore;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "remember",
    version,
    about = "Inspect and maintain remembered editor folds and bookmarks",
    long_about = "Manage the session store written by the Remember editor plugin: list, forget or prune the fold and bookmark state recorded per file."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Session store file (defaults to <editor-config>/plugins/remember.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List recorded files with their folded and bookmarked lines
    Show {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop the recorded state of one file
    Forget {
        /// File path as recorded (absolute)
        path: String,
    },

    /// Drop entries for files that no longer exist
    Prune {
        /// Report what would be removed without rewriting the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the session store path
    Path,

    /// Show configuration
    Config {
        /// Create default config file
        #[arg(long)]
        create: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| config.session.store_path());

    if cli.verbose > 0 {
        eprintln!("remember: store={}", store_path.display());
    }

    match cli.command {
        Commands::Show { json } => {
            let store = SessionStore::load(&store_path)?;
            if json {
                println!("{}", store.to_json()?);
            } else {
                print_store(&store, &store_path);
            }
        }

        Commands::Forget { path } => {
            let mut store = SessionStore::load(&store_path)?;
            if store.remove(&path).is_none() {
                bail!("No remembered state for {}", path);
            }
            let stats = store.save(&store_path)?;
            if cli.verbose > 0 {
                eprintln!("remember: wrote {} bytes", stats.bytes_written);
            }
            println!("forgot {}", path);
        }

        Commands::Prune { dry_run } => {
            let mut store = SessionStore::load(&store_path)?;
            let removed = store.retain(|path, _| Path::new(path).exists());
            for path in &removed {
                println!("{} {}", "pruned".yellow(), path);
            }
            if !dry_run && !removed.is_empty() {
                let stats = store.save(&store_path)?;
                if cli.verbose > 0 {
                    eprintln!("remember: wrote {} bytes", stats.bytes_written);
                }
            }
            if cli.verbose > 0 {
                eprintln!(
                    "remember: pruned={} kept={} dry_run={}",
                    removed.len(),
                    store.len(),
                    dry_run
                );
            }
        }

        Commands::Path => {
            println!("{}", store_path.display());
        }

        Commands::Config { create } => {
            if create {
                let path = Config::create_default()?;
                println!("Created: {}", path.display());
            } else {
                config::show_config()?;
            }
        }
    }

    Ok(())
}

fn print_store(store: &SessionStore, store_path: &Path) {
    if store.is_empty() {
        println!("(no remembered files in {})", store_path.display());
        return;
    }

    if let Some(saved_at) = store.saved_at() {
        println!("{} {}", "saved".dimmed(), saved_at.dimmed());
    }
    for (path, record) in store.iter() {
        println!("{}", path.bold());
        if !record.folds.is_empty() {
            println!("  folds:     {}", join_lines(&record.folds));
        }
        if !record.bookmarks.is_empty() {
            println!("  bookmarks: {}", join_lines(&record.bookmarks));
        }
    }
}

/// Stored indices are 0-based; editors show 1-based line numbers.
fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(|l| (l + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
