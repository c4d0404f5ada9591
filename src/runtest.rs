use crate::config::RuntestConfig;
use crate::scope::ScopeQuery;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

pub const PLACEHOLDER: &str = "{}";

#[derive(Debug, Error)]
pub enum RuntestError {
    #[error("File does not exist: {0}")]
    FileNotFound(PathBuf),
    /// The app name is the directory two levels above the file.
    #[error("No application directory two levels above {0}")]
    NoAppDirectory(PathBuf),
    #[error("No shell configured for running tests (runtest.shell is empty)")]
    EmptyShell,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print the command instead of running it.
    pub dry_run: bool,
    /// Overrides `runtest.command` from the config file.
    pub command: Option<String>,
    pub verbose: u8,
}

/// Substitutes `identifier` for every `{}` in `template`. A template without a
/// placeholder gets the identifier appended.
pub fn render_command(template: &str, identifier: &str) -> String {
    if template.contains(PLACEHOLDER) {
        template.replace(PLACEHOLDER, identifier)
    } else {
        format!("{template} {identifier}")
    }
}

/// Runs the rendered test command through the configured shell and waits for
/// it. Only a failure to launch is an error; the test's own exit status is
/// returned to the caller untouched.
pub fn run(command_line: &str, shell: &[String], verbose: u8) -> Result<ExitStatus> {
    let (program, flags) = shell.split_first().ok_or(RuntestError::EmptyShell)?;

    if verbose > 0 {
        eprintln!("runtest: {} {} {:?}", program, flags.join(" "), command_line);
    }

    let status = Command::new(program)
        .args(flags)
        .arg(command_line)
        .status()
        .with_context(|| format!("Failed to run test command via {program}: {command_line}"))?;

    if verbose > 0 {
        eprintln!("runtest: exit code {}", status.code().unwrap_or(-1));
    }
    Ok(status)
}

/// Resolves `file` against the current directory and checks that it exists.
pub fn resolve_file(file: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let path = cwd.join(file);
    if !path.exists() {
        return Err(RuntestError::FileNotFound(path).into());
    }
    Ok(path)
}

/// `runtest <file> <position>`: find the scope under the cursor and run its tests.
pub fn run_cli(
    file: &Path,
    position: i64,
    cfg: &RuntestConfig,
    opts: &RunOptions,
) -> Result<()> {
    let path = resolve_file(file)?;
    let query = ScopeQuery::new(path, position);
    let identifier = query.test_identifier()?;

    if opts.verbose > 0 {
        eprintln!(
            "runtest: file={} position={} id={}",
            query.file_path.display(),
            query.cursor_line,
            identifier
        );
    }

    let template = opts.command.as_deref().unwrap_or(&cfg.command);
    let command_line = render_command(template, &identifier);

    if opts.dry_run {
        println!("{command_line}");
        return Ok(());
    }

    run(&command_line, &cfg.shell, opts.verbose)?;
    Ok(())
}
