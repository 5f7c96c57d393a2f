//! The `rapport-migrate` directive runner.
//!
//! ```text
//! rapport-migrate <up|down|pending|executed> [--count N]
//! ```
//!
//! [`run`] computes an [`Exit`] instead of terminating the process, so directives can be
//! exercised against any schema and ledger.

use clap::{Parser, ValueEnum};
use log::error;
use rapport_core::catalog::SchemaHandle;
use rapport_core::ledger::MigrationLedger;
use rapport_core::migrator::{MigrationError, Migrator};
use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

/// What to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Directive {
    /// Apply every pending step
    Up,
    /// Revert the most recent steps
    Down,
    /// List steps not yet applied
    Pending,
    /// List applied steps
    Executed,
}

/// Apply or revert rapport schema migrations.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "rapport-migrate", version, about, long_about = None)]
pub struct Command {
    /// Migration directive
    #[arg(value_enum)]
    pub directive: Directive,

    /// Number of steps to revert with `down`
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,
}

/// Process outcome of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The directive completed.
    Success,
    /// The directive failed.
    Failure,
    /// The command line could not be parsed.
    Usage,
}

impl Exit {
    /// The numeric exit code.
    pub fn code(self) -> u8 {
        match self {
            Exit::Success => 0,
            Exit::Failure => 1,
            Exit::Usage => 2,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Parses the command line, printing usage on failure.
///
/// `--help` and `--version` print and yield [`Exit::Success`].
pub fn parse_args<I, T>(args: I) -> Result<Command, Exit>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Command::try_parse_from(args).map_err(|e| {
        let _ = e.print();
        if e.use_stderr() {
            Exit::Usage
        } else {
            Exit::Success
        }
    })
}

/// The single-line failure report written to stderr.
pub fn failure_line(err: &MigrationError) -> String {
    match err {
        MigrationError::StepFailed {
            step_id,
            direction,
            source,
        } => format!("migration failed: step={step_id} direction={direction}: {source}"),
        MigrationError::RecordFailed {
            step_id,
            direction,
            source,
        } => format!("migration failed: step={step_id} direction={direction}: {source}"),
        MigrationError::ChecksumMismatch { step_id, .. }
        | MigrationError::UnknownStep { step_id } => {
            format!("migration failed: step={step_id}: {err}")
        }
        MigrationError::Ledger(_) => format!("migration failed: {err}"),
    }
}

/// Runs `command`, reporting to stdout and stderr.
pub async fn run<S, L>(command: &Command, migrator: &Migrator<S, L>) -> Exit
where
    S: SchemaHandle,
    L: MigrationLedger,
{
    run_with(command, migrator, &mut io::stdout(), &mut io::stderr()).await
}

/// Runs `command`, reporting to the given writers.
pub async fn run_with<S, L>(
    command: &Command,
    migrator: &Migrator<S, L>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Exit
where
    S: SchemaHandle,
    L: MigrationLedger,
{
    match execute(command, migrator, out).await {
        Ok(Ok(())) => Exit::Success,
        Ok(Err(e)) => {
            error!("{}", e);
            let _ = writeln!(err, "{}", failure_line(&e));
            Exit::Failure
        }
        Err(e) => {
            error!("Failed to write report: {}", e);
            Exit::Failure
        }
    }
}

async fn execute<S, L>(
    command: &Command,
    migrator: &Migrator<S, L>,
    out: &mut impl Write,
) -> io::Result<Result<(), MigrationError>>
where
    S: SchemaHandle,
    L: MigrationLedger,
{
    match command.directive {
        Directive::Up => match migrator.up().await {
            Ok(applied) if applied.is_empty() => writeln!(out, "Nothing to apply")?,
            Ok(applied) => {
                for id in &applied {
                    writeln!(out, "applied {id}")?;
                }
                writeln!(out, "Applied {} step(s)", applied.len())?;
            }
            Err(e) => return Ok(Err(e)),
        },
        Directive::Down => match migrator.down(command.count).await {
            Ok(reverted) if reverted.is_empty() => writeln!(out, "Nothing to revert")?,
            Ok(reverted) => {
                for id in &reverted {
                    writeln!(out, "reverted {id}")?;
                }
                writeln!(out, "Reverted {} step(s)", reverted.len())?;
            }
            Err(e) => return Ok(Err(e)),
        },
        Directive::Pending => match migrator.pending().await {
            Ok(pending) => {
                for step in &pending {
                    writeln!(out, "{}", step.id())?;
                }
                writeln!(out, "{} pending step(s)", pending.len())?;
            }
            Err(e) => return Ok(Err(e)),
        },
        Directive::Executed => match migrator.executed().await {
            Ok(executed) => {
                for entry in &executed {
                    writeln!(out, "{}\t{}", entry.step_id, entry.applied_at.to_rfc3339())?;
                }
                writeln!(out, "{} executed step(s)", executed.len())?;
            }
            Err(e) => return Ok(Err(e)),
        },
    }
    Ok(Ok(()))
}
