// planillas CLI - contract reconciliation and name utilities

mod exit_codes;
mod matching;
mod split_names;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use matching::MatchCommands;
use split_names::SplitNamesArgs;

#[derive(Parser)]
#[command(name = "planillas")]
#[command(about = "Reconcile contracts against spreadsheets and plan lists, emitting SQL updates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Config-driven contract matching
    #[command(subcommand)]
    Match(MatchCommands),

    /// Split a full-name column into NOMBRES, APELLIDO_1 and APELLIDO_2
    #[command(after_help = "\
Examples:
  planillas split-names --input socios.xlsx --column Nombre --output out/socios.xlsx
  planillas split-names --input socios.csv --column nombre --output socios.csv --dedupe-by ci
  planillas split-names --input socios.xlsx --sheet Marzo --column Nombre --output marzo.csv
  planillas split-names --input socios.xlsx --column Nombre --output out.xlsx --concat Nombre C --concat-into DETALLE")]
    SplitNames(SplitNamesArgs),
}

impl Commands {
    fn quiet(&self) -> bool {
        match self {
            Commands::Match(MatchCommands::Run { quiet, .. }) => *quiet,
            Commands::Match(MatchCommands::Validate { .. }) => false,
            Commands::SplitNames(args) => args.quiet,
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `warn` when quiet.
fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            eprintln!("Usage: planillas <command> [options]");
            eprintln!("       planillas --help for more information");
            Err(CliError { code: EXIT_USAGE, message: String::new(), hint: None })
        }
        Some(command) => {
            init_logging(command.quiet());
            match command {
                Commands::Match(cmd) => matching::cmd_match(cmd),
                Commands::SplitNames(args) => split_names::cmd_split_names(args),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    /// Engine error with its registered exit code.
    pub fn recon(err: planillas_recon::ReconError) -> Self {
        let hint = match &err {
            planillas_recon::ReconError::MissingColumn { .. } => {
                Some("check the column names under [sources] in the config".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
