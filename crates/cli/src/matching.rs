//! `planillas match`: config-driven contract reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use planillas_recon::{MatchConfig, MatchInput, MatchSummary};

use crate::exit_codes::{recon_exit_code, EXIT_ERROR};
use crate::CliError;

/// Output path when neither `--output` nor `output.file` is set.
pub const DEFAULT_OUTPUT: &str = "output/matches.sql";

#[derive(Subcommand)]
pub enum MatchCommands {
    /// Match contracts and write SQL UPDATE statements
    #[command(after_help = "\
Examples:
  planillas match run planilla.toml
  planillas match run planilla.toml --output updates.sql
  planillas match run planilla.toml --json --quiet")]
    Run {
        /// Path to the match config (.toml)
        config: PathBuf,

        /// SQL output file (overrides output.file in the config)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print run metadata and summary as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Suppress the human summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate a match config without running
    #[command(after_help = "\
Examples:
  planillas match validate planilla.toml")]
    Validate {
        /// Path to the match config (.toml)
        config: PathBuf,
    },
}

pub fn cmd_match(cmd: MatchCommands) -> Result<(), CliError> {
    match cmd {
        MatchCommands::Run { config, output, json, quiet } => cmd_match_run(config, output, json, quiet),
        MatchCommands::Validate { config } => cmd_match_validate(config),
    }
}

fn load_config(config_path: &Path) -> Result<MatchConfig, CliError> {
    if !config_path.exists() {
        return Err(CliError::args(format!("config not found: {}", config_path.display())));
    }
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::io(format!("cannot read config: {e}")))?;

    let config = MatchConfig::from_toml(&config_str).map_err(|e| CliError {
        code: recon_exit_code(&e),
        message: format!("{}: {}", config_path.display(), e),
        hint: None,
    })?;
    log::debug!("loaded config '{}' from {}", config.name, config_path.display());
    Ok(config)
}

/// Source paths are relative to the config file's directory.
fn resolve(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn cmd_match_run(
    config_path: PathBuf,
    output_file: Option<PathBuf>,
    json_output: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let src = &config.sources;
    let sources = [
        ("contracts", resolve(base_dir, &src.contracts.file), src.contracts.sheet.as_deref()),
        ("spreadsheet", resolve(base_dir, &src.spreadsheet.file), src.spreadsheet.sheet.as_deref()),
        ("plans", resolve(base_dir, &src.plans.file), src.plans.sheet.as_deref()),
    ];

    // Report every missing input at once
    let missing: Vec<String> = sources
        .iter()
        .filter(|(_, path, _)| !path.exists())
        .map(|(role, path, _)| format!("  {role}: {}", path.display()))
        .collect();
    if !missing.is_empty() {
        return Err(CliError::args(format!("input files not found:\n{}", missing.join("\n")))
            .with_hint(format!("source paths are resolved relative to {}", base_dir.display())));
    }

    let mut loaded = Vec::with_capacity(sources.len());
    for (role, path, sheet) in &sources {
        log::debug!("{role}: reading {}", path.display());
        let records = planillas_io::read_records(path, *sheet)
            .map_err(|e| CliError::parse(format!("{role}: {e}")))?;
        loaded.push(records);
    }
    let plans = loaded.pop().unwrap_or_default();
    let spreadsheet = loaded.pop().unwrap_or_default();
    let contracts = loaded.pop().unwrap_or_default();

    let input = planillas_recon::filter_input(&config, MatchInput::new(contracts, spreadsheet, plans))
        .map_err(CliError::recon)?;
    let result = planillas_recon::run(&config, &input).map_err(CliError::recon)?;

    let output_path = output_file
        .or_else(|| config.output.file.as_deref().map(|f| resolve(base_dir, f)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let written = planillas_io::write_statements(&output_path, &result.statements)
        .map_err(CliError::io)?;

    if json_output {
        let mut value = serde_json::to_value(&result)
            .map_err(|e| json_err(&e))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "output".into(),
                serde_json::Value::String(output_path.display().to_string()),
            );
        }
        let json_str = serde_json::to_string_pretty(&value)
            .map_err(|e| json_err(&e))?;
        println!("{json_str}");
    }

    if !quiet {
        for line in summary_lines(&result.summary) {
            eprintln!("{line}");
        }
        eprintln!("wrote {} statements to {}", written, output_path.display());
    }

    Ok(())
}

fn json_err(e: &serde_json::Error) -> CliError {
    CliError { code: EXIT_ERROR, message: format!("JSON serialization error: {e}"), hint: None }
}

/// Human summary. The contract count is rows read; filtered rows get their own line.
fn summary_lines(s: &MatchSummary) -> Vec<String> {
    let read = s.sources.contracts.read;
    let mut lines = vec![format!(
        "{} contracts, {} matches, {} statements (skipped {})",
        read, s.matches, s.statements, s.skipped
    )];
    if read > s.contracts {
        lines.push(format!("  {} filtered out, {} considered", read - s.contracts, s.contracts));
    }
    if s.partial_matches > 0 {
        lines.push(format!("  {} partial (code without plan)", s.partial_matches));
    }
    if s.fuzzy_matches > 0 {
        lines.push(format!("  {} by similarity", s.fuzzy_matches));
    }
    lines
}

fn cmd_match_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let filters: usize = config.filters().iter().map(|f| f.len()).sum();
    eprintln!(
        "valid: {} match '{}' with {} filter(s)",
        config.policy, config.name, filters,
    );
    Ok(())
}
