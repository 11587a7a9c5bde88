//! `planillas split-names`: split a full-name column into given names and surnames.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::Args;
use planillas_io::Table;
use planillas_recon::model::{CellValue, Record};
use planillas_recon::split_name;

use crate::CliError;

pub const COL_NOMBRES: &str = "NOMBRES";
pub const COL_APELLIDO_1: &str = "APELLIDO_1";
pub const COL_APELLIDO_2: &str = "APELLIDO_2";

#[derive(Args)]
pub struct SplitNamesArgs {
    /// Source file (.csv, .tsv, .xlsx, .xls, .ods)
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Column holding the full name
    #[arg(long, short = 'c')]
    pub column: String,

    /// Output file (.csv, .tsv or .xlsx)
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Worksheet to read (workbooks only; default: first sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Keep only the first row for each value of this column
    #[arg(long)]
    pub dedupe_by: Option<String>,

    /// Two columns (header name or letter, e.g. C) joined as "FIRST (SECOND)",
    /// SECOND written with thousands dots
    #[arg(long, num_args = 2, value_names = ["FIRST", "SECOND"], requires = "concat_into")]
    pub concat: Option<Vec<String>>,

    /// Name of the column that receives --concat
    #[arg(long, requires = "concat")]
    pub concat_into: Option<String>,

    /// Suppress the summary on stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Two source columns joined into a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concat {
    pub first: String,
    pub second: String,
    pub into: String,
}

impl SplitNamesArgs {
    fn concat(&self) -> Result<Option<Concat>, CliError> {
        let (Some(refs), Some(into)) = (&self.concat, &self.concat_into) else {
            return Ok(None);
        };
        let [first, second] = refs.as_slice() else {
            return Err(CliError::args("--concat takes exactly two columns"));
        };
        if SPLIT_COLUMNS.contains(&into.as_str()) || into.trim().is_empty() {
            return Err(CliError::args(format!("--concat-into cannot be '{into}'")));
        }
        Ok(Some(Concat { first: first.clone(), second: second.clone(), into: into.clone() }))
    }
}

pub fn cmd_split_names(args: SplitNamesArgs) -> Result<(), CliError> {
    if !args.input.exists() {
        return Err(CliError::args(format!("input not found: {}", args.input.display())));
    }
    check_output_extension(&args.output)?;
    let concat = args.concat()?;

    let table = planillas_io::read_table(&args.input, args.sheet.as_deref()).map_err(CliError::parse)?;

    require_header(&table, &args.column)?;
    if let Some(key) = &args.dedupe_by {
        require_header(&table, key)?;
    }

    let read = table.records.len();
    let (headers, rows) = split_table(&table, &args.column, args.dedupe_by.as_deref(), concat.as_ref())?;
    if let Some(key) = &args.dedupe_by {
        log::info!("dedupe by '{}': {} duplicate rows dropped", key, read - rows.len());
    }
    if let Some(c) = &concat {
        log::info!("columns joined: {} + {} -> {}", c.first, c.second, c.into);
    }

    let output = &args.output;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::io(format!("cannot create {}: {}", parent.display(), e)))?;
    }
    planillas_io::write_records(output, &headers, &rows, table.sheet.as_deref()).map_err(CliError::io)?;

    if !args.quiet {
        eprintln!(
            "{} rows read, {} written to {}",
            read,
            rows.len(),
            output.display()
        );
    }
    Ok(())
}

/// Output formats `write_records` can produce.
const OUTPUT_EXTENSIONS: &[&str] = &["csv", "tsv", "txt", "xlsx"];

const SPLIT_COLUMNS: [&str; 3] = [COL_NOMBRES, COL_APELLIDO_1, COL_APELLIDO_2];

fn check_output_extension(output: &Path) -> Result<(), CliError> {
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(CliError::args(format!("unsupported output file: {}", output.display()))
            .with_hint("use a .csv, .tsv or .xlsx output"))
    }
}

fn require_header(table: &Table, column: &str) -> Result<(), CliError> {
    if table.headers.iter().any(|h| h == column) {
        return Ok(());
    }
    Err(missing_column(column, &table.headers))
}

fn missing_column(column: &str, headers: &[String]) -> CliError {
    CliError::parse(format!("column '{column}' not found"))
        .with_hint(format!("available columns: {}", headers.join(", ")))
}

/// Position of a column given by header name or by spreadsheet letter (`A`, `C`, `AB`).
/// A header with that exact name wins over the letter reading.
pub fn resolve_column(headers: &[String], reference: &str) -> Option<usize> {
    if let Some(pos) = headers.iter().position(|h| h == reference) {
        return Some(pos);
    }
    if reference.is_empty() || !reference.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let index = reference
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |acc, b| acc.checked_mul(26)?.checked_add(usize::from(b - b'A') + 1))?;
    let index = index - 1;
    (index < headers.len()).then_some(index)
}

/// Digits of `value` grouped with dots, es-ES style.
///
/// Non-digits are dropped and leading zeros removed. Four-digit numbers stay
/// ungrouped. A value without digits is returned unchanged.
pub fn format_thousands(value: &str) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return value.to_string();
    }
    let digits = match digits.trim_start_matches('0') {
        "" => "0",
        d => d,
    };
    if digits.len() < 5 {
        return digits.to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    grouped
}

/// Output header + rows: input columns in order, then the split columns,
/// then the `concat` column when requested.
///
/// With `dedupe_by`, only the first row for each value of that column is
/// kept; blank values count as one value. Concat references resolve against
/// the input columns plus the split columns.
pub fn split_table(
    table: &Table,
    column: &str,
    dedupe_by: Option<&str>,
    concat: Option<&Concat>,
) -> Result<(Vec<String>, Vec<Vec<CellValue>>), CliError> {
    let base: Vec<String> = table
        .headers
        .iter()
        .filter(|h| !SPLIT_COLUMNS.contains(&h.as_str()))
        .filter(|h| concat.map_or(true, |c| **h != c.into))
        .cloned()
        .collect();

    let mut headers = base.clone();
    headers.extend(SPLIT_COLUMNS.iter().map(|c| c.to_string()));

    let concat_positions = match concat {
        Some(c) => {
            let first = resolve_column(&headers, &c.first).ok_or_else(|| missing_column(&c.first, &headers))?;
            let second = resolve_column(&headers, &c.second).ok_or_else(|| missing_column(&c.second, &headers))?;
            Some((first, second))
        }
        None => None,
    };
    if let Some(c) = concat {
        headers.push(c.into.clone());
    }

    let mut seen: HashSet<Option<String>> = HashSet::new();
    let rows = table
        .records
        .iter()
        .filter(|r| dedupe_by.map_or(true, |key| seen.insert(r.text(key))))
        .map(|r| {
            let mut row = split_row(r, &base, column);
            if let Some((first, second)) = concat_positions {
                let text = |pos: usize| row[pos].as_text().unwrap_or_default();
                let joined = format!("{} ({})", text(first), format_thousands(&text(second)));
                row.push(CellValue::Text(joined));
            }
            row
        })
        .collect();

    Ok((headers, rows))
}

fn split_row(record: &Record, base: &[String], column: &str) -> Vec<CellValue> {
    let parts = split_name(&record.text(column).unwrap_or_default());
    let mut row: Vec<CellValue> = base
        .iter()
        .map(|h| record.get(h).cloned().unwrap_or(CellValue::Empty))
        .collect();
    for part in [parts.nombres, parts.apellido1, parts.apellido2] {
        row.push(CellValue::from_raw(&part));
    }
    row
}
