// Source adapters and sinks

pub mod csv;
pub mod sql;
pub mod xlsx;

use std::path::Path;

use planillas_recon::model::{CellValue, Record};

pub use sql::write_statements;

/// Records of one source plus its header names in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    /// Worksheet the rows came from; `None` for delimited files.
    pub sheet: Option<String>,
}

/// Extensions read through calamine.
const EXCEL_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Read a source file into records, dispatching on its extension.
///
/// `sheet` only applies to workbooks; the first sheet is used when `None`.
pub fn read_records(path: &Path, sheet: Option<&str>) -> Result<Vec<Record>, String> {
    read_table(path, sheet).map(|t| t.records)
}

/// Like [`read_records`], keeping the header order.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<Table, String> {
    let ext = extension(path);
    let table = match ext.as_str() {
        "csv" | "txt" => csv::read(path)?,
        "tsv" => csv::read_tsv(path)?,
        e if EXCEL_EXTENSIONS.contains(&e) => xlsx::read(path, sheet)?,
        "" => return Err(format!("{}: no file extension, cannot pick a reader", path.display())),
        other => return Err(format!("{}: unsupported file type '.{}'", path.display(), other)),
    };
    if sheet.is_some() && !EXCEL_EXTENSIONS.contains(&ext.as_str()) {
        log::warn!("{}: sheet ignored for delimited files", path.display());
    }
    log::info!("read {} records from {}", table.records.len(), path.display());
    Ok(table)
}

/// Write a header row plus data rows as `.csv`, `.tsv` or `.xlsx`.
///
/// `sheet` names the worksheet of an `.xlsx` output and is ignored otherwise.
pub fn write_records(
    path: &Path,
    headers: &[String],
    rows: &[Vec<CellValue>],
    sheet: Option<&str>,
) -> Result<(), String> {
    match extension(path).as_str() {
        "csv" | "txt" => csv::write(path, headers, rows),
        "tsv" => csv::write_tsv(path, headers, rows),
        "xlsx" => xlsx::write(path, headers, rows, sheet),
        other => Err(format!(
            "{}: cannot write '.{}' files (use .csv, .tsv or .xlsx)",
            path.display(),
            other
        )),
    }
}
