// Excel source reader (xlsx, xlsm, xls, xlsb, ods) and record writer (xlsx only)
//
// Read: first sheet unless one is named. The first non-empty row is the
//       header; every later non-blank row becomes a record.
// Write: plain header + values, header in bold. No formulas or styles beyond that.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use planillas_recon::model::{CellValue, Record};
use rust_xlsxwriter::{Format, Workbook};

use crate::csv::source_label;
use crate::Table;

/// Read one sheet of a workbook into records.
pub fn read(path: &Path, sheet: Option<&str>) -> Result<Table, String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file {}: {}", path.display(), e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(format!(
                    "Sheet '{}' not found in {} (available: {})",
                    name,
                    path.display(),
                    sheet_names.join(", ")
                ));
            }
            name.to_string()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| format!("Excel file {} contains no sheets", path.display()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let source = source_label(path);
    let mut rows = range.rows();

    // Header: first row with any non-empty cell
    let mut header_offset = 0usize;
    let headers: Vec<String> = loop {
        let Some(row) = rows.next() else {
            log::debug!("{}: sheet '{}' is empty", source, sheet_name);
            return Ok(Table { sheet: Some(sheet_name), ..Table::default() });
        };
        header_offset += 1;
        if row.iter().any(|c| !is_blank(c)) {
            break row.iter().map(header_text).collect();
        }
    };

    let mut records = Vec::new();
    for (i, row) in rows.enumerate() {
        if row.iter().all(is_blank) {
            continue;
        }

        let data_row = i + 1;
        let mut fields = HashMap::with_capacity(headers.len());
        for (col, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = match row.get(col) {
                Some(cell) => cell_value(cell, &source, header_offset + data_row, header),
                None => CellValue::Empty,
            };
            fields.insert(header.clone(), value);
        }
        records.push(Record { row: data_row, fields });
    }

    log::debug!(
        "{}: {} records from sheet '{}'",
        source,
        records.len(),
        sheet_name
    );
    let headers = headers.into_iter().filter(|h| !h.is_empty()).collect();
    Ok(Table { headers, records, sheet: Some(sheet_name) })
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => planillas_recon::model::format_number(*n),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_value(cell: &Data, source: &str, sheet_row: usize, column: &str) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_raw(s),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.into()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_raw(s),
        Data::Error(e) => {
            log::warn!(
                "{}: row {}, column '{}': cell error {:?}, treated as empty",
                source,
                sheet_row,
                column,
                e
            );
            CellValue::Empty
        }
    }
}

/// Write a header row plus data rows to a new single-sheet workbook.
///
/// The worksheet keeps the default `Sheet1` name unless `sheet` is given.
pub fn write(
    path: &Path,
    headers: &[String],
    rows: &[Vec<CellValue>],
    sheet: Option<&str>,
) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    if let Some(name) = sheet {
        worksheet
            .set_name(name)
            .map_err(|e| format!("Invalid sheet name '{}': {}", name, e))?;
    }
    let bold = Format::new().set_bold();

    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col_index(col)?, header, &bold)
            .map_err(|e| format!("Failed to write header '{}': {}", header, e))?;
    }

    for (r, row) in rows.iter().enumerate() {
        let row32 = u32::try_from(r + 1).map_err(|_| "Too many rows for xlsx".to_string())?;
        for (c, value) in row.iter().enumerate() {
            let col16 = col_index(c)?;
            match value {
                CellValue::Text(s) => worksheet.write_string(row32, col16, s).map(|_| ()),
                CellValue::Number(n) => worksheet.write_number(row32, col16, *n).map(|_| ()),
                CellValue::Empty => Ok(()),
            }
            .map_err(|e| format!("Failed to write cell ({}, {}): {}", r + 1, c, e))?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save {}: {}", path.display(), e))?;
    Ok(())
}

fn col_index(col: usize) -> Result<u16, String> {
    u16::try_from(col).map_err(|_| "Too many columns for xlsx".to_string())
}
