// CSV/TSV source reader and record writer

use std::io::Read;
use std::path::Path;

use planillas_recon::engine::load_csv_table;
use planillas_recon::model::CellValue;

use crate::Table;

/// Read a delimited file into records, sniffing the delimiter.
pub fn read(path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    read_from_string(path, &content, delimiter)
}

pub fn read_tsv(path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    read_from_string(path, &content, b'\t')
}

fn read_from_string(path: &Path, content: &str, delimiter: u8) -> Result<Table, String> {
    let source = source_label(path);
    let (headers, records) =
        load_csv_table(&source, content, delimiter).map_err(|e| e.to_string())?;
    log::debug!(
        "{}: {} records (delimiter {:?})",
        source,
        records.len(),
        delimiter as char
    );
    Ok(Table { headers, records, sheet: None })
}

pub(crate) fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Header line must split into >1 field
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Lines agreeing with the header, weighted by field count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel on Windows exports CSV as Windows-1252
            log::warn!("{}: not valid UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn write(path: &Path, headers: &[String], rows: &[Vec<CellValue>]) -> Result<(), String> {
    write_with_delimiter(path, headers, rows, b',')
}

pub fn write_tsv(path: &Path, headers: &[String], rows: &[Vec<CellValue>]) -> Result<(), String> {
    write_with_delimiter(path, headers, rows, b'\t')
}

fn write_with_delimiter(
    path: &Path,
    headers: &[String],
    rows: &[Vec<CellValue>],
    delimiter: u8,
) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    writer.write_record(headers).map_err(|e| e.to_string())?;
    for row in rows {
        let fields = row.iter().map(|v| v.as_text().unwrap_or_default());
        writer.write_record(fields).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}
