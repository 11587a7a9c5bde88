// SQL statement file sink

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write statements one per line, in order. Creates parent directories.
///
/// Returns the number of statements written. On a write error the lines
/// already written stay on disk.
pub fn write_statements(path: &Path, statements: &[String]) -> Result<usize, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }

    let file = File::create(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    let mut writer = BufWriter::new(file);

    for statement in statements {
        writeln!(writer, "{}", statement)
            .map_err(|e| format!("write to {} failed: {}", path.display(), e))?;
    }
    writer
        .flush()
        .map_err(|e| format!("write to {} failed: {}", path.display(), e))?;

    log::info!("wrote {} statements to {}", statements.len(), path.display());
    Ok(statements.len())
}
