use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (missing column list, bad threshold, etc.).
    ConfigValidation(String),
    /// A configured column is absent from every record of a non-empty source.
    MissingColumn { source: String, column: String },
    /// Input rows could not be parsed into records.
    MalformedInput { source: String, row: usize, message: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::MalformedInput { source, row, message } => {
                write!(f, "source '{source}', row {row}: {message}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
