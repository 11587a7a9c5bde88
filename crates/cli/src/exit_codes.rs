//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success (including runs with unmatched contracts)|
//! | 1    | General error (unspecified)                      |
//! | 2    | Usage error (bad args, missing input files)      |
//! | 3    | I/O error (unreadable source, unwritable output) |
//! | 4    | Parse error (malformed input, missing columns)   |
//! | 6    | Invalid config (TOML or validation failure)      |
//!

/// Success - command completed without errors.
/// Contracts without a match are reported, not failed.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input files.
pub const EXIT_USAGE: u8 = 2;

/// A source could not be read or the output could not be written.
pub const EXIT_IO: u8 = 3;

/// Source contents could not be parsed or lack a configured column.
pub const EXIT_PARSE: u8 = 4;

/// Config file is not valid TOML or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 6;

use planillas_recon::ReconError;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::MissingColumn { .. } | ReconError::MalformedInput { .. } => EXIT_PARSE,
    }
}
