//! `planillas-recon`: contract/spreadsheet/plan reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded records, returns matches and the
//! SQL `UPDATE` statements that apply them. No CLI or file IO.

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod model;
pub mod names;
pub mod similarity;
pub mod statement;
pub mod summary;

pub use config::{MatchConfig, MatchPolicy};
pub use engine::{filter_input, load_csv_records, load_csv_table, run};
pub use error::ReconError;
pub use model::{CellValue, MatchInput, MatchOutcome, MatchRun, MatchSummary, Record, Skip, SkipReason};
pub use names::{normalize, split_name, SplitName};
pub use similarity::{find_best_match, similarity};
