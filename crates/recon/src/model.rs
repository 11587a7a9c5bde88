use std::collections::HashMap;

use serde::Serialize;

use crate::config::MatchPolicy;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single cell as delivered by a source reader.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Cell from raw delimited text. Empty strings become `Empty`.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Empty
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Text form of the cell. `None` for empty or whitespace-only cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            Self::Text(_) | Self::Empty => None,
            Self::Number(n) => Some(format_number(*n)),
        }
    }

    /// Integer form of the cell: integral numbers, or text that parses as one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Number(n) => integral(*n),
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
            Self::Empty => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Empty => None,
        }
    }
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        Some(n as i64)
    } else {
        None
    }
}

/// Integers without decimals, everything else as-is.
pub fn format_number(n: f64) -> String {
    match integral(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

/// One row from any source, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// 1-based data row number in the source (header excluded).
    pub row: usize,
    pub fields: HashMap<String, CellValue>,
}

impl Record {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.fields.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.get(column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(CellValue::as_text)
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(CellValue::as_integer)
    }
}

/// The three record sets of one run.
#[derive(Debug, Default)]
pub struct MatchInput {
    pub contracts: Vec<Record>,
    pub spreadsheet: Vec<Record>,
    pub plans: Vec<Record>,
    /// Rows read and kept per source; `kept` drops after filtering.
    pub sources: SourceSummary,
}

impl MatchInput {
    pub fn new(contracts: Vec<Record>, spreadsheet: Vec<Record>, plans: Vec<Record>) -> Self {
        let counts = |n: usize| SourceCounts { read: n, kept: n };
        let sources = SourceSummary {
            contracts: counts(contracts.len()),
            spreadsheet: counts(spreadsheet.len()),
            plans: counts(plans.len()),
        };
        Self {
            contracts,
            spreadsheet,
            plans,
            sources,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Contract reconciled against one spreadsheet row and one plan row.
#[derive(Debug, Clone)]
pub struct MatchedTriple<'a> {
    pub contract: &'a Record,
    pub spreadsheet: &'a Record,
    pub plan: &'a Record,
    pub contract_id: i64,
    pub spreadsheet_name: String,
    pub plan_id: i64,
}

/// Contract resolved to a spreadsheet code, and possibly to a plan id.
#[derive(Debug, Clone)]
pub struct CodeMatch<'a> {
    pub contract: &'a Record,
    pub contract_id: i64,
    pub code: String,
    /// `None` is a partial match: code known, plan unresolved.
    pub plan_id: Option<i64>,
    /// Similarity score when the code came from the fuzzy fallback.
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum MatchOutcome<'a> {
    Triple(MatchedTriple<'a>),
    Code(CodeMatch<'a>),
}

impl MatchOutcome<'_> {
    pub fn contract_row(&self) -> usize {
        match self {
            Self::Triple(t) => t.contract.row,
            Self::Code(c) => c.contract.row,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Code(CodeMatch { plan_id: None, .. }))
    }
}

/// Why a contract produced no outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingField { column: String },
    InvalidId { column: String, value: String },
    InvalidPlanId { value: String },
    NoMatch,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { column } => write!(f, "missing field '{column}'"),
            Self::InvalidId { column, value } => {
                write!(f, "'{column}' is not an integer: '{value}'")
            }
            Self::InvalidPlanId { value } => write!(f, "plan id is not an integer: '{value}'"),
            Self::NoMatch => write!(f, "no match"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skip {
    pub contract_row: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub read: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub contracts: usize,
    pub matches: usize,
    pub full_matches: usize,
    pub partial_matches: usize,
    pub fuzzy_matches: usize,
    pub statements: usize,
    pub skipped: usize,
    pub no_match: usize,
    pub sources: SourceSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub contracts: SourceCounts,
    pub spreadsheet: SourceCounts,
    pub plans: SourceCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchMeta {
    pub config_name: String,
    pub policy: MatchPolicy,
    pub engine_version: String,
    pub run_at: String,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRun<'a> {
    pub meta: MatchMeta,
    pub summary: MatchSummary,
    #[serde(skip)]
    pub outcomes: Vec<MatchOutcome<'a>>,
    pub skips: Vec<Skip>,
    #[serde(skip)]
    pub statements: Vec<String>,
}
