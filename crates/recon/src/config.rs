use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ReconError;
use crate::similarity::{MAX_THRESHOLD, MIN_THRESHOLD};
use crate::statement::{sanitize_identifier, StatementTarget};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    pub name: String,
    #[serde(default)]
    pub policy: MatchPolicy,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// How contracts are reconciled against the spreadsheet and plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Normalized contract name must equal both a spreadsheet name and a plan name.
    #[default]
    TripleJoin,
    /// Contract name resolves to a spreadsheet code; the code's row names the plan.
    CodeLookup,
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TripleJoin => write!(f, "triple_join"),
            Self::CodeLookup => write!(f, "code_lookup"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub contracts: ContractSource,
    pub spreadsheet: SpreadsheetSource,
    pub plans: PlanSource,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSource {
    pub file: String,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default)]
    pub filters: Vec<RowFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpreadsheetSource {
    pub file: String,
    #[serde(default)]
    pub sheet: Option<String>,
    /// Joined with a space to form the comparison name (e.g. `Nombre` + `Apellido`).
    #[serde(default = "default_name_columns")]
    pub name_columns: Vec<String>,
    #[serde(default)]
    pub code_column: Option<String>,
    #[serde(default)]
    pub plan_column: Option<String>,
    #[serde(default)]
    pub filters: Vec<RowFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanSource {
    pub file: String,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default)]
    pub filters: Vec<RowFilter>,
}

fn default_id_column() -> String {
    "id".into()
}

fn default_name_column() -> String {
    "nombre".into()
}

fn default_name_columns() -> Vec<String> {
    vec![default_name_column()]
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowFilter {
    pub column: String,
    pub op: FilterOp,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    /// Substring that must be absent (`contains_exclude` only).
    #[serde(default)]
    pub exclude: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    Contains,
    ContainsExclude,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Matching + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Enables the similarity fallback of the code-lookup policy.
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub file: Option<String>,
    /// Defaults per policy: `contratos` (triple join), `contracts` (code lookup).
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_out_name_column")]
    pub name_column: String,
    #[serde(default = "default_out_code_column")]
    pub code_column: String,
    #[serde(default = "default_out_plan_column")]
    pub plan_column: String,
    #[serde(default = "default_id_column")]
    pub key_column: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: None,
            table: None,
            name_column: default_out_name_column(),
            code_column: default_out_code_column(),
            plan_column: default_out_plan_column(),
            key_column: default_id_column(),
        }
    }
}

fn default_out_name_column() -> String {
    "nombre_excel".into()
}

fn default_out_code_column() -> String {
    "nro".into()
}

fn default_out_plan_column() -> String {
    "plan_id".into()
}

impl OutputConfig {
    /// Sanitized table/column names for statement rendering.
    pub fn target(&self, policy: MatchPolicy) -> StatementTarget {
        let table = self.table.clone().unwrap_or_else(|| match policy {
            MatchPolicy::TripleJoin => "contratos".into(),
            MatchPolicy::CodeLookup => "contracts".into(),
        });
        StatementTarget {
            table: sanitize_identifier(&table),
            name_column: sanitize_identifier(&self.name_column),
            code_column: sanitize_identifier(&self.code_column),
            plan_column: sanitize_identifier(&self.plan_column),
            key_column: sanitize_identifier(&self.key_column),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(msg));
        let sources = &self.sources;

        let columns = [
            ("sources.contracts.id_column", &sources.contracts.id_column),
            ("sources.contracts.name_column", &sources.contracts.name_column),
            ("sources.plans.name_column", &sources.plans.name_column),
            ("sources.plans.id_column", &sources.plans.id_column),
        ];
        for (field, value) in columns {
            if value.trim().is_empty() {
                return invalid(format!("{field} must not be empty"));
            }
        }

        if sources.spreadsheet.name_columns.is_empty()
            || sources.spreadsheet.name_columns.iter().any(|c| c.trim().is_empty())
        {
            return invalid("sources.spreadsheet.name_columns must list at least one column".into());
        }

        if self.policy == MatchPolicy::CodeLookup {
            if sources.spreadsheet.code_column.as_deref().map_or(true, |c| c.trim().is_empty()) {
                return invalid("code_lookup policy requires sources.spreadsheet.code_column".into());
            }
            if sources.spreadsheet.plan_column.as_deref().map_or(true, |c| c.trim().is_empty()) {
                return invalid("code_lookup policy requires sources.spreadsheet.plan_column".into());
            }
        }

        if let Some(threshold) = self.matching.similarity_threshold {
            if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
                return invalid(format!(
                    "similarity_threshold must be between {MIN_THRESHOLD} and {MAX_THRESHOLD}, got {threshold}"
                ));
            }
            if self.policy == MatchPolicy::TripleJoin {
                return invalid("similarity_threshold only applies to the code_lookup policy".into());
            }
        }

        let filter_sets = [
            ("contracts", &sources.contracts.filters),
            ("spreadsheet", &sources.spreadsheet.filters),
            ("plans", &sources.plans.filters),
        ];
        for (source, filters) in filter_sets {
            for filter in filters {
                validate_filter(source, filter)?;
            }
        }

        let out = &self.output;
        let identifiers = [
            ("output.table", out.table.as_deref().unwrap_or("contracts")),
            ("output.name_column", out.name_column.as_str()),
            ("output.code_column", out.code_column.as_str()),
            ("output.plan_column", out.plan_column.as_str()),
            ("output.key_column", out.key_column.as_str()),
        ];
        for (field, value) in identifiers {
            let trimmed = value.trim();
            if trimmed.trim_matches('_').is_empty() || sanitize_identifier(trimmed) != trimmed {
                return invalid(format!(
                    "{field} must use only letters, digits and '_': '{value}'"
                ));
            }
        }

        Ok(())
    }

    /// Filters configured for each source, in (contracts, spreadsheet, plans) order.
    pub fn filters(&self) -> [&[RowFilter]; 3] {
        [
            &self.sources.contracts.filters,
            &self.sources.spreadsheet.filters,
            &self.sources.plans.filters,
        ]
    }
}

fn validate_filter(source: &str, filter: &RowFilter) -> Result<(), ReconError> {
    if filter.column.trim().is_empty() {
        return Err(ReconError::ConfigValidation(format!(
            "sources.{source}: filter column must not be empty"
        )));
    }
    match filter.op {
        FilterOp::ContainsExclude if filter.exclude.is_none() => {
            Err(ReconError::ConfigValidation(format!(
                "sources.{source}: contains_exclude filter on '{}' requires `exclude`",
                filter.column
            )))
        }
        FilterOp::GreaterThan | FilterOp::LessThan
            if filter.value.trim().parse::<f64>().is_err() =>
        {
            Err(ReconError::ConfigValidation(format!(
                "sources.{source}: numeric filter on '{}' needs a numeric value, got '{}'",
                filter.column, filter.value
            )))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
