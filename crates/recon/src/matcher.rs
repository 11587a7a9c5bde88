use std::collections::HashMap;

use log::{debug, info};

use crate::config::{ContractSource, PlanSource, SpreadsheetSource};
use crate::model::{CodeMatch, MatchOutcome, MatchedTriple, Record, Skip, SkipReason};
use crate::names::{normalize, normalize_opt};
use crate::similarity::find_best_match;

/// Outcomes and skips of one matching pass, each in contract order.
#[derive(Debug, Default)]
pub struct MatchPass<'a> {
    pub outcomes: Vec<MatchOutcome<'a>>,
    pub skips: Vec<Skip>,
}

impl<'a> MatchPass<'a> {
    fn record(&mut self, contract: &Record, result: Result<MatchOutcome<'a>, SkipReason>) {
        match result {
            Ok(outcome) => self.outcomes.push(outcome),
            Err(reason) => {
                debug!("contract row {}: {reason}", contract.row);
                self.skips.push(Skip {
                    contract_row: contract.row,
                    reason,
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

/// Normalized name -> position of the first record carrying it.
#[derive(Debug, Default)]
pub struct NameIndex {
    positions: HashMap<String, usize>,
}

impl NameIndex {
    /// Index `records` by `key`, keeping the first record for duplicate keys.
    /// Records whose key is missing or normalizes to nothing are not indexed.
    pub fn first_seen<F>(records: &[Record], key: F) -> Self
    where
        F: Fn(&Record) -> Option<String>,
    {
        let mut positions = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            let Some(raw) = key(record) else { continue };
            let name = normalize(&raw);
            if !name.is_empty() {
                positions.entry(name).or_insert(i);
            }
        }
        Self { positions }
    }

    pub fn get(&self, normalized: &str) -> Option<usize> {
        self.positions.get(normalized).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Spreadsheet lookups of the code policy.
#[derive(Debug, Default)]
pub struct CodeIndex {
    /// Normalized name -> code. Later rows overwrite earlier ones.
    codes: HashMap<String, String>,
    /// Distinct names in first-insertion order, for similarity scans.
    names: Vec<String>,
    /// Code -> position of the first row carrying it.
    rows: HashMap<String, usize>,
}

impl CodeIndex {
    pub fn build(records: &[Record], source: &SpreadsheetSource) -> Self {
        let code_column = source.code_column.as_deref().unwrap_or_default();
        let mut index = Self::default();

        for (i, record) in records.iter().enumerate() {
            let Some(code) = record.text(code_column) else { continue };
            index.rows.entry(code.clone()).or_insert(i);

            let Some(full_name) = joined_name(record, &source.name_columns) else { continue };
            let name = normalize(&full_name);
            if name.is_empty() {
                continue;
            }
            if !index.codes.contains_key(&name) {
                index.names.push(name.clone());
            }
            index.codes.insert(name, code);
        }

        index
    }

    pub fn code_for(&self, normalized: &str) -> Option<&str> {
        self.codes.get(normalized).map(String::as_str)
    }

    /// Best similarity match among indexed names at or above `threshold`.
    pub fn closest(&self, normalized: &str, threshold: f64) -> Option<(&str, f64)> {
        let best = find_best_match(normalized, self.names.iter().map(String::as_str), threshold)?;
        self.code_for(best.candidate).map(|code| (code, best.score))
    }

    pub fn row_for(&self, code: &str) -> Option<usize> {
        self.rows.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Normalized plan name -> plan id. Later rows overwrite earlier ones;
/// rows without a name or with a non-integer id are not indexed.
pub fn plan_id_index(plans: &[Record], source: &PlanSource) -> HashMap<String, i64> {
    let mut index = HashMap::new();
    for plan in plans {
        let Some(name) = plan.text(&source.name_column) else { continue };
        let Some(id) = plan.integer(&source.id_column) else {
            debug!("plan row {}: '{}' is not an integer id, not indexed", plan.row, source.id_column);
            continue;
        };
        let name = normalize(&name);
        if !name.is_empty() {
            index.insert(name, id);
        }
    }
    index
}

/// Values of `columns` joined with a space; `None` if any part is blank.
pub fn joined_name(record: &Record, columns: &[String]) -> Option<String> {
    let parts = columns
        .iter()
        .map(|c| record.text(c))
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(" "))
}

// ---------------------------------------------------------------------------
// Contract keys
// ---------------------------------------------------------------------------

/// Resolved id and normalized name of a contract.
fn contract_key(contract: &Record, source: &ContractSource) -> Result<(i64, String), SkipReason> {
    let name = contract.text(&source.name_column).ok_or_else(|| SkipReason::MissingField {
        column: source.name_column.clone(),
    })?;
    let raw_id = contract.text(&source.id_column).ok_or_else(|| SkipReason::MissingField {
        column: source.id_column.clone(),
    })?;
    let id = contract.integer(&source.id_column).ok_or_else(|| SkipReason::InvalidId {
        column: source.id_column.clone(),
        value: raw_id,
    })?;

    let normalized = normalize(&name);
    if normalized.is_empty() {
        return Err(SkipReason::NoMatch);
    }
    Ok((id, normalized))
}

// ---------------------------------------------------------------------------
// Triple join
// ---------------------------------------------------------------------------

/// Match each contract to the first spreadsheet row and the first plan whose
/// normalized names equal the contract's normalized name.
pub fn match_triple_join<'a>(
    contracts: &'a [Record],
    spreadsheet: &'a [Record],
    plans: &'a [Record],
    sources: (&ContractSource, &SpreadsheetSource, &PlanSource),
) -> MatchPass<'a> {
    let (contract_src, sheet_src, plan_src) = sources;

    let sheet_index = NameIndex::first_seen(spreadsheet, |r| joined_name(r, &sheet_src.name_columns));
    let plan_index = NameIndex::first_seen(plans, |r| r.text(&plan_src.name_column));
    info!(
        "triple join: {} contracts, {} spreadsheet names, {} plan names",
        contracts.len(),
        sheet_index.len(),
        plan_index.len()
    );

    let mut pass = MatchPass::default();
    for contract in contracts {
        let result = contract_key(contract, contract_src).and_then(|(contract_id, name)| {
            let sheet_pos = sheet_index.get(&name).ok_or(SkipReason::NoMatch)?;
            let plan_pos = plan_index.get(&name).ok_or(SkipReason::NoMatch)?;
            let (sheet, plan) = (&spreadsheet[sheet_pos], &plans[plan_pos]);

            let plan_id = plan.integer(&plan_src.id_column).ok_or_else(|| SkipReason::InvalidPlanId {
                value: plan.text(&plan_src.id_column).unwrap_or_default(),
            })?;
            let spreadsheet_name =
                joined_name(sheet, &sheet_src.name_columns).ok_or(SkipReason::NoMatch)?;

            Ok(MatchOutcome::Triple(MatchedTriple {
                contract,
                spreadsheet: sheet,
                plan,
                contract_id,
                spreadsheet_name,
                plan_id,
            }))
        });
        pass.record(contract, result);
    }
    pass
}

// ---------------------------------------------------------------------------
// Code lookup
// ---------------------------------------------------------------------------

/// Resolve each contract to a spreadsheet code by normalized name, then to a
/// plan id through the plan name on that code's row.
///
/// With `similarity_threshold`, a contract whose name has no exact entry
/// takes the code of the most similar indexed name instead.
pub fn match_code_lookup<'a>(
    contracts: &'a [Record],
    spreadsheet: &'a [Record],
    plans: &'a [Record],
    sources: (&ContractSource, &SpreadsheetSource, &PlanSource),
    similarity_threshold: Option<f64>,
) -> MatchPass<'a> {
    let (contract_src, sheet_src, plan_src) = sources;
    let plan_column = sheet_src.plan_column.as_deref().unwrap_or_default();

    let codes = CodeIndex::build(spreadsheet, sheet_src);
    let plan_ids = plan_id_index(plans, plan_src);
    info!(
        "code lookup: {} contracts, {} names mapped, {} plans mapped",
        contracts.len(),
        codes.len(),
        plan_ids.len()
    );

    let mut pass = MatchPass::default();
    for contract in contracts {
        let result = contract_key(contract, contract_src).and_then(|(contract_id, name)| {
            let (code, score) = match codes.code_for(&name) {
                Some(code) => (code, None),
                None => {
                    let threshold = similarity_threshold.ok_or(SkipReason::NoMatch)?;
                    let (code, score) = codes.closest(&name, threshold).ok_or(SkipReason::NoMatch)?;
                    (code, Some(score))
                }
            };

            let plan_id = codes
                .row_for(code)
                .map(|pos| normalize_opt(spreadsheet[pos].text(plan_column).as_deref()))
                .and_then(|plan_name| plan_ids.get(&plan_name).copied());

            Ok(MatchOutcome::Code(CodeMatch {
                contract,
                contract_id,
                code: code.to_string(),
                plan_id,
                score,
            }))
        });
        pass.record(contract, result);
    }
    pass
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract_src() -> ContractSource {
        ContractSource {
            file: "contracts.csv".into(),
            sheet: None,
            id_column: "id".into(),
            name_column: "nombre".into(),
            filters: Vec::new(),
        }
    }

    fn sheet_src(name_columns: &[&str]) -> SpreadsheetSource {
        SpreadsheetSource {
            file: "hoja.xlsx".into(),
            sheet: None,
            name_columns: name_columns.iter().map(|c| c.to_string()).collect(),
            code_column: Some("Cod".into()),
            plan_column: Some("Plan".into()),
            filters: Vec::new(),
        }
    }

    fn plan_src(name_column: &str) -> PlanSource {
        PlanSource {
            file: "planes.csv".into(),
            sheet: None,
            name_column: name_column.into(),
            id_column: "id".into(),
            filters: Vec::new(),
        }
    }

    fn contract(row: usize, id: i64, nombre: &str) -> Record {
        Record::new(row).with("id", id).with("nombre", nombre)
    }

    #[test]
    fn triple_join_basic() {
        let contracts = vec![contract(1, 1, "Ana Gomez")];
        let sheet = vec![Record::new(1).with("nombre", "ana gomez").with("Cod", "X1")];
        let plans = vec![Record::new(1).with("nombre", "ANA GOMEZ").with("id", 7i64)];
        let (c, s, p) = (contract_src(), sheet_src(&["nombre"]), plan_src("nombre"));

        let pass = match_triple_join(&contracts, &sheet, &plans, (&c, &s, &p));
        assert_eq!(pass.outcomes.len(), 1);
        assert!(pass.skips.is_empty());
        let MatchOutcome::Triple(t) = &pass.outcomes[0] else { panic!("expected triple") };
        assert_eq!(t.contract_id, 1);
        assert_eq!(t.plan_id, 7);
        assert_eq!(t.spreadsheet_name, "ana gomez");
    }

    #[test]
    fn triple_join_first_seen_wins() {
        let contracts = vec![contract(1, 1, "José Díaz")];
        let sheet = vec![
            Record::new(1).with("nombre", "Jose Diaz"),
            Record::new(2).with("nombre", "JOSÉ DÍAZ"),
        ];
        let plans = vec![
            Record::new(1).with("nombre", "jose  diaz").with("id", 3i64),
            Record::new(2).with("nombre", "José Díaz").with("id", 4i64),
        ];
        let (c, s, p) = (contract_src(), sheet_src(&["nombre"]), plan_src("nombre"));

        let pass = match_triple_join(&contracts, &sheet, &plans, (&c, &s, &p));
        let MatchOutcome::Triple(t) = &pass.outcomes[0] else { panic!("expected triple") };
        assert_eq!(t.spreadsheet.row, 1);
        assert_eq!(t.spreadsheet_name, "Jose Diaz");
        assert_eq!(t.plan_id, 3);
    }

    #[test]
    fn triple_join_requires_both_matches() {
        let contracts = vec![contract(1, 1, "Ana"), contract(2, 2, "Beto"), contract(3, 3, "Carla")];
        let sheet = vec![Record::new(1).with("nombre", "Ana"), Record::new(2).with("nombre", "Beto")];
        let plans = vec![Record::new(1).with("nombre", "Beto").with("id", 9i64)];
        let (c, s, p) = (contract_src(), sheet_src(&["nombre"]), plan_src("nombre"));

        let pass = match_triple_join(&contracts, &sheet, &plans, (&c, &s, &p));
        assert_eq!(pass.outcomes.len(), 1);
        assert_eq!(pass.outcomes[0].contract_row(), 2);
        assert_eq!(pass.skips.len(), 2);
        assert!(pass.skips.iter().all(|s| s.reason == SkipReason::NoMatch));
    }

    #[test]
    fn triple_join_skips_bad_records() {
        let contracts = vec![
            Record::new(1).with("id", 1i64),
            Record::new(2).with("nombre", "Ana"),
            Record::new(3).with("id", "uno").with("nombre", "Ana"),
            contract(4, 4, "Ana"),
        ];
        let sheet = vec![Record::new(1).with("nombre", "Ana")];
        let plans = vec![Record::new(1).with("nombre", "Ana").with("id", "siete")];
        let (c, s, p) = (contract_src(), sheet_src(&["nombre"]), plan_src("nombre"));

        let pass = match_triple_join(&contracts, &sheet, &plans, (&c, &s, &p));
        assert!(pass.outcomes.is_empty());
        let reasons: Vec<_> = pass.skips.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::MissingField { column: "nombre".into() },
                SkipReason::MissingField { column: "id".into() },
                SkipReason::InvalidId { column: "id".into(), value: "uno".into() },
                SkipReason::InvalidPlanId { value: "siete".into() },
            ]
        );
    }

    #[test]
    fn triple_join_keeps_contract_order() {
        let contracts: Vec<_> = ["Zoe", "Ana", "Mia", "Bea"]
            .iter()
            .enumerate()
            .map(|(i, n)| contract(i + 1, (i + 1) as i64 * 10, n))
            .collect();
        let sheet: Vec<_> = ["Bea", "Mia", "Ana", "Zoe"]
            .iter()
            .map(|n| Record::new(1).with("nombre", *n))
            .collect();
        let plans: Vec<_> = ["Mia", "Zoe", "Bea", "Ana"]
            .iter()
            .enumerate()
            .map(|(i, n)| Record::new(i + 1).with("nombre", *n).with("id", i as i64))
            .collect();
        let (c, s, p) = (contract_src(), sheet_src(&["nombre"]), plan_src("nombre"));

        let pass = match_triple_join(&contracts, &sheet, &plans, (&c, &s, &p));
        let rows: Vec<_> = pass.outcomes.iter().map(MatchOutcome::contract_row).collect();
        assert_eq!(rows, vec![1, 2, 3, 4]);
    }

    fn code_fixture() -> (Vec<Record>, Vec<Record>) {
        let sheet = vec![
            Record::new(1)
                .with("Nombre", "Ana")
                .with("Apellido", "Gómez")
                .with("Cod", "C-1")
                .with("Plan", "Fibra 100"),
            Record::new(2)
                .with("Nombre", "Luis")
                .with("Apellido", "O'Neil")
                .with("Cod", "C-2")
                .with("Plan", "Plan Inexistente"),
            Record::new(3)
                .with("Nombre", "Eva")
                .with("Apellido", "Ruiz")
                .with("Cod", "C-3"),
        ];
        let plans = vec![
            Record::new(1).with("name", "FIBRA 100").with("id", 100i64),
            Record::new(2).with("name", "Fibra 300").with("id", 300i64),
        ];
        (sheet, plans)
    }

    #[test]
    fn code_lookup_full_partial_and_none() {
        let (sheet, plans) = code_fixture();
        let contracts = vec![
            contract(1, 11, "ana gomez"),
            contract(2, 12, "Luis ONeil"),
            contract(3, 13, "Eva Ruiz"),
            contract(4, 14, "Nadie Conocido"),
        ];
        let (c, s, p) = (contract_src(), sheet_src(&["Nombre", "Apellido"]), plan_src("name"));

        let pass = match_code_lookup(&contracts, &sheet, &plans, (&c, &s, &p), None);
        assert_eq!(pass.outcomes.len(), 3);
        assert_eq!(pass.skips, vec![Skip { contract_row: 4, reason: SkipReason::NoMatch }]);

        let codes: Vec<_> = pass
            .outcomes
            .iter()
            .map(|o| match o {
                MatchOutcome::Code(m) => (m.contract_id, m.code.clone(), m.plan_id),
                MatchOutcome::Triple(_) => panic!("expected code match"),
            })
            .collect();
        assert_eq!(
            codes,
            vec![
                (11, "C-1".to_string(), Some(100)),
                (12, "C-2".to_string(), None),
                (13, "C-3".to_string(), None),
            ]
        );
    }

    #[test]
    fn code_lookup_duplicate_names_last_write_wins() {
        let sheet = vec![
            Record::new(1).with("nombre", "Ana").with("Cod", "OLD").with("Plan", "A"),
            Record::new(2).with("nombre", "ANA").with("Cod", "NEW").with("Plan", "B"),
        ];
        let plans = vec![
            Record::new(1).with("nombre", "b").with("id", 1i64),
            Record::new(2).with("nombre", "B").with("id", 2i64),
        ];
        let contracts = vec![contract(1, 5, "ana")];
        let (c, s, p) = (contract_src(), sheet_src(&["nombre"]), plan_src("nombre"));

        let pass = match_code_lookup(&contracts, &sheet, &plans, (&c, &s, &p), None);
        let MatchOutcome::Code(m) = &pass.outcomes[0] else { panic!("expected code match") };
        assert_eq!(m.code, "NEW");
        assert_eq!(m.plan_id, Some(2));
    }

    #[test]
    fn code_lookup_similarity_fallback() {
        let (sheet, plans) = code_fixture();
        let contracts = vec![contract(1, 21, "Ana Gomes"), contract(2, 22, "Zacarias Flores")];
        let (c, s, p) = (contract_src(), sheet_src(&["Nombre", "Apellido"]), plan_src("name"));

        let exact_only = match_code_lookup(&contracts, &sheet, &plans, (&c, &s, &p), None);
        assert!(exact_only.outcomes.is_empty());

        let fuzzy = match_code_lookup(&contracts, &sheet, &plans, (&c, &s, &p), Some(0.85));
        assert_eq!(fuzzy.outcomes.len(), 1);
        let MatchOutcome::Code(m) = &fuzzy.outcomes[0] else { panic!("expected code match") };
        assert_eq!(m.code, "C-1");
        assert_eq!(m.plan_id, Some(100));
        assert!(m.score.unwrap() > 0.85 && m.score.unwrap() < 1.0);
        assert_eq!(fuzzy.skips.len(), 1);
    }

    #[test]
    fn partial_name_rows_are_not_indexed() {
        let sheet = vec![Record::new(1).with("Nombre", "Ana").with("Cod", "C-1")];
        let index = CodeIndex::build(&sheet, &sheet_src(&["Nombre", "Apellido"]));
        assert!(index.is_empty());
        assert_eq!(index.row_for("C-1"), Some(0));
    }
}
