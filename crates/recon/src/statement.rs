//! SQL `UPDATE` rendering for reconciled contracts.

use crate::model::{CodeMatch, MatchOutcome, MatchedTriple};

/// Double every single quote so the value can sit inside `'...'`.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Replace anything outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

impl SqlValue {
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => format!("'{}'", escape_sql_string(s)),
            Self::Integer(i) => i.to_string(),
        }
    }
}

/// Single-line `UPDATE` builder. Identifiers are expected to be sanitized.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    table: String,
    set: Vec<(String, SqlValue)>,
    filter: Vec<(String, SqlValue)>,
}

impl UpdateStatement {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            set: Vec::new(),
            filter: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: SqlValue) -> Self {
        self.set.push((column.to_string(), value));
        self
    }

    pub fn filter(mut self, column: &str, value: SqlValue) -> Self {
        self.filter.push((column.to_string(), value));
        self
    }

    pub fn render(&self) -> String {
        let assignments = join_pairs(&self.set, ", ");
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments);
        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&join_pairs(&self.filter, " AND "));
        }
        sql.push(';');
        sql
    }
}

fn join_pairs(pairs: &[(String, SqlValue)], sep: &str) -> String {
    pairs
        .iter()
        .map(|(col, val)| format!("{col} = {}", val.render()))
        .collect::<Vec<_>>()
        .join(sep)
}

/// Table and column names statements are written against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTarget {
    pub table: String,
    pub name_column: String,
    pub code_column: String,
    pub plan_column: String,
    pub key_column: String,
}

pub fn render_outcome(outcome: &MatchOutcome<'_>, target: &StatementTarget) -> String {
    match outcome {
        MatchOutcome::Triple(triple) => render_triple(triple, target),
        MatchOutcome::Code(code) => render_code(code, target),
    }
}

fn render_triple(triple: &MatchedTriple<'_>, target: &StatementTarget) -> String {
    UpdateStatement::new(&target.table)
        .set(&target.name_column, SqlValue::Text(triple.spreadsheet_name.clone()))
        .set(&target.plan_column, SqlValue::Integer(triple.plan_id))
        .filter(&target.key_column, SqlValue::Integer(triple.contract_id))
        .render()
}

fn render_code(code: &CodeMatch<'_>, target: &StatementTarget) -> String {
    let mut stmt = UpdateStatement::new(&target.table)
        .set(&target.code_column, SqlValue::Text(code.code.clone()));
    if let Some(plan_id) = code.plan_id {
        stmt = stmt.set(&target.plan_column, SqlValue::Integer(plan_id));
    }
    stmt.filter(&target.key_column, SqlValue::Integer(code.contract_id))
        .render()
}

/// One statement per outcome, in outcome order.
pub fn render_all(outcomes: &[MatchOutcome<'_>], target: &StatementTarget) -> Vec<String> {
    outcomes.iter().map(|o| render_outcome(o, target)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn target(table: &str) -> StatementTarget {
        StatementTarget {
            table: table.into(),
            name_column: "nombre_excel".into(),
            code_column: "nro".into(),
            plan_column: "plan_id".into(),
            key_column: "id".into(),
        }
    }

    #[test]
    fn escape_doubles_quotes() {
        assert_eq!(escape_sql_string("O'Brien"), "O''Brien");
        assert_eq!(escape_sql_string("''"), "''''");
        assert_eq!(escape_sql_string("plain"), "plain");
    }

    #[test]
    fn sanitize_identifiers() {
        assert_eq!(sanitize_identifier("plan_id"), "plan_id");
        assert_eq!(sanitize_identifier(" Nombre Excel "), "Nombre_Excel");
        assert_eq!(sanitize_identifier("id; DROP"), "id__DROP");
    }

    #[test]
    fn builder_renders_single_line() {
        let sql = UpdateStatement::new("t")
            .set("a", SqlValue::Text("x'y".into()))
            .set("b", SqlValue::Integer(-2))
            .filter("id", SqlValue::Integer(3))
            .filter("k", SqlValue::Text("z".into()))
            .render();
        assert_eq!(sql, "UPDATE t SET a = 'x''y', b = -2 WHERE id = 3 AND k = 'z';");
    }

    #[test]
    fn triple_statement() {
        let contract = Record::new(1).with("id", 1i64).with("nombre", "Ana Gomez");
        let sheet = Record::new(1).with("nombre", "O'Brien");
        let plan = Record::new(1).with("id", 7i64);
        let outcome = MatchOutcome::Triple(MatchedTriple {
            contract: &contract,
            spreadsheet: &sheet,
            plan: &plan,
            contract_id: 1,
            spreadsheet_name: "O'Brien".into(),
            plan_id: 7,
        });
        assert_eq!(
            render_outcome(&outcome, &target("contratos")),
            "UPDATE contratos SET nombre_excel = 'O''Brien', plan_id = 7 WHERE id = 1;"
        );
    }

    #[test]
    fn code_statements_full_and_partial() {
        let contract = Record::new(4).with("id", 12i64);
        let full = MatchOutcome::Code(CodeMatch {
            contract: &contract,
            contract_id: 12,
            code: "A'1".into(),
            plan_id: Some(3),
            score: None,
        });
        let partial = MatchOutcome::Code(CodeMatch {
            contract: &contract,
            contract_id: 12,
            code: "A'1".into(),
            plan_id: None,
            score: None,
        });
        let rendered = render_all(&[full, partial], &target("contracts"));
        assert_eq!(
            rendered,
            vec![
                "UPDATE contracts SET nro = 'A''1', plan_id = 3 WHERE id = 12;",
                "UPDATE contracts SET nro = 'A''1' WHERE id = 12;",
            ]
        );
        for sql in &rendered {
            assert!(sql.ends_with(';') && !sql.ends_with(";;"));
        }
    }
}
