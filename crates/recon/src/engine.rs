use std::collections::HashMap;

use crate::config::{MatchConfig, MatchPolicy};
use crate::error::ReconError;
use crate::filter::apply_filters;
use crate::matcher::{match_code_lookup, match_triple_join};
use crate::model::{CellValue, MatchInput, MatchMeta, MatchRun, Record, SourceCounts};
use crate::statement::render_all;
use crate::summary::compute_summary;

/// Run reconciliation per config. Returns outcomes, statements + summary.
pub fn run<'a>(config: &MatchConfig, input: &'a MatchInput) -> Result<MatchRun<'a>, ReconError> {
    check_columns(config, input)?;

    let sources = (
        &config.sources.contracts,
        &config.sources.spreadsheet,
        &config.sources.plans,
    );
    let pass = match config.policy {
        MatchPolicy::TripleJoin => {
            match_triple_join(&input.contracts, &input.spreadsheet, &input.plans, sources)
        }
        MatchPolicy::CodeLookup => match_code_lookup(
            &input.contracts,
            &input.spreadsheet,
            &input.plans,
            sources,
            config.matching.similarity_threshold,
        ),
    };

    let target = config.output.target(config.policy);
    let statements = render_all(&pass.outcomes, &target);
    let summary = compute_summary(&pass, statements.len(), &input.sources);

    Ok(MatchRun {
        meta: MatchMeta {
            config_name: config.name.clone(),
            policy: config.policy,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        outcomes: pass.outcomes,
        skips: pass.skips,
        statements,
    })
}

/// Apply each source's configured row filters, tracking kept counts.
pub fn filter_input(config: &MatchConfig, input: MatchInput) -> Result<MatchInput, ReconError> {
    let [contract_filters, sheet_filters, plan_filters] = config.filters();
    for (source, records, filters) in [
        ("contracts", &input.contracts, contract_filters),
        ("spreadsheet", &input.spreadsheet, sheet_filters),
        ("plans", &input.plans, plan_filters),
    ] {
        for filter in filters {
            require_column(source, records, &filter.column)?;
        }
    }

    let MatchInput {
        contracts,
        spreadsheet,
        plans,
        mut sources,
    } = input;

    let contracts = apply_filters(contracts, contract_filters);
    let spreadsheet = apply_filters(spreadsheet, sheet_filters);
    let plans = apply_filters(plans, plan_filters);

    sources.contracts = SourceCounts { kept: contracts.len(), ..sources.contracts };
    sources.spreadsheet = SourceCounts { kept: spreadsheet.len(), ..sources.spreadsheet };
    sources.plans = SourceCounts { kept: plans.len(), ..sources.plans };

    log::info!(
        "filters kept {}/{} contracts, {}/{} spreadsheet rows, {}/{} plans",
        sources.contracts.kept,
        sources.contracts.read,
        sources.spreadsheet.kept,
        sources.spreadsheet.read,
        sources.plans.kept,
        sources.plans.read,
    );

    Ok(MatchInput {
        contracts,
        spreadsheet,
        plans,
        sources,
    })
}

/// Every configured column must exist in at least one record of a non-empty source.
fn check_columns(config: &MatchConfig, input: &MatchInput) -> Result<(), ReconError> {
    let src = &config.sources;

    require_column("contracts", &input.contracts, &src.contracts.id_column)?;
    require_column("contracts", &input.contracts, &src.contracts.name_column)?;

    for column in &src.spreadsheet.name_columns {
        require_column("spreadsheet", &input.spreadsheet, column)?;
    }
    if config.policy == MatchPolicy::CodeLookup {
        for column in [&src.spreadsheet.code_column, &src.spreadsheet.plan_column]
            .into_iter()
            .flatten()
        {
            require_column("spreadsheet", &input.spreadsheet, column)?;
        }
    }

    require_column("plans", &input.plans, &src.plans.name_column)?;
    require_column("plans", &input.plans, &src.plans.id_column)?;

    Ok(())
}

fn require_column(source: &str, records: &[Record], column: &str) -> Result<(), ReconError> {
    if records.is_empty() || records.iter().any(|r| r.has_column(column)) {
        Ok(())
    } else {
        Err(ReconError::MissingColumn {
            source: source.into(),
            column: column.into(),
        })
    }
}

/// Parse delimited text into records. The first row is the header.
pub fn load_csv_records(source: &str, csv_data: &str, delimiter: u8) -> Result<Vec<Record>, ReconError> {
    load_csv_table(source, csv_data, delimiter).map(|(_, records)| records)
}

/// Like [`load_csv_records`], also returning the non-blank header names in file order.
pub fn load_csv_table(
    source: &str,
    csv_data: &str,
    delimiter: u8,
) -> Result<(Vec<String>, Vec<Record>), ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::MalformedInput {
            source: source.into(),
            row: 0,
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result.map_err(|e| ReconError::MalformedInput {
            source: source.into(),
            row,
            message: e.to_string(),
        })?;

        // Fully blank lines carry no data.
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let mut fields = HashMap::with_capacity(headers.len());
        for (col, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record.get(col).map(CellValue::from_raw).unwrap_or(CellValue::Empty);
            fields.insert(header.clone(), value);
        }

        records.push(Record { row, fields });
    }

    let headers = headers.into_iter().filter(|h| !h.is_empty()).collect();
    Ok((headers, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIPLE_TOML: &str = r#"
name = "Integration"

[sources.contracts]
file = "contracts.csv"

[sources.spreadsheet]
file = "planilla.csv"

[sources.plans]
file = "planes.csv"
"#;

    #[test]
    fn load_csv_basic() {
        let csv = "\
\u{feff}id,nombre , Cod
1,\"Gomez, Ana\",X1
2,O'Brien,
";
        let records = load_csv_records("contracts", csv, b',').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 1);
        assert_eq!(records[0].integer("id"), Some(1));
        assert_eq!(records[0].text("nombre").as_deref(), Some("Gomez, Ana"));
        assert_eq!(records[0].text("Cod").as_deref(), Some("X1"));
        assert_eq!(records[1].text("nombre").as_deref(), Some("O'Brien"));
        assert_eq!(records[1].get("Cod"), Some(&CellValue::Empty));
    }

    #[test]
    fn load_csv_short_rows_and_blank_lines() {
        let csv = "id;nombre;plan\n1;Ana\n;;\n3;Beto;Fibra\n";
        let records = load_csv_records("contracts", csv, b';').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("plan"), Some(&CellValue::Empty));
        assert_eq!(records[1].row, 3);
        assert_eq!(records[1].text("plan").as_deref(), Some("Fibra"));
    }

    #[test]
    fn integration_triple_join() {
        let contracts_csv = "\
id,nombre
1,Ana Gomez
2,Luis Díaz
3,Sin Coincidencia
";
        let sheet_csv = "\
nombre,Cod
ana gomez,X1
LUIS DIAZ,X2
";
        let plans_csv = "\
nombre,id
ANA GOMEZ,7
Luis  Díaz,8
";
        let config = MatchConfig::from_toml(TRIPLE_TOML).unwrap();
        let input = MatchInput::new(
            load_csv_records("contracts", contracts_csv, b',').unwrap(),
            load_csv_records("spreadsheet", sheet_csv, b',').unwrap(),
            load_csv_records("plans", plans_csv, b',').unwrap(),
        );

        let result = run(&config, &input).unwrap();
        assert_eq!(result.meta.policy, MatchPolicy::TripleJoin);
        assert_eq!(result.summary.contracts, 3);
        assert_eq!(result.summary.matches, 2);
        assert_eq!(result.summary.statements, 2);
        assert_eq!(result.summary.no_match, 1);
        assert_eq!(
            result.statements,
            vec![
                "UPDATE contratos SET nombre_excel = 'ana gomez', plan_id = 7 WHERE id = 1;",
                "UPDATE contratos SET nombre_excel = 'LUIS DIAZ', plan_id = 8 WHERE id = 2;",
            ]
        );
    }

    #[test]
    fn missing_configured_column_is_fatal() {
        let config = MatchConfig::from_toml(TRIPLE_TOML).unwrap();
        let input = MatchInput::new(
            vec![Record::new(1).with("id", 1i64).with("name", "Ana")],
            vec![Record::new(1).with("nombre", "Ana")],
            vec![Record::new(1).with("nombre", "Ana").with("id", 1i64)],
        );
        let err = run(&config, &input).unwrap_err();
        assert!(matches!(
            err,
            ReconError::MissingColumn { ref source, ref column } if source == "contracts" && column == "nombre"
        ));
    }

    #[test]
    fn plan_id_column_checked_for_both_policies() {
        let code_toml = TRIPLE_TOML.replace(
            "file = \"planilla.csv\"",
            "file = \"planilla.csv\"\ncode_column = \"Cod\"\nplan_column = \"Plan\"",
        );
        let code_toml = format!("policy = \"code_lookup\"\n{code_toml}");
        for toml in [TRIPLE_TOML.to_string(), code_toml] {
            let config = MatchConfig::from_toml(&toml).unwrap();
            let input = MatchInput::new(
                vec![Record::new(1).with("id", 1i64).with("nombre", "Ana")],
                vec![Record::new(1).with("nombre", "Ana").with("Cod", "C-1").with("Plan", "Fibra")],
                vec![Record::new(1).with("nombre", "Fibra").with("plan", 7i64)],
            );
            let err = run(&config, &input).unwrap_err();
            assert!(matches!(
                err,
                ReconError::MissingColumn { ref source, ref column } if source == "plans" && column == "id"
            ));

            let no_plans = MatchInput::new(input.contracts.clone(), input.spreadsheet.clone(), Vec::new());
            assert!(run(&config, &no_plans).is_ok());
        }
    }

    #[test]
    fn load_csv_table_returns_header_order() {
        let csv = "\u{feff} nombre ;;id\nAna;x;1\n";
        let (headers, records) = load_csv_table("plans", csv, b';').unwrap();
        assert_eq!(headers, vec!["nombre", "id"]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].integer("id"), Some(1));
    }

    #[test]
    fn empty_sources_produce_empty_run() {
        let config = MatchConfig::from_toml(TRIPLE_TOML).unwrap();
        let input = MatchInput::default();
        let result = run(&config, &input).unwrap();
        assert_eq!(result.summary.contracts, 0);
        assert!(result.statements.is_empty());
    }

    #[test]
    fn filters_drop_rows_and_count() {
        let toml = format!(
            r#"{TRIPLE_TOML}
[[sources.contracts.filters]]
column = "estado"
op = "equals"
value = "activo"
"#
        );
        let config = MatchConfig::from_toml(&toml).unwrap();
        let input = MatchInput::new(
            vec![
                Record::new(1).with("id", 1i64).with("nombre", "Ana").with("estado", "Activo"),
                Record::new(2).with("id", 2i64).with("nombre", "Beto").with("estado", "Baja"),
            ],
            vec![Record::new(1).with("nombre", "Ana"), Record::new(2).with("nombre", "Beto")],
            vec![
                Record::new(1).with("nombre", "Ana").with("id", 5i64),
                Record::new(2).with("nombre", "Beto").with("id", 6i64),
            ],
        );

        let filtered = filter_input(&config, input).unwrap();
        assert_eq!(filtered.sources.contracts, SourceCounts { read: 2, kept: 1 });
        assert_eq!(filtered.sources.plans, SourceCounts { read: 2, kept: 2 });

        let result = run(&config, &filtered).unwrap();
        assert_eq!(result.summary.contracts, 1);
        assert_eq!(result.summary.sources.contracts.read, 2);
        assert_eq!(
            result.statements,
            vec!["UPDATE contratos SET nombre_excel = 'Ana', plan_id = 5 WHERE id = 1;"]
        );
    }

    #[test]
    fn filter_on_unknown_column_is_fatal() {
        let toml = format!(
            "{TRIPLE_TOML}\n[[sources.plans.filters]]\ncolumn = \"zona\"\nop = \"equals\"\nvalue = \"norte\"\n"
        );
        let config = MatchConfig::from_toml(&toml).unwrap();
        let input = MatchInput::new(
            Vec::new(),
            Vec::new(),
            vec![Record::new(1).with("nombre", "Ana").with("id", 5i64)],
        );
        let err = filter_input(&config, input).unwrap_err();
        assert!(err.to_string().contains("zona"));
    }
}
