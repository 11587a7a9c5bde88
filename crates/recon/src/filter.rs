use crate::config::{FilterOp, RowFilter};
use crate::model::Record;

/// True when the record passes every filter.
pub fn row_passes(record: &Record, filters: &[RowFilter]) -> bool {
    filters.iter().all(|f| filter_matches(record, f))
}

/// Keep the records that pass every filter, preserving order.
pub fn apply_filters(records: Vec<Record>, filters: &[RowFilter]) -> Vec<Record> {
    if filters.is_empty() {
        return records;
    }
    records.into_iter().filter(|r| row_passes(r, filters)).collect()
}

fn filter_matches(record: &Record, filter: &RowFilter) -> bool {
    let Some(cell) = record.get(&filter.column) else {
        return false;
    };

    let actual = || cell.as_text().unwrap_or_default().to_lowercase();
    let expected = filter.value.to_lowercase();
    let numbers = || Some((cell.as_number()?, filter.value.trim().parse::<f64>().ok()?));

    match filter.op {
        FilterOp::Equals => actual() == expected,
        FilterOp::Contains => actual().contains(&expected),
        FilterOp::ContainsExclude => {
            let actual = actual();
            let excluded = filter.exclude.as_deref().unwrap_or_default().to_lowercase();
            actual.contains(&expected) && (excluded.is_empty() || !actual.contains(&excluded))
        }
        FilterOp::StartsWith => actual().starts_with(&expected),
        FilterOp::EndsWith => actual().ends_with(&expected),
        FilterOp::GreaterThan => numbers().is_some_and(|(a, e)| a > e),
        FilterOp::LessThan => numbers().is_some_and(|(a, e)| a < e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(column: &str, op: FilterOp, value: &str) -> RowFilter {
        RowFilter {
            column: column.into(),
            op,
            value: value.into(),
            exclude: None,
        }
    }

    fn rec(estado: &str, deuda: f64) -> Record {
        Record::new(1).with("estado", estado).with("deuda", deuda)
    }

    #[test]
    fn string_ops_are_case_insensitive() {
        let r = rec("Activo Residencial", 0.0);
        assert!(row_passes(&r, &[filter("estado", FilterOp::Equals, "activo residencial")]));
        assert!(row_passes(&r, &[filter("estado", FilterOp::Contains, "RESID")]));
        assert!(row_passes(&r, &[filter("estado", FilterOp::StartsWith, "activo")]));
        assert!(row_passes(&r, &[filter("estado", FilterOp::EndsWith, "encial")]));
        assert!(!row_passes(&r, &[filter("estado", FilterOp::Equals, "activo")]));
    }

    #[test]
    fn contains_exclude() {
        let mut f = filter("estado", FilterOp::ContainsExclude, "activo");
        f.exclude = Some("baja".into());
        assert!(row_passes(&rec("Activo", 0.0), &[f.clone()]));
        assert!(!row_passes(&rec("Activo - baja", 0.0), &[f.clone()]));
        assert!(!row_passes(&rec("Suspendido", 0.0), &[f]));
    }

    #[test]
    fn numeric_ops() {
        let r = rec("x", 1500.0);
        assert!(row_passes(&r, &[filter("deuda", FilterOp::GreaterThan, "1000")]));
        assert!(!row_passes(&r, &[filter("deuda", FilterOp::LessThan, "1000")]));
        let text = Record::new(1).with("deuda", "no aplica");
        assert!(!row_passes(&text, &[filter("deuda", FilterOp::GreaterThan, "0")]));
        let numeric_text = Record::new(1).with("deuda", " 20 ");
        assert!(row_passes(&numeric_text, &[filter("deuda", FilterOp::LessThan, "25.5")]));
    }

    #[test]
    fn missing_column_fails_record() {
        let r = rec("Activo", 0.0);
        assert!(!row_passes(&r, &[filter("zona", FilterOp::Equals, "norte")]));
    }

    #[test]
    fn all_filters_must_pass_and_order_is_kept() {
        let rows = vec![rec("activo", 10.0), rec("baja", 20.0), rec("activo", 30.0)];
        let filters = [
            filter("estado", FilterOp::Equals, "activo"),
            filter("deuda", FilterOp::GreaterThan, "5"),
        ];
        let kept = apply_filters(rows, &filters);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].integer("deuda"), Some(10));
        assert_eq!(kept[1].integer("deuda"), Some(30));
    }
}
