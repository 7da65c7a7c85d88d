//! RS-008: Result serialization and dataset preview.
//!
//! A snapshot lists every model field in declaration order, then every store
//! variable in insertion order. The period-count row carries period labels
//! instead of numbers.

use super::error::EngineError;
use super::state::Session;
use super::types::{format_number, Dataset, FieldValue, PERIOD_HEADER};
use std::fmt;

/// One named row of rendered cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub name: String,
    pub cells: Vec<String>,
}

/// Ordered result rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// `<NAME>\t<v1> <v2> ... <vN>\n` per row.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&row.name);
            out.push('\t');
            out.push_str(&row.cells.join(" "));
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tsv())
    }
}

fn numbers(values: &[f64]) -> Vec<String> {
    values.iter().map(|x| format_number(*x)).collect()
}

/// Render the session's model fields and script variables.
pub fn snapshot(session: &Session) -> Result<ResultTable, EngineError> {
    let model = session.model();
    let mut rows = Vec::with_capacity(model.descriptors().len() + session.store().len());

    for field in model.descriptors() {
        let cells = match model.get_field(&field.name)? {
            FieldValue::Periods(_) => session.periods().to_vec(),
            FieldValue::Series(values) => numbers(&values),
            FieldValue::Unset => {
                return Err(EngineError::IllegalState(format!(
                    "series field '{}' is unset after binding",
                    field.name
                )))
            }
        };
        rows.push(ResultRow {
            name: field.name.clone(),
            cells,
        });
    }

    for (name, value) in session.store().iter() {
        rows.push(ResultRow {
            name: name.to_string(),
            cells: numbers(&value.to_vec()),
        });
    }

    Ok(ResultTable { rows })
}

/// Column-aligned view of a parsed dataset: the period header, then one row
/// per variable.
pub fn preview(dataset: &Dataset) -> String {
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(dataset.series.len() + 1);
    let mut header = vec![PERIOD_HEADER.to_string()];
    header.extend(dataset.periods.iter().cloned());
    grid.push(header);
    for (name, values) in &dataset.series {
        let mut row = vec![name.clone()];
        row.extend(numbers(values));
        grid.push(row);
    }

    let columns = dataset.ll() + 1;
    let widths: Vec<usize> = (0..columns)
        .map(|c| grid.iter().map(|r| r[c].len()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &grid {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(c, cell)| {
                if c == 0 {
                    format!("{:<w$}", cell, w = widths[c])
                } else {
                    format!("{:>w$}", cell, w = widths[c])
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::bind_dataset;
    use crate::core::model::tests::economy_registry;
    use crate::core::parser::parse_dataset;
    use crate::core::types::Value;
    use proptest::prelude::*;

    fn session_for(text: &str) -> Session {
        let dataset = parse_dataset(text).unwrap();
        let mut model = economy_registry().instantiate("Economy").unwrap();
        bind_dataset(model.as_mut(), &dataset).unwrap();
        Session::new("s-test".to_string(), model, dataset.periods)
    }

    #[test]
    fn test_rs008_end_to_end_rows() {
        let session = session_for("LATA 2020 2021\nGDP 10 20\nPOP 5");
        let table = snapshot(&session).unwrap();
        assert_eq!(
            table.to_tsv(),
            "LL\t2020 2021\nGDP\t10.0 20.0\nPOP\t5.0 5.0\nTAX\t0.0 0.0\n"
        );
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_rs008_store_rows_follow_in_insertion_order() {
        let mut session = session_for("LATA a b\nGDP 1 2");
        session.store_mut().insert("ZED", Value::Series(vec![1.0, 2.0]));
        session.store_mut().insert("ALPHA", Value::Scalar(0.5));
        let table = snapshot(&session).unwrap();
        let names: Vec<_> = table.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["LL", "GDP", "POP", "TAX", "ZED", "ALPHA"]);
        assert_eq!(table.get("ALPHA").unwrap().cells, vec!["0.5"]);
    }

    #[test]
    fn test_rs008_unknown_variable_absent() {
        let session = session_for("LATA a\nINFL 3\nGDP 1");
        let table = snapshot(&session).unwrap();
        assert!(table.get("INFL").is_none());
    }

    #[test]
    fn test_rs008_unset_series_is_illegal_state() {
        let model = economy_registry().instantiate("Economy").unwrap();
        let session = Session::new("s".to_string(), model, vec![]);
        assert!(matches!(
            snapshot(&session),
            Err(EngineError::IllegalState(_))
        ));
    }

    #[test]
    fn test_rs008_round_trip_preserves_values() {
        let text = "LATA q1 q2 q3\nGDP 1.25 -3 1e-3\nPOP 7\nTAX 0.1 0.2 0.30000000000000004";
        let dataset = parse_dataset(text).unwrap();
        let table = snapshot(&session_for(text)).unwrap();
        for (name, values) in &dataset.series {
            let parsed: Vec<f64> = table
                .get(name)
                .unwrap()
                .cells
                .iter()
                .map(|c| c.parse().unwrap())
                .collect();
            assert_eq!(&parsed, values, "{name}");
        }
    }

    #[test]
    fn test_rs008_preview_alignment() {
        let dataset = parse_dataset("LATA 2020 2021\nGDP 10 200.5\nPOPULATION 5").unwrap();
        let text = preview(&dataset);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("LATA        "));
        assert!(lines[1].starts_with("GDP         "));
        assert!(lines[1].ends_with("200.5"));
        assert!(lines[2].starts_with("POPULATION"));
        let ends: Vec<_> = lines.iter().map(|l| l.len()).collect();
        assert!(ends.iter().all(|e| *e == ends[0]));
    }

    /// Expected series for a row of `values` under an `ll`-period header.
    fn filled(values: &[f64], ll: usize) -> Vec<f64> {
        let mut out: Vec<f64> = values.iter().copied().take(ll).collect();
        let pad = out.last().copied().unwrap_or(0.0);
        out.resize(ll, pad);
        out
    }

    proptest! {
        #[test]
        fn prop_rs008_round_trip(
            ll in 1usize..8,
            rows in proptest::collection::vec(proptest::collection::vec(-1e9f64..1e9, 0..10), 3),
        ) {
            let labels: Vec<String> = (0..ll).map(|i| format!("p{i}")).collect();
            let mut text = format!("LATA {}\n", labels.join(" "));
            for (name, values) in ["GDP", "POP", "TAX"].iter().zip(&rows) {
                let cells: Vec<String> = values.iter().map(|v| format_number(*v)).collect();
                text.push_str(&format!("{} {}\n", name, cells.join(" ")));
            }

            let table = snapshot(&session_for(&text)).unwrap();
            prop_assert_eq!(&table.get("LL").unwrap().cells, &labels);
            for (name, values) in ["GDP", "POP", "TAX"].iter().zip(&rows) {
                let parsed: Vec<f64> = table
                    .get(name)
                    .unwrap()
                    .cells
                    .iter()
                    .map(|c| c.parse().unwrap())
                    .collect();
                prop_assert_eq!(parsed, filled(values, ll));
            }
        }
    }
}
