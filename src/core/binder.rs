//! RS-004: Field binding. Copies dataset series onto a model by field name.
//!
//! Every declared field is assigned: the period-count field gets `LL`, a
//! series field gets the dataset row of the same name or `LL` zeros. Dataset
//! rows without a matching field are dropped.

use super::error::EngineError;
use super::model::Model;
use super::types::{Dataset, FieldKind, FieldValue};
use tracing::debug;

/// What a bind did, by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Series fields filled from a dataset row.
    pub bound: Vec<String>,
    /// Series fields with no dataset row, zero-filled.
    pub zero_filled: Vec<String>,
    /// Dataset rows with no matching field.
    pub dropped: Vec<String>,
}

/// Bind a parsed dataset onto a model instance.
pub fn bind_dataset(model: &mut dyn Model, dataset: &Dataset) -> Result<BindReport, EngineError> {
    let ll = dataset.ll();
    let mut report = BindReport::default();
    let descriptors = model.descriptors().to_vec();

    for field in &descriptors {
        let value = match field.kind {
            FieldKind::PeriodCount => FieldValue::Periods(ll),
            FieldKind::Series => match dataset.series.get(&field.name) {
                Some(series) => {
                    report.bound.push(field.name.clone());
                    FieldValue::Series(series.clone())
                }
                None => {
                    report.zero_filled.push(field.name.clone());
                    FieldValue::Series(vec![0.0; ll])
                }
            },
        };
        debug!(field = %field.name, kind = %field.kind, "binding field");
        model.set_field(&field.name, value)?;
    }

    report.dropped = dataset
        .series
        .keys()
        .filter(|name| model.field_kind(name) != Some(FieldKind::Series))
        .cloned()
        .collect();
    if !report.dropped.is_empty() {
        debug!(dropped = ?report.dropped, model = model.model_id(), "dataset rows without a model field");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::tests::economy_registry;
    use crate::core::parser::parse_dataset;

    #[test]
    fn test_rs004_end_to_end_scenario() {
        let dataset = parse_dataset("LATA 2020 2021\nGDP 10 20\nPOP 5").unwrap();
        let mut model = economy_registry().instantiate("Economy").unwrap();
        let report = bind_dataset(model.as_mut(), &dataset).unwrap();

        assert_eq!(model.get_field("LL").unwrap(), FieldValue::Periods(2));
        assert_eq!(
            model.get_field("GDP").unwrap(),
            FieldValue::Series(vec![10.0, 20.0])
        );
        assert_eq!(
            model.get_field("POP").unwrap(),
            FieldValue::Series(vec![5.0, 5.0])
        );
        assert_eq!(
            model.get_field("TAX").unwrap(),
            FieldValue::Series(vec![0.0, 0.0])
        );
        assert_eq!(report.bound, vec!["GDP", "POP"]);
        assert_eq!(report.zero_filled, vec!["TAX"]);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_rs004_unknown_variable_dropped() {
        let dataset = parse_dataset("LATA 1 2\nGDP 1 2\nINFL 3 4").unwrap();
        let mut model = economy_registry().instantiate("Economy").unwrap();
        let report = bind_dataset(model.as_mut(), &dataset).unwrap();
        assert_eq!(report.dropped, vec!["INFL"]);
        assert!(model.get_field("INFL").is_err());
    }

    #[test]
    fn test_rs004_series_named_like_period_field_is_dropped() {
        let dataset = parse_dataset("LATA a b c\nLL 9 9 9").unwrap();
        let mut model = economy_registry().instantiate("Economy").unwrap();
        let report = bind_dataset(model.as_mut(), &dataset).unwrap();
        assert_eq!(model.get_field("LL").unwrap(), FieldValue::Periods(3));
        assert_eq!(report.dropped, vec!["LL"]);
    }

    #[test]
    fn test_rs004_every_series_has_length_ll() {
        let dataset = parse_dataset("LATA q1 q2 q3 q4 q5\nGDP 1\nPOP").unwrap();
        let mut model = economy_registry().instantiate("Economy").unwrap();
        bind_dataset(model.as_mut(), &dataset).unwrap();
        for name in ["GDP", "POP", "TAX"] {
            match model.get_field(name).unwrap() {
                FieldValue::Series(v) => assert_eq!(v.len(), 5, "{name}"),
                other => panic!("{name} not a series: {other:?}"),
            }
        }
    }

    #[test]
    fn test_rs004_rebind_overwrites() {
        let registry = economy_registry();
        let mut model = registry.instantiate("Economy").unwrap();
        bind_dataset(model.as_mut(), &parse_dataset("LATA a b\nGDP 1 2").unwrap()).unwrap();
        bind_dataset(model.as_mut(), &parse_dataset("LATA a\nPOP 7").unwrap()).unwrap();
        assert_eq!(model.get_field("LL").unwrap(), FieldValue::Periods(1));
        assert_eq!(model.get_field("GDP").unwrap(), FieldValue::Series(vec![0.0]));
        assert_eq!(model.get_field("POP").unwrap(), FieldValue::Series(vec![7.0]));
    }
}
