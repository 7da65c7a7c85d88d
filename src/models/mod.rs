//! RS-016: Built-in models.
//!
//! Each model declares its bindable fields once, in serialization order, and
//! registers under a stable identifier.

use crate::core::error::EngineError;
use crate::core::model::{FieldTable, ModelRegistry};

/// Registry holding every built-in model.
pub fn builtin_registry() -> Result<ModelRegistry, EngineError> {
    let mut registry = ModelRegistry::new();
    registry.register("NationalAccounts", national_accounts_table()?)?;
    registry.register("CompoundGrowth", compound_growth_table()?)?;
    Ok(registry)
}

fn require<'a>(slot: &'a Option<Vec<f64>>, name: &str, ll: usize) -> Result<&'a [f64], String> {
    let values = slot
        .as_deref()
        .ok_or_else(|| format!("field '{}' is unset", name))?;
    if values.len() != ll {
        return Err(format!(
            "field '{}' has {} values, expected {}",
            name,
            values.len(),
            ll
        ));
    }
    Ok(values)
}

// ============================================================================
// NationalAccounts
// ============================================================================

/// GDP by expenditure: consumption, investment, inventories, exports, imports.
///
/// Each `twX` series is a growth index; `X[t] = twX[t] * X[t-1]` from the
/// second period on, then `PKB = KI + KS + INW + EKS - IMP`.
#[derive(Debug, Default)]
pub struct NationalAccounts {
    ll: usize,
    tw_ki: Option<Vec<f64>>,
    tw_ks: Option<Vec<f64>>,
    tw_inw: Option<Vec<f64>>,
    tw_eks: Option<Vec<f64>>,
    tw_imp: Option<Vec<f64>>,
    ki: Option<Vec<f64>>,
    ks: Option<Vec<f64>>,
    inw: Option<Vec<f64>>,
    eks: Option<Vec<f64>>,
    imp: Option<Vec<f64>>,
    pkb: Option<Vec<f64>>,
}

fn national_accounts_table() -> Result<FieldTable<NationalAccounts>, EngineError> {
    FieldTable::<NationalAccounts>::builder()
        .period_count("LL", |m| m.ll, |m, n| m.ll = n)
        .series("twKI", |m| &m.tw_ki, |m| &mut m.tw_ki)
        .series("twKS", |m| &m.tw_ks, |m| &mut m.tw_ks)
        .series("twINW", |m| &m.tw_inw, |m| &mut m.tw_inw)
        .series("twEKS", |m| &m.tw_eks, |m| &mut m.tw_eks)
        .series("twIMP", |m| &m.tw_imp, |m| &mut m.tw_imp)
        .series("KI", |m| &m.ki, |m| &mut m.ki)
        .series("KS", |m| &m.ks, |m| &mut m.ks)
        .series("INW", |m| &m.inw, |m| &mut m.inw)
        .series("EKS", |m| &m.eks, |m| &mut m.eks)
        .series("IMP", |m| &m.imp, |m| &mut m.imp)
        .series("PKB", |m| &m.pkb, |m| &mut m.pkb)
        .compute(compute_national_accounts)
        .build()
}

fn grow(
    level: &mut Option<Vec<f64>>,
    index: &Option<Vec<f64>>,
    name: &str,
    ll: usize,
) -> Result<(), String> {
    let index = require(index, &format!("tw{}", name), ll)?;
    require(level, name, ll)?;
    if let Some(level) = level.as_mut() {
        for t in 1..ll {
            level[t] = index[t] * level[t - 1];
        }
    }
    Ok(())
}

fn compute_national_accounts(m: &mut NationalAccounts) -> Result<(), String> {
    let ll = m.ll;
    grow(&mut m.ki, &m.tw_ki, "KI", ll)?;
    grow(&mut m.ks, &m.tw_ks, "KS", ll)?;
    grow(&mut m.inw, &m.tw_inw, "INW", ll)?;
    grow(&mut m.eks, &m.tw_eks, "EKS", ll)?;
    grow(&mut m.imp, &m.tw_imp, "IMP", ll)?;

    let ki = require(&m.ki, "KI", ll)?;
    let ks = require(&m.ks, "KS", ll)?;
    let inw = require(&m.inw, "INW", ll)?;
    let eks = require(&m.eks, "EKS", ll)?;
    let imp = require(&m.imp, "IMP", ll)?;
    let pkb = (0..ll)
        .map(|t| ki[t] + ks[t] + inw[t] + eks[t] - imp[t])
        .collect();
    m.pkb = Some(pkb);
    Ok(())
}

// ============================================================================
// CompoundGrowth
// ============================================================================

/// `LEVEL[0] = BASE[0]`, `LEVEL[t] = LEVEL[t-1] * (1 + RATE[t])`.
#[derive(Debug, Default)]
pub struct CompoundGrowth {
    ll: usize,
    base: Option<Vec<f64>>,
    rate: Option<Vec<f64>>,
    level: Option<Vec<f64>>,
}

fn compound_growth_table() -> Result<FieldTable<CompoundGrowth>, EngineError> {
    FieldTable::<CompoundGrowth>::builder()
        .period_count("LL", |m| m.ll, |m, n| m.ll = n)
        .series("BASE", |m| &m.base, |m| &mut m.base)
        .series("RATE", |m| &m.rate, |m| &mut m.rate)
        .series("LEVEL", |m| &m.level, |m| &mut m.level)
        .compute(|m| {
            let ll = m.ll;
            let base = require(&m.base, "BASE", ll)?;
            let rate = require(&m.rate, "RATE", ll)?;
            let mut level = Vec::with_capacity(ll);
            for t in 0..ll {
                let next = match level.last() {
                    None => base[0],
                    Some(prev) => prev * (1.0 + rate[t]),
                };
                level.push(next);
            }
            m.level = Some(level);
            Ok(())
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::{open_session, run_model, run_script};
    use crate::core::parser::parse_dataset;
    use crate::core::serializer::snapshot;
    use crate::evaluator::{self, EvalLimits};

    #[test]
    fn test_rs016_registry_contents() {
        let registry = builtin_registry().unwrap();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["NationalAccounts", "CompoundGrowth"]
        );
        let fields: Vec<_> = registry
            .describe("CompoundGrowth")
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(fields, vec!["LL", "BASE", "RATE", "LEVEL"]);
        assert_eq!(registry.describe("NationalAccounts").unwrap().len(), 12);
    }

    #[test]
    fn test_rs016_national_accounts() {
        let registry = builtin_registry().unwrap();
        let dataset = parse_dataset(
            "LATA 2020 2021 2022\n\
             twKI 1 1.5 2\n\
             twKS 1 1\n\
             twINW 1 1\n\
             twEKS 1 2\n\
             twIMP 1 1\n\
             KI 100\n\
             KS 20\n\
             INW 5\n\
             EKS 10\n\
             IMP 30\n",
        )
        .unwrap();
        let mut session = open_session(&registry, "NationalAccounts", &dataset).unwrap();
        run_model(&mut session).unwrap();
        let table = snapshot(&session).unwrap();
        assert_eq!(table.get("KI").unwrap().cells, vec!["100.0", "150.0", "300.0"]);
        assert_eq!(table.get("EKS").unwrap().cells, vec!["10.0", "20.0", "40.0"]);
        assert_eq!(table.get("PKB").unwrap().cells, vec!["105.0", "165.0", "335.0"]);
    }

    #[test]
    fn test_rs016_national_accounts_missing_index_zeroes_levels() {
        let registry = builtin_registry().unwrap();
        let dataset = parse_dataset("LATA a b\nKI 10 10").unwrap();
        let mut session = open_session(&registry, "NationalAccounts", &dataset).unwrap();
        run_model(&mut session).unwrap();
        let table = snapshot(&session).unwrap();
        assert_eq!(table.get("KI").unwrap().cells, vec!["10.0", "0.0"]);
        assert_eq!(table.get("PKB").unwrap().cells, vec!["10.0", "0.0"]);
    }

    #[test]
    fn test_rs016_compound_growth_with_script() {
        let registry = builtin_registry().unwrap();
        let dataset = parse_dataset("LATA y1 y2 y3\nBASE 100\nRATE 0 0.5 -0.5").unwrap();
        let mut session = open_session(&registry, "CompoundGrowth", &dataset).unwrap();
        run_model(&mut session).unwrap();
        let mut ev = evaluator::backend("calc", EvalLimits::default()).unwrap();
        run_script(&mut session, "PEAK = max(LEVEL)\nGAIN = LEVEL - lag(LEVEL)", ev.as_mut())
            .unwrap();
        let table = snapshot(&session).unwrap();
        assert_eq!(table.get("LEVEL").unwrap().cells, vec!["100.0", "150.0", "75.0"]);
        assert_eq!(table.get("PEAK").unwrap().cells, vec!["150.0"]);
        assert_eq!(table.get("GAIN").unwrap().cells, vec!["0.0", "50.0", "-75.0"]);
    }

    #[test]
    fn test_rs016_compute_before_bind_fails() {
        let registry = builtin_registry().unwrap();
        let mut model = registry.instantiate("CompoundGrowth").unwrap();
        model
            .set_field("LL", crate::core::types::FieldValue::Periods(2))
            .unwrap();
        let err = model.compute().unwrap_err();
        assert!(err.to_string().contains("field 'BASE' is unset"));
    }
}
