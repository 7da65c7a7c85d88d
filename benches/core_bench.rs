//! Benchmarks for refscript core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use refscript::core::parser::parse_dataset;
use refscript::core::resolver::candidate_identifiers;
use refscript::core::serializer::{ResultRow, ResultTable};
use refscript::core::types::Value;
use refscript::evaluator::calc::{CalcEvaluator, BUILTINS};
use refscript::evaluator::{EvalLimits, Evaluator};
use refscript::journal::hasher;

fn dataset_text(periods: usize, variables: usize) -> String {
    let mut text = String::from("LATA");
    for p in 0..periods {
        text.push_str(&format!(" {}", 2000 + p));
    }
    text.push('\n');
    for v in 0..variables {
        text.push_str(&format!("VAR{}", v));
        // half-length rows exercise the forward fill
        for p in 0..periods / 2 {
            text.push_str(&format!(" {}.{}", v, p));
        }
        text.push('\n');
    }
    text
}

fn bench_parse_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_dataset");
    for (periods, variables) in [(10, 10), (40, 100), (200, 500)] {
        let text = dataset_text(periods, variables);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{periods}x{variables}")),
            &text,
            |b, text| {
                b.iter(|| {
                    let ds = parse_dataset(black_box(text)).unwrap();
                    black_box(ds);
                });
            },
        );
    }
    group.finish();
}

fn bench_candidate_identifiers(c: &mut Criterion) {
    let mut script = String::new();
    for i in 0..200 {
        script.push_str(&format!(
            "OUT{i} = zeros(LL)\nfor t in 0..LL {{ OUT{i}[t] = GDP[t] * {i} + lag(POP)[t] }}\n"
        ));
    }
    c.bench_function("candidate_identifiers_200_lines", |b| {
        b.iter(|| {
            let ids = candidate_identifiers(black_box(&script), BUILTINS);
            black_box(ids);
        });
    });
}

fn bench_calc_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("calc_eval");
    let script = "SHARE = zeros(LL)\nfor i in 0..LL {\n  SHARE[i] = KI[i] / (KI[i] + KS[i])\n}\nTOTAL = sum(KI + KS)";
    for ll in [10usize, 100, 1000] {
        let mut bindings = IndexMap::new();
        bindings.insert("LL".to_string(), Value::Scalar(ll as f64));
        bindings.insert("KI".to_string(), Value::Series((0..ll).map(|x| x as f64 + 1.0).collect()));
        bindings.insert("KS".to_string(), Value::Series(vec![2.0; ll]));
        group.bench_with_input(BenchmarkId::from_parameter(ll), &bindings, |b, bindings| {
            let mut ev = CalcEvaluator::new(EvalLimits::default());
            b.iter(|| {
                ev.eval(black_box(script), bindings).unwrap();
                black_box(ev.read_variable("TOTAL"));
            });
        });
    }
    group.finish();
}

fn bench_results_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("results_hash");
    for rows in [10, 100, 1000] {
        let table = ResultTable {
            rows: (0..rows)
                .map(|r| ResultRow {
                    name: format!("VAR{r}"),
                    cells: ["1.0", "2.5", "3.75", "4.0", "5.125"]
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                })
                .collect(),
        };
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| black_box(hasher::results_hash(black_box(table))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_dataset,
    bench_candidate_identifiers,
    bench_calc_eval,
    bench_results_hash
);
criterion_main!(benches);
