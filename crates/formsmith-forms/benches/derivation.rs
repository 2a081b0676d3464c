//! Derived field recompute benchmark
//!
//! Measures one field change against forms of growing size, where every
//! other field is derived from the first.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formsmith_forms::{
    formula, DerivationEngine, FieldId, FieldInput, FieldType, FormDraft, FormValues, SystemClock,
};
use serde_json::json;

fn formula_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("formula");

    group.bench_function("arithmetic", |b| {
        b.iter(|| formula::evaluate(black_box("Math.round((12.5 * 4 + 3) / 7)"), &SystemClock))
    });

    group.bench_function("age_from_date", |b| {
        b.iter(|| {
            formula::evaluate(
                black_box("Math.floor((new Date() - new Date('1990-05-01')) / (1000*60*60*24*365.25))"),
                &SystemClock,
            )
        })
    });

    group.finish();
}

fn fan_out_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("derivation_fan_out");

    for size in [10usize, 50, 200].iter() {
        let mut draft = FormDraft::new();
        let base = draft
            .add_or_update_field(FieldInput::new(FieldType::Number, "Base", "base"))
            .unwrap();
        for i in 0..*size {
            draft
                .add_or_update_field(
                    FieldInput::new(FieldType::Number, format!("D{i}"), format!("d{i}"))
                        .derived(vec![base.id.clone()], format!("base * {i} + 1")),
                )
                .unwrap();
        }
        let fields = draft.fields().to_vec();
        let engine = DerivationEngine::new();
        let changed: FieldId = base.id.clone();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                engine.on_field_change(&changed, black_box(json!(7)), &fields, FormValues::new())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, formula_benchmark, fan_out_benchmark);
criterion_main!(benches);
