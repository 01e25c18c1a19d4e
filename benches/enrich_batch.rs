use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tree_scorer_rust::{load_records, ConservationScorer, LoaderConfig, PipelineConfig};

const SPECIES: [&str; 8] = [
    "x acerifolia", "tomentosa", "hippocastanum", "japonica",
    "pseudoplatanus", "robur", "nigra", "baccata",
];

/// Trees scattered over roughly 3 km x 3 km of central Paris
fn synthetic_records(n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|_| {
            json!({
                "fields": {
                    "arbres_espece": SPECIES[rng.gen_range(0..SPECIES.len())],
                    "arbres_genre": "genus",
                    "com_adresse": format!("PARIS {}E ARRDT", rng.gen_range(1..21)),
                    "arbres_hauteurenm": rng.gen_range(0.0..30.0),
                    "geom_x_y": [rng.gen_range(2.32..2.36), rng.gen_range(48.84..48.87)]
                }
            })
        })
        .collect()
}

fn bench_enrich(c: &mut Criterion) {
    let scorer = ConservationScorer::new(PipelineConfig::default()).unwrap();
    let loader = LoaderConfig::default();
    let mut group = c.benchmark_group("enrich");

    for n in [1_000usize, 10_000, 50_000] {
        let raw = synthetic_records(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &raw, |b, raw| {
            b.iter(|| {
                let loaded = load_records(black_box(raw), &loader);
                scorer.enrich(loaded).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enrich);
criterion_main!(benches);
