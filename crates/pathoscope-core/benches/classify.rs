//! Benchmarks for the Pathoscope classification path.
//!
//! Run with: cargo bench -p pathoscope-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::DynamicImage;
use pathoscope_core::classify::{scorer, DiseaseScorer, TextBank};
use pathoscope_core::math::l2_normalize;

const EMBEDDING_DIM: usize = 512;

/// Deterministic pseudo-random unit vector.
fn unit_vector(seed: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..EMBEDDING_DIM)
        .map(|i| (((seed * 31 + i * 17) % 97) as f32 - 48.0) / 48.0)
        .collect();
    l2_normalize(&v)
}

fn text_bank(entries: usize) -> TextBank {
    let rows = (0..entries).map(unit_vector).collect();
    TextBank::from_rows(rows, "bench").unwrap()
}

fn benchmark_rank(c: &mut Criterion) {
    let image = unit_vector(10_000);
    let scorer = DiseaseScorer::new(5);

    for entries in [50, 1_000] {
        let bank = text_bank(entries);
        c.bench_function(&format!("rank_top5_{entries}_diseases"), |b| {
            b.iter(|| {
                let _ = scorer.rank(black_box(&image), black_box(&bank));
            })
        });
    }
}

fn benchmark_top_k(c: &mut Criterion) {
    let probabilities: Vec<f64> = (0..1_000).map(|i| ((i * 7919) % 1000) as f64 / 1000.0).collect();

    c.bench_function("top_k_1000", |b| {
        b.iter(|| {
            let _ = scorer::top_k(black_box(&probabilities), 5);
        })
    });
}

fn benchmark_preprocess(c: &mut Criterion) {
    let img = DynamicImage::new_rgb8(1920, 1080);

    c.bench_function("preprocess_224px", |b| {
        b.iter(|| {
            let _ = pathoscope_core::embedding::preprocess(black_box(&img), 224);
        })
    });
}

criterion_group!(benches, benchmark_rank, benchmark_top_k, benchmark_preprocess);
criterion_main!(benches);
