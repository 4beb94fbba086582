//! Benchmarks for feature aggregation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geotally_algorithms::vector::{
    aggregate_features, aggregate_features_parallel, AggregationParams,
};
use geotally_core::{Feature, FeatureCollection, PropertyValue};
use serde_json::json;

/// Grid of unit squares with a few nested attributes per feature
fn create_collection(size: usize) -> FeatureCollection {
    let side = (size as f64).sqrt().ceil() as usize;
    (0..size)
        .map(|i| {
            let x = (i % side) as f64;
            let y = (i / side) as f64;
            let mut f = Feature::new(json!({
                "type": "Polygon",
                "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
            }));
            f.set_property("id", i as i64);
            f.set_property("class", ["road", "building", "water"][i % 3]);
            f.set_property(
                "extra",
                PropertyValue::from(json!({"height": (i % 17) as f64 * 1.5, "tags": ["a", "b"]})),
            );
            f
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector/aggregate");
    let params = AggregationParams::new()
        .exclude(&["id"])
        .combination(&["class", "extra.height"])
        .shard_size(256);
    for size in [100, 1_000, 5_000] {
        let fc = create_collection(size);
        group.bench_with_input(BenchmarkId::new("sequential", size), &size, |b, _| {
            b.iter(|| aggregate_features(black_box(&fc), &params).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("sharded", size), &size, |b, _| {
            b.iter(|| aggregate_features_parallel(black_box(&fc), &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
