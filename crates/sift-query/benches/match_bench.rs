use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use sift_query::{default_registry, CompareOp, Matcher, Query, QueryConfig, Registry};

fn create_items(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let prefix = if i % 2 == 0 { "test" } else { "other" };
            json!({"id": i, "name": format!("{prefix}_item_{i}")})
        })
        .collect()
}

fn bench_default_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("default_queries");
    let registry = default_registry(&QueryConfig::default()).unwrap();

    for count in [100, 1_000, 10_000] {
        let items = create_items(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("id", count), &items, |b, items| {
            let query = Query::Int(count as i64 / 2);
            b.iter(|| registry.match_all(black_box(&query), items).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("pattern", count), &items, |b, items| {
            let query = Query::from("test_*");
            b.iter(|| registry.match_all(black_box(&query), items).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("or", count), &items, |b, items| {
            let query = Query::from("[1, 2, 'test_item_4']");
            b.iter(|| registry.match_all(black_box(&query), items).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("and", count), &items, |b, items| {
            let query = Query::from("('test_*', 4)");
            b.iter(|| registry.match_all(black_box(&query), items).unwrap())
        });
    }

    group.finish();
}

fn bench_expression_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_queries");
    let registry = default_registry(&QueryConfig {
        allow_expressions: true,
        ..QueryConfig::default()
    })
    .unwrap();

    let items = create_items(1_000);
    group.throughput(Throughput::Elements(items.len() as u64));
    group.bench_function("startswith", |b| {
        let query = Query::from(r#"?x["name"].startswith("test") && x["id"] > 10"#);
        b.iter(|| registry.match_all(black_box(&query), &items).unwrap())
    });

    group.finish();
}

fn bench_scalar_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalar_cache");
    // Few distinct values, so nearly every apply is a cache hit
    let items: Vec<Value> = (0..10_000).map(|i| json!(i % 16)).collect();

    let registry = Registry::new();
    registry.push(Matcher::compare("ge", CompareOp::Ge).build().unwrap());

    group.throughput(Throughput::Elements(items.len() as u64));
    group.bench_function("repeated_scalars", |b| {
        let query = Query::Int(8);
        b.iter(|| registry.match_all(black_box(&query), &items).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_default_queries,
    bench_expression_queries,
    bench_scalar_cache
);
criterion_main!(benches);
