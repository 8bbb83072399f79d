use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use weather_pipeline::{batches, MemoryStore, RawRecord, RecordClassifier, WeatherPutter};

fn raw_records(n: usize) -> Vec<RawRecord> {
    const TAGS: [&str; 5] = ["PRCP", "SNOW", "TMIN", "TMAX", "AWND"];
    (0..n)
        .map(|i| RawRecord {
            station: format!("GHCND:US1MD{:06}", i % 300),
            date: format!("2021-10-{:02}T00:00:00", i % 28 + 1),
            datatype: TAGS[i % TAGS.len()].to_string(),
            value: (i % 400) as f64,
            location: Some("Annapolis, MD US".to_string()),
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let records = raw_records(10_000);
    let classifier = RecordClassifier::new();

    c.bench_function("classify_10k", |b| {
        b.iter(|| classifier.classify(black_box(records.clone())))
    });

    c.bench_function("batches_10k", |b| {
        b.iter(|| batches(black_box(records.clone()), 500).count())
    });

    let classified = classifier.classify(records.clone());
    let runtime = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("put_classified_memory", |b| {
        b.to_async(&runtime).iter(|| async {
            let putter = WeatherPutter::new(Arc::new(MemoryStore::new()));
            putter.put_classified(black_box(classified.clone())).await.unwrap()
        })
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
