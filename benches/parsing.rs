use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mboxcraft::engine::Engine;
use mboxcraft::partition::{DateGranularity, PartitionStrategy, UndatedPolicy};
use mboxcraft::progress::NoProgress;

fn large_archive() -> String {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("simple.mbox");
    let text = std::fs::read_to_string(fixture_path).unwrap();
    (0..200).map(|_| format!("{text}\n")).collect()
}

fn bench_split_messages(c: &mut Criterion) {
    let text = large_archive();
    c.bench_function("split_messages_1000", |b| {
        b.iter(|| mboxcraft::parser::mbox::split_messages(&text).len())
    });
}

fn bench_parse_text(c: &mut Criterion) {
    let text = large_archive();
    let engine = Engine::new();
    c.bench_function("parse_text_1000", |b| {
        b.iter(|| engine.parse_text(&text, &NoProgress).unwrap().messages.len())
    });
}

fn bench_threads_and_partition(c: &mut Criterion) {
    let engine = Engine::new();
    let messages = engine
        .parse_text(&large_archive(), &NoProgress)
        .unwrap()
        .messages;
    let by_month = PartitionStrategy::ByDate {
        granularity: DateGranularity::Month,
        undated: UndatedPolicy::Bucket,
    };

    c.bench_function("detect_threads_1000", |b| {
        b.iter(|| engine.threads(&messages).len())
    });
    c.bench_function("partition_by_month_1000", |b| {
        b.iter(|| engine.partition(&messages, &by_month).unwrap().len())
    });
}

criterion_group!(
    benches,
    bench_split_messages,
    bench_parse_text,
    bench_threads_and_partition
);
criterion_main!(benches);
