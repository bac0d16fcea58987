use billtag::{data_loader::parse_export, normalizer::Normalizer};
use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write;
use std::hint::black_box;

const HEADER: &str = "InvoiceID,RecordType,ProductName,UsageType,Operation,AvailabilityZone,UsageStartDate,Cost,ResourceId,user:KEEP,user:PROD\n";

fn create_export(rows: usize) -> String {
    let mut csv = String::from(HEADER);
    for i in 0..rows {
        let owner = if i % 5 == 0 { "alice" } else { "" };
        let _ = writeln!(
            csv,
            "inv-1,LineItem,Amazon Elastic Compute Cloud,BoxUsage:t3.micro,RunInstances,us-east-1a,2024-06-{:02} {:02}:00:00,0.0{},i-{:04},{owner},yes",
            (i % 30) + 1,
            i % 24,
            (i % 9) + 1,
            i % 300,
        );
    }
    csv.push_str("inv-1,InvoiceTotal,,,,,,123.45,,,\n");
    csv
}

fn benchmark_csv_parsing(c: &mut Criterion) {
    let export = create_export(10_000);

    c.bench_function("parse 10k export rows", |b| {
        b.iter(|| parse_export(black_box(export.as_bytes())).unwrap())
    });
}

fn benchmark_normalization(c: &mut Criterion) {
    let rows = parse_export(create_export(10_000).as_bytes()).unwrap();
    let normalizer = Normalizer::new();

    let mut group = c.benchmark_group("normalize");
    group.bench_function("sequential", |b| {
        b.iter(|| normalizer.normalize(black_box(rows.clone())).unwrap())
    });
    group.bench_function("parallel", |b| {
        b.iter(|| normalizer.normalize_parallel(black_box(rows.clone())).unwrap())
    });
    group.finish();
}

criterion_group!(benches, benchmark_csv_parsing, benchmark_normalization);
criterion_main!(benches);
