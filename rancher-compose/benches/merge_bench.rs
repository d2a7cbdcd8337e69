use std::fmt::Write as _;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use rancher_compose::config::{ConfigMerger, RawService, ServiceConfigs};
use rancher_compose::convert::ports::collect_ports;
use rancher_compose::{Merger, Project, Validator};

const SERVICE_COUNTS: &[usize] = &[1, 10, 50];

fn base_layer(services: usize) -> String {
    let mut yaml = String::from("version: '2'\nservices:\n");
    for i in 0..services {
        let _ = write!(
            yaml,
            "  svc{i}:\n    image: app:{i}\n    ports: ['{}:80']\n    environment: [A=1, B=2]\n    dns: [1.1.1.1]\n",
            8000 + i
        );
    }
    yaml
}

fn override_layer(services: usize) -> String {
    let mut yaml = String::from("version: '2'\nservices:\n");
    for i in 0..services {
        let _ = write!(
            yaml,
            "  svc{i}:\n    scale: 2\n    environment: [B=3]\n    dns: [8.8.8.8]\n    labels: {{tier: web}}\n"
        );
    }
    yaml
}

fn bench_two_layer_merge(c: &mut Criterion) {
    let validator = Arc::new(Validator::new().expect("embedded schemas compile"));
    let mut group = c.benchmark_group("two_layer_merge");

    for &count in SERVICE_COUNTS {
        let base = base_layer(count);
        let layer = override_layer(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter_batched(
                || Project::new("bench", Merger::new(Arc::clone(&validator))),
                |mut project| {
                    project
                        .parse_bytes("docker-compose.yml", black_box(base.as_bytes()))
                        .expect("base layer merges");
                    project
                        .parse_bytes("rancher-compose.yml", black_box(layer.as_bytes()))
                        .expect("override layer merges");
                    project
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let validator = Arc::new(Validator::new().expect("embedded schemas compile"));
    let merger = Merger::new(validator);
    let base = base_layer(50);

    c.bench_function("merge_single_layer_50", |b| {
        b.iter(|| {
            merger
                .merge(&ServiceConfigs::new(), "docker-compose.yml", black_box(base.as_bytes()))
                .expect("layer merges")
        });
    });
}

fn bench_raw_merge(c: &mut Criterion) {
    let base: RawService = serde_yaml::from_str(
        "image: nginx\nports: ['80']\nenvironment: {A: '1'}\nlabels: {a: b}\ndns: [1.1.1.1]\n",
    )
    .expect("valid service");
    let layer: RawService =
        serde_yaml::from_str("environment: {B: '2'}\nlabels: {c: d}\ndns: [8.8.8.8]\nlinks: [db]\n")
            .expect("valid service");

    c.bench_function("merge_service", |b| {
        b.iter(|| ConfigMerger::merge_service(black_box(base.clone()), black_box(layer.clone())));
    });
}

fn bench_ports(c: &mut Criterion) {
    let ports: Vec<String> = (0..100).map(|i| format!("{}:{}", 9000 + i, 80 + i)).collect();
    let expose: Vec<String> = vec!["3000-3010".to_string()];

    c.bench_function("collect_ports_100", |b| {
        b.iter(|| collect_ports(black_box(&ports), black_box(&expose)).expect("valid ports"));
    });
}

criterion_group!(
    benches,
    bench_two_layer_merge,
    bench_validation,
    bench_raw_merge,
    bench_ports
);
criterion_main!(benches);
