use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mariadb_stats_exporter::catalog::{build_catalog, Scope};
use mariadb_stats_exporter::collector::Sample;
use mariadb_stats_exporter::encoding::text::encode;
use mariadb_stats_exporter::registry::MetricFamily;
use mariadb_stats_exporter::StatsRow;

pub fn text(c: &mut Criterion) {
    c.bench_function("encode", |b| {
        let catalog = build_catalog();
        let rows: Vec<StatsRow> = (0..100)
            .map(|i| StatsRow {
                user: format!("user_{}", i),
                total_connections: i as f64,
                busy_time: i as f64 * 0.25,
                bytes_received: 1_000_000.0 + i as f64,
                ..Default::default()
            })
            .collect();

        let families: Vec<MetricFamily> = catalog
            .iter()
            .map(|definition| {
                let samples = match definition.scope() {
                    Scope::Instance => vec![Sample {
                        definition,
                        label_values: vec!["db1".to_string()],
                        value: 1048576.0,
                    }],
                    Scope::PerUser(value) => rows
                        .iter()
                        .map(|row| Sample {
                            definition,
                            label_values: vec![row.user.clone(), "db1".to_string()],
                            value: value(row),
                        })
                        .collect(),
                };
                MetricFamily {
                    definition,
                    samples,
                }
            })
            .collect();

        let mut buffer = String::new();

        b.iter(|| {
            encode(&mut buffer, &families).unwrap();
            black_box(&mut buffer);
            buffer.clear();
        });
    });
}

criterion_group!(benches, text);
criterion_main!(benches);
