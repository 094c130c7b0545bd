use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ivpdose::prelude::*;

fn robertson(_t: f64, y: &[f64], _p: &[f64]) -> Vec<f64> {
    let r0 = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
    let r2 = 3.0e7 * y[1] * y[1];
    vec![r0, -r0 - r2, r2]
}

fn decay(_t: f64, y: &[f64], p: &[f64]) -> Vec<f64> {
    vec![-p[0] * y[0]]
}

fn bench_robertson(c: &mut Criterion) {
    let mut times = vec![0.0];
    times.extend((0..12).map(|k| 0.4 * 10f64.powi(k)));
    let options = Options::default();

    c.bench_function("robertson_to_4e10", |b| {
        b.iter(|| integrate(&times, black_box(&[1.0, 0.0, 0.0]), &robertson, &[], &options).unwrap())
    });
}

fn bench_daily_doses(c: &mut Criterion) {
    let times: Vec<f64> = (0..=240).map(|h| h as f64).collect();
    let events: Vec<EventRecord> = (0..10).map(|d| EventRecord::new(1, 24.0 * d as f64, 100.0)).collect();
    let options = Options::builder().rtol(1e-6).atol(1e-8).build();

    c.bench_function("ten_daily_doses", |b| {
        b.iter(|| {
            integrate_with_events(&times, black_box(&[0.0]), &decay, &[0.1], &events, &options).unwrap()
        })
    });
}

fn bench_sensitivities(c: &mut Criterion) {
    let times: Vec<f64> = (0..=20).map(|i| i as f64).collect();
    let options = Options::builder().rtol(1e-6).atol(1e-8).build();

    let mut group = c.benchmark_group("decay_sensitivities");
    for method in ["STG", "SIM"] {
        group.bench_function(method, |b| {
            b.iter(|| {
                integrate_with_sensitivities(&times, black_box(&[1.0]), &decay, &[0.1], &options, method, true)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_robertson, bench_daily_doses, bench_sensitivities);
criterion_main!(benches);
