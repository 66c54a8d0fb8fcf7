//! Prediction throughput benchmark
//!
//! Measures the dense-to-sparse conversion plus single-sample predict loop
//! that dominates batch inference.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array1, Array2};
use ndsvm::{predict, train, KernelType, SvmConfig};

fn training_data(n: usize, dim: usize) -> (Array2<f64>, Array1<f64>) {
    let mut data = Vec::with_capacity(n * dim);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        for j in 0..dim {
            data.push(sign * (1.0 + 0.01 * ((i + j) % 7) as f64));
        }
        labels.push(sign);
    }
    (
        Array2::from_shape_vec((n, dim), data).unwrap(),
        Array1::from(labels),
    )
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = training_data(200, 20);
    let config = SvmConfig {
        kernel_type: KernelType::Rbf,
        gamma: 0.05,
        ..Default::default()
    };
    let record = train(x.view().into_dyn(), y.view().into_dyn(), &config).unwrap();

    c.bench_function("predict_batch_200x20", |b| {
        b.iter(|| {
            let preds = predict(black_box(x.view().into_dyn()), &config, &record).unwrap();
            black_box(preds)
        })
    });
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
