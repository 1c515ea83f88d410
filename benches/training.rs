use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use model_serve::training::{build_model, fit, ModelKind};
use ndarray::{Array1, Array2};
use rand::prelude::*;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = rand::thread_rng();
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // Target as sum of features + noise
    let y = x
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();

    (x, y)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for kind in ModelKind::ALL {
        for n_rows in [1000, 5000].iter() {
            let data = create_regression_data(*n_rows, 10);

            group.bench_with_input(
                BenchmarkId::new(kind.as_str(), n_rows),
                &data,
                |b, (x, y)| {
                    b.iter(|| {
                        let mut model = build_model(kind, None).unwrap();
                        fit(&mut model, black_box(x), black_box(y)).unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (train_x, train_y) = create_regression_data(5000, 10);

    for kind in ModelKind::ALL {
        // Train model once
        let mut model = build_model(kind, None).unwrap();
        fit(&mut model, &train_x, &train_y).unwrap();

        for n_rows in [100, 1000, 10000].iter() {
            let (x, _) = create_regression_data(*n_rows, 10);

            group.bench_with_input(BenchmarkId::new(kind.as_str(), n_rows), &x, |b, x| {
                b.iter(|| model.predict(black_box(x)).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
