use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use scenechange_3d::{
    distortion::apply_distortion,
    frustum,
    projection::{project_points, project_points_undistorted},
};

const K: [[f64; 4]; 3] = [
    [500.0, 0.0, 320.0, 0.0],
    [0.0, 500.0, 240.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

fn make_points(num_points: usize) -> Vec<[f64; 3]> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 * 1e-3;
            [t.sin(), t.cos(), 2.0 + (t * 0.5).sin().abs()]
        })
        .collect()
}

fn bench_project_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("project_points");
    let d = [0.1, -0.05, 0.001, 0.002, 0.01];

    for num_points in [1000, 10000, 100000, 500000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);
        let points = make_points(*num_points);

        group.bench_with_input(
            BenchmarkId::new("project_points", &parameter_string),
            &points,
            |b, points| {
                b.iter(|| black_box(project_points(points, &K, &d, 640, 480)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("project_points_undistorted", &parameter_string),
            &points,
            |b, points| {
                b.iter(|| black_box(project_points_undistorted(points, &K, 640, 480)));
            },
        );
    }
}

fn bench_frustum(c: &mut Criterion) {
    let mut group = c.benchmark_group("frustum");

    for num_points in [1000, 100000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let points = make_points(*num_points);

        group.bench_with_input(
            BenchmarkId::new("cull", num_points),
            &points,
            |b, points| {
                b.iter(|| black_box(frustum::cull(points, 60.0, 45.0)));
            },
        );
    }
}

fn bench_distortion(c: &mut Criterion) {
    let points = (0..10000)
        .map(|i| [(i % 640) as f64, (i / 640) as f64])
        .collect::<Vec<_>>();
    let d = [0.1, -0.05, 0.001, 0.002, 0.01];

    c.bench_function("apply_distortion", |b| {
        b.iter(|| black_box(apply_distortion(&points, &K, &d)));
    });
}

criterion_group!(benches, bench_project_points, bench_frustum, bench_distortion);
criterion_main!(benches);
