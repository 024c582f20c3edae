use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kdcount::{BuildOptions, KdTree, PointSet};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SIZES: [usize; 5] = [100, 1000, 10_000, 100_000, 1_000_000];

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for &size in &SIZES {
        let mut rng = StdRng::seed_from_u64(size as u64);
        let points = PointSet::random(size, 3, &mut rng).unwrap();

        group.bench_with_input(BenchmarkId::new("serial", size), &points, |b, points| {
            let options = BuildOptions::default().serial();
            b.iter(|| KdTree::build(points, &options).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), &points, |b, points| {
            let options = BuildOptions::default();
            b.iter(|| KdTree::build(points, &options).unwrap())
        });
    }
    group.finish();
}

fn benchmark_leaf_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_size");
    group.sample_size(10);

    let mut rng = StdRng::seed_from_u64(1);
    let points = PointSet::random(100_000, 3, &mut rng).unwrap();

    for &leaf in &[1, 4, 16, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(leaf), &leaf, |b, &leaf| {
            let options = BuildOptions::default().with_min_leaf_size(leaf);
            b.iter(|| KdTree::build(&points, &options).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_build, benchmark_leaf_size);
criterion_main!(benches);
