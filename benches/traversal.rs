use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kdcount::{BuildOptions, KdTree, PointSet, count_pairs, count_pairs_binned, friends_of_friends, traverse};
use rand::SeedableRng;
use rand::rngs::StdRng;

const N_POINTS: usize = 100_000;
const THRESHOLDS: [f64; 4] = [0.005, 0.01, 0.02, 0.05];

fn benchmark_traversal(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let points = PointSet::random(N_POINTS, 3, &mut rng).unwrap();
    let tree = KdTree::build(&points, &BuildOptions::default()).unwrap();

    let mut group = c.benchmark_group(format!("traversal_{}k", N_POINTS / 1000));
    group.sample_size(10);

    for &threshold in &THRESHOLDS {
        // Per-pair callback against wholesale counting of accepted node pairs.
        group.bench_with_input(BenchmarkId::new("callback", threshold), &threshold, |b, &t| {
            b.iter(|| {
                let mut count = 0u64;
                traverse(&tree, &tree, t, |_, _, _| count += 1).unwrap();
                count
            })
        });

        group.bench_with_input(BenchmarkId::new("count", threshold), &threshold, |b, &t| {
            b.iter(|| count_pairs(&tree, &tree, t).unwrap())
        });
    }

    group.bench_function("binned", |b| {
        b.iter(|| count_pairs_binned(&tree, &tree, &THRESHOLDS).unwrap())
    });

    group.bench_function("fof", |b| b.iter(|| friends_of_friends(&tree, 0.01).unwrap()));

    group.finish();
}

criterion_group!(benches, benchmark_traversal);
criterion_main!(benches);
