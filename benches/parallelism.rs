use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kdcount::{BuildOptions, KdTree, PointSet, TraversalOptions, par_count_pairs};
use rand::SeedableRng;
use rand::rngs::StdRng;

const N_POINTS: usize = 1_000_000;

fn benchmark_parallelism(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let points = PointSet::random(N_POINTS, 3, &mut rng).unwrap();

    let mut group = c.benchmark_group(format!("parallelism_{}k", N_POINTS / 1000));
    group.sample_size(10);

    let max_cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(8);
    let mut cores_list = Vec::new();
    let mut cores = 1;
    while cores <= max_cores {
        cores_list.push(cores);
        cores *= 2;
    }
    if cores_list.last().map_or(false, |&last| last < max_cores) {
        cores_list.push(max_cores);
    }

    let options = TraversalOptions::default();
    for &num_threads in &cores_list {
        // Create a thread pool for this specific number of threads
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::new("build", num_threads), &num_threads, |b, &_s| {
            b.iter(|| pool.install(|| KdTree::build(&points, &BuildOptions::default()).unwrap()))
        });

        let tree = pool.install(|| KdTree::build(&points, &BuildOptions::default()).unwrap());
        group.bench_with_input(BenchmarkId::new("count", num_threads), &num_threads, |b, &_s| {
            b.iter(|| pool.install(|| par_count_pairs(&tree, &tree, 0.005, &options).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_parallelism);
criterion_main!(benches);
