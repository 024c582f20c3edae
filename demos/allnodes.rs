use kdcount::{BuildOptions, KdTree, PointSet, count_pairs, enumerate_nodes};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Usage: allnodes [FILE DIM [THRESHOLD]]
// Without a file, 100k random points in the unit cube are indexed instead.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Spawn the pool up front so thread creation stays out of the timings.
    rayon::ThreadPoolBuilder::new().build_global()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let points = match args.as_slice() {
        [path, dim, ..] => PointSet::open(path, dim.parse()?)?,
        _ => PointSet::random(100_000, 3, &mut StdRng::seed_from_u64(42))?,
    };
    let threshold: f64 = match args.get(2) {
        Some(t) => t.parse()?,
        None => 0.01,
    };
    info!(count = points.len(), dim = points.dim(), "loaded points");

    let start = Instant::now();
    let tree = KdTree::build(&points, &BuildOptions::default())?;
    info!(elapsed = ?start.elapsed(), nodes = tree.node_count(), depth = tree.depth(), "built tree");

    let nodes = enumerate_nodes(&tree);
    let leaves = nodes.iter().filter(|n| n.is_leaf()).count();
    for node in nodes.iter().take(7) {
        println!(
            "node {:>3} depth {} count {:>7} axis {:?} split {:?}",
            node.id(),
            node.depth(),
            node.count(),
            node.split_axis(),
            node.split_value()
        );
    }
    println!("{} nodes, {} leaves", nodes.len(), leaves);

    let start = Instant::now();
    let pairs = count_pairs(&tree, &tree, threshold)?;
    info!(elapsed = ?start.elapsed(), "counted pairs");
    println!("{} pairs within {}", pairs, threshold);

    Ok(())
}
