//! Proximity queries built on the dual-tree traversal.

use crate::error::{Error, Result};
use crate::kdtree::{KdTree, Node};
use crate::traversal::{self, DistanceSpan, PairVisitor, TraversalOptions};

/// A point pair reported by [`pairs_within`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pair {
    pub a: usize,
    pub b: usize,
    pub distance: f64,
}

/// Number of point pairs between two nodes, see [`PairVisitor::visit_nodes`].
fn pairs_between(a: Node<'_>, b: Node<'_>, same_node: bool, include_self_pairs: bool) -> u64 {
    if same_node {
        let n = a.count() as u64;
        let self_pairs = if include_self_pairs { n } else { 0 };
        n * (n - 1) / 2 + self_pairs
    } else {
        a.count() as u64 * b.count() as u64
    }
}

struct PairCounter {
    count: u64,
    include_self_pairs: bool,
}

impl PairVisitor for PairCounter {
    type Error = Error;

    fn visit(&mut self, _a: usize, _b: usize, _distance: f64) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn visit_nodes(&mut self, a: Node<'_>, b: Node<'_>, _span: DistanceSpan, same_node: bool) -> Result<bool> {
        self.count += pairs_between(a, b, same_node, self.include_self_pairs);
        Ok(true)
    }
}

/// Number of point pairs within `threshold`.
///
/// Node pairs that lie entirely within the threshold are counted without visiting
/// their points.
pub fn count_pairs(a: &KdTree<'_>, b: &KdTree<'_>, threshold: f64) -> Result<u64> {
    count_pairs_with(a, b, threshold, &TraversalOptions::default())
}

pub fn count_pairs_with(a: &KdTree<'_>, b: &KdTree<'_>, threshold: f64, options: &TraversalOptions) -> Result<u64> {
    let mut counter = PairCounter { count: 0, include_self_pairs: options.include_self_pairs };
    traversal::try_traverse(a, b, threshold, options, &mut counter)?;
    Ok(counter.count)
}

/// [`count_pairs_with`] on the rayon pool.
pub fn par_count_pairs(a: &KdTree<'_>, b: &KdTree<'_>, threshold: f64, options: &TraversalOptions) -> Result<u64> {
    let counters = traversal::par_traverse_with(a, b, threshold, options, || PairCounter {
        count: 0,
        include_self_pairs: options.include_self_pairs,
    })?;
    Ok(counters.iter().map(|c| c.count).sum())
}

struct BinnedCounter<'e> {
    edges: &'e [f64],
    hist: Vec<u64>,
    include_self_pairs: bool,
}

impl BinnedCounter<'_> {
    /// First edge at or above `distance`.
    fn bin(&self, distance: f64) -> usize {
        self.edges.partition_point(|&e| e < distance)
    }
}

impl PairVisitor for BinnedCounter<'_> {
    type Error = Error;

    fn visit(&mut self, _a: usize, _b: usize, distance: f64) -> Result<()> {
        let k = self.bin(distance);
        if k < self.hist.len() {
            self.hist[k] += 1;
        }
        Ok(())
    }

    fn visit_nodes(&mut self, a: Node<'_>, b: Node<'_>, span: DistanceSpan, same_node: bool) -> Result<bool> {
        let k = self.bin(span.min);
        if k != self.bin(span.max) || k >= self.hist.len() {
            return Ok(false);
        }
        self.hist[k] += pairs_between(a, b, same_node, self.include_self_pairs);
        Ok(true)
    }
}

/// Cumulative pair counts: entry `k` is the number of pairs with distance `<= edges[k]`.
///
/// `edges` must be non-empty, non-negative and sorted in non-decreasing order.
pub fn count_pairs_binned(a: &KdTree<'_>, b: &KdTree<'_>, edges: &[f64]) -> Result<Vec<u64>> {
    count_pairs_binned_with(a, b, edges, &TraversalOptions::default())
}

pub fn count_pairs_binned_with(
    a: &KdTree<'_>,
    b: &KdTree<'_>,
    edges: &[f64],
    options: &TraversalOptions,
) -> Result<Vec<u64>> {
    let Some(&max_edge) = edges.last() else {
        return Err(Error::Config("at least one bin edge is required".into()));
    };
    if edges.iter().any(|e| e.is_nan() || *e < 0.0) || edges.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::Config("bin edges must be non-negative and sorted".into()));
    }

    let mut counter = BinnedCounter {
        edges,
        hist: vec![0; edges.len()],
        include_self_pairs: options.include_self_pairs,
    };
    traversal::try_traverse(a, b, max_edge, options, &mut counter)?;

    let mut total = 0;
    Ok(counter
        .hist
        .into_iter()
        .map(|n| {
            total += n;
            total
        })
        .collect())
}

struct PairCollector(Vec<Pair>);

impl PairVisitor for PairCollector {
    type Error = Error;

    fn visit(&mut self, a: usize, b: usize, distance: f64) -> Result<()> {
        self.0.push(Pair { a, b, distance });
        Ok(())
    }
}

/// All point pairs within `threshold`, sorted by `(a, b)`.
pub fn pairs_within(a: &KdTree<'_>, b: &KdTree<'_>, threshold: f64) -> Result<Vec<Pair>> {
    let mut collector = PairCollector(Vec::new());
    traversal::try_traverse(a, b, threshold, &TraversalOptions::default(), &mut collector)?;
    let mut pairs = collector.0;
    pairs.sort_unstable_by_key(|p| (p.a, p.b));
    Ok(pairs)
}

/// [`pairs_within`] on the rayon pool, each task collecting into its own buffer.
pub fn par_pairs_within(a: &KdTree<'_>, b: &KdTree<'_>, threshold: f64) -> Result<Vec<Pair>> {
    let buffers = traversal::par_traverse_with(a, b, threshold, &TraversalOptions::default(), || {
        PairCollector(Vec::new())
    })?;
    let mut pairs: Vec<Pair> = buffers.into_iter().flat_map(|c| c.0).collect();
    pairs.sort_unstable_by_key(|p| (p.a, p.b));
    Ok(pairs)
}

/// Union-find over point indices with path halving.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(count: usize) -> Self {
        Self { parent: (0..count).collect(), rank: vec![0; count] }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Dense group labels, numbered in order of each group's lowest point index.
    fn labels(mut self) -> Vec<usize> {
        let count = self.parent.len();
        let mut label_of_root = vec![usize::MAX; count];
        let mut next = 0;
        (0..count)
            .map(|i| {
                let root = self.find(i);
                if label_of_root[root] == usize::MAX {
                    label_of_root[root] = next;
                    next += 1;
                }
                label_of_root[root]
            })
            .collect()
    }
}

impl PairVisitor for DisjointSet {
    type Error = Error;

    fn visit(&mut self, a: usize, b: usize, _distance: f64) -> Result<()> {
        self.union(a, b);
        Ok(())
    }

    fn visit_nodes(&mut self, a: Node<'_>, b: Node<'_>, _span: DistanceSpan, _same_node: bool) -> Result<bool> {
        // Everything in both nodes is linked, so chaining them to one point is enough.
        let first = a.point_indices()[0];
        for &i in a.point_indices().iter().chain(b.point_indices()) {
            self.union(first, i);
        }
        Ok(true)
    }
}

/// Friends-of-friends groups: points closer than `linking_length` share a group, and so do
/// their friends, transitively.
///
/// Returns one label per point. Labels are dense and numbered in order of each group's
/// lowest point index, so point 0 is always in group 0.
pub fn friends_of_friends(tree: &KdTree<'_>, linking_length: f64) -> Result<Vec<usize>> {
    let mut groups = DisjointSet::new(tree.points().len());
    traversal::try_traverse(tree, tree, linking_length, &TraversalOptions::default(), &mut groups)?;
    Ok(groups.labels())
}
