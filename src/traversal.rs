//! Tree walks: breadth-first enumeration and the pruned dual-tree traversal.
//!
//! The dual-tree walk visits pairs of nodes, one from each tree, and drops every pair
//! whose bounding boxes are further apart than the query threshold. What happens to the
//! surviving point pairs is up to a [`PairVisitor`]; counting, collecting and grouping
//! queries in [`crate::queries`] are all visitors over the same walk.

use crate::error::{Error, Result};
use crate::kdtree::{KdTree, Node, NodeId};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Frontier entries handed to each rayon worker by the parallel walk.
const FRONTIER_PER_THREAD: usize = 8;

/// All nodes of `tree` in breadth-first order, root first.
///
/// The sequence has exactly [`KdTree::node_count`] entries and is identical on every call.
pub fn enumerate_nodes<'a>(tree: &'a KdTree<'_>) -> Vec<Node<'a>> {
    tree.breadth_first().collect()
}

/// Shared flag for stopping a running traversal.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Parameters for the dual-tree traversal.
#[derive(Clone, Debug, Default)]
pub struct TraversalOptions {
    /// Report `(i, i, 0.0)` for every point of a self-query.
    pub include_self_pairs: bool,
    /// Checked once per visited node pair.
    pub cancel: Option<CancelToken>,
}

impl TraversalOptions {
    pub fn with_self_pairs(mut self, include_self_pairs: bool) -> Self {
        self.include_self_pairs = include_self_pairs;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Range of distances between any point of one node and any point of another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceSpan {
    pub min: f64,
    pub max: f64,
}

/// Consumer of the point pairs found by a dual-tree traversal.
///
/// The walk reports each qualifying pair exactly once and never reports a pair further
/// apart than the threshold. The first error returned by the visitor ends the walk and is
/// handed back to the caller unchanged.
///
/// Closures `FnMut(usize, usize, f64) -> Result<(), E>` are visitors.
pub trait PairVisitor {
    type Error: From<Error>;

    /// Called once per point pair within the threshold.
    fn visit(&mut self, a: usize, b: usize, distance: f64) -> Result<(), Self::Error>;

    /// Called when every point pair between `a` and `b` lies within the threshold.
    ///
    /// `same_node` is set when `a` and `b` are the same node of a self-query, in which case
    /// the pairs in question are the unordered pairs inside that node. Returning `true`
    /// means the visitor accounted for all of them and the walk skips the per-pair visits.
    fn visit_nodes(
        &mut self,
        a: Node<'_>,
        b: Node<'_>,
        span: DistanceSpan,
        same_node: bool,
    ) -> Result<bool, Self::Error> {
        let _ = (a, b, span, same_node);
        Ok(false)
    }
}

impl<F, E> PairVisitor for F
where
    F: FnMut(usize, usize, f64) -> Result<(), E>,
    E: From<Error>,
{
    type Error = E;

    fn visit(&mut self, a: usize, b: usize, distance: f64) -> Result<(), E> {
        self(a, b, distance)
    }
}

/// Calls `callback(a, b, distance)` for every point pair within `threshold`.
///
/// When `a` and `b` are the same tree each unordered pair is reported once as `(i, j)`
/// with `i < j`, and self pairs are skipped. Otherwise `a` indexes the first tree and `b`
/// the second.
///
/// # Errors
/// * [`Error::DimensionMismatch`] if the trees index points of different dimension.
/// * [`Error::Config`] if `threshold` is negative or NaN.
pub fn traverse<F>(a: &KdTree<'_>, b: &KdTree<'_>, threshold: f64, mut callback: F) -> Result<()>
where
    F: FnMut(usize, usize, f64),
{
    let mut visitor = |i: usize, j: usize, d: f64| -> Result<()> {
        callback(i, j, d);
        Ok(())
    };
    try_traverse(a, b, threshold, &TraversalOptions::default(), &mut visitor)
}

/// Like [`traverse`], with options and a fallible visitor.
pub fn try_traverse<V>(
    a: &KdTree<'_>,
    b: &KdTree<'_>,
    threshold: f64,
    options: &TraversalOptions,
    visitor: &mut V,
) -> Result<(), V::Error>
where
    V: PairVisitor,
{
    let walker = Walker::new(a, b, threshold, options)?;
    walker.walk(0, 0, visitor)?;
    debug!(threshold, self_query = walker.same_tree, "dual-tree traversal finished");
    Ok(())
}

/// Parallel [`try_traverse`] with a thread-safe callback.
///
/// Pairs are reported exactly once, in no particular order.
pub fn par_traverse<F, E>(
    a: &KdTree<'_>,
    b: &KdTree<'_>,
    threshold: f64,
    options: &TraversalOptions,
    callback: F,
) -> Result<(), E>
where
    F: Fn(usize, usize, f64) -> Result<(), E> + Sync,
    E: From<Error> + Send,
{
    let callback = &callback;
    par_traverse_with(a, b, threshold, options, move || {
        move |i: usize, j: usize, d: f64| callback(i, j, d)
    })?;
    Ok(())
}

/// Parallel traversal with one visitor per rayon task.
///
/// The top of the node-pair recursion is expanded into a frontier which is then walked on
/// the rayon pool. Each task folds into its own visitor from `make_visitor`; the visitors
/// are returned for the caller to merge.
pub fn par_traverse_with<V, M>(
    a: &KdTree<'_>,
    b: &KdTree<'_>,
    threshold: f64,
    options: &TraversalOptions,
    make_visitor: M,
) -> Result<Vec<V>, V::Error>
where
    V: PairVisitor + Send,
    V::Error: Send,
    M: Fn() -> V + Sync + Send,
{
    let walker = Walker::new(a, b, threshold, options)?;
    let frontier = walker.frontier(rayon::current_num_threads() * FRONTIER_PER_THREAD);
    trace!(tasks = frontier.len(), "parallel dual-tree fan-out");

    let visitors = frontier
        .into_par_iter()
        .try_fold(&make_visitor, |mut visitor, (x, y)| {
            walker.walk(x, y, &mut visitor)?;
            Ok::<V, V::Error>(visitor)
        })
        .collect::<Result<Vec<V>, V::Error>>()?;

    debug!(threshold, self_query = walker.same_tree, "parallel dual-tree traversal finished");
    Ok(visitors)
}

pub(crate) fn check_threshold(threshold: f64) -> Result<()> {
    if threshold.is_nan() || threshold < 0.0 {
        return Err(Error::Config(format!("distance threshold must be a non-negative number, got {threshold}")));
    }
    Ok(())
}

/// Read-only state of one dual-tree traversal, shared by all of its tasks.
struct Walker<'a> {
    a: &'a KdTree<'a>,
    b: &'a KdTree<'a>,
    threshold_sq: f64,
    same_tree: bool,
    include_self_pairs: bool,
    cancel: Option<&'a CancelToken>,
}

impl<'a> Walker<'a> {
    fn new(a: &'a KdTree<'a>, b: &'a KdTree<'a>, threshold: f64, options: &'a TraversalOptions) -> Result<Self> {
        if a.dim() != b.dim() {
            return Err(Error::DimensionMismatch { left: a.dim(), right: b.dim() });
        }
        check_threshold(threshold)?;
        Ok(Self {
            a,
            b,
            threshold_sq: threshold * threshold,
            same_tree: std::ptr::eq(a, b),
            include_self_pairs: options.include_self_pairs,
            cancel: options.cancel.as_ref(),
        })
    }

    fn is_pruned(&self, x: NodeId, y: NodeId) -> bool {
        self.a.box_ref(x).min_distance_sq(&self.b.box_ref(y)) > self.threshold_sq
    }

    /// Node pairs to descend into from `(x, y)`; empty for a pair of leaves.
    ///
    /// A node paired with itself expands to `(l, l), (l, g), (g, g)` so that no unordered
    /// pair of a self-query is produced twice.
    fn child_pairs(&self, x: NodeId, y: NodeId) -> ([(NodeId, NodeId); 4], usize) {
        let mut pairs = [(0, 0); 4];
        let n = match (self.a.children(x), self.b.children(y)) {
            (None, None) => 0,
            (Some([xl, xg]), None) => {
                pairs[..2].copy_from_slice(&[(xl, y), (xg, y)]);
                2
            }
            (None, Some([yl, yg])) => {
                pairs[..2].copy_from_slice(&[(x, yl), (x, yg)]);
                2
            }
            (Some([xl, xg]), Some(_)) if self.same_tree && x == y => {
                pairs[..3].copy_from_slice(&[(xl, xl), (xl, xg), (xg, xg)]);
                3
            }
            (Some([xl, xg]), Some([yl, yg])) => {
                pairs = [(xl, yl), (xl, yg), (xg, yl), (xg, yg)];
                4
            }
        };
        (pairs, n)
    }

    fn walk<V: PairVisitor>(&self, x: NodeId, y: NodeId, visitor: &mut V) -> Result<(), V::Error> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled.into());
        }

        let bx = self.a.box_ref(x);
        let by = self.b.box_ref(y);
        let min_sq = bx.min_distance_sq(&by);
        if min_sq > self.threshold_sq {
            return Ok(());
        }

        let same_node = self.same_tree && x == y;
        let max_sq = bx.max_distance_sq(&by);
        if max_sq <= self.threshold_sq {
            let span = DistanceSpan { min: min_sq.sqrt(), max: max_sq.sqrt() };
            if visitor.visit_nodes(self.a.node_ref(x), self.b.node_ref(y), span, same_node)? {
                return Ok(());
            }
        }

        let (pairs, n) = self.child_pairs(x, y);
        if n == 0 {
            return self.visit_leaves(x, y, same_node, visitor);
        }
        for &(cx, cy) in &pairs[..n] {
            self.walk(cx, cy, visitor)?;
        }
        Ok(())
    }

    fn visit_leaves<V: PairVisitor>(&self, x: NodeId, y: NodeId, same_node: bool, visitor: &mut V) -> Result<(), V::Error> {
        let pa = self.a.points();
        let pb = self.b.points();
        let xs = self.a.range(x);

        if same_node {
            for (p, &i) in xs.iter().enumerate() {
                if self.include_self_pairs {
                    visitor.visit(i, i, 0.0)?;
                }
                for &j in &xs[p + 1..] {
                    let d2 = pa.distance_sq(i, pa, j);
                    if d2 <= self.threshold_sq {
                        visitor.visit(i.min(j), i.max(j), d2.sqrt())?;
                    }
                }
            }
            return Ok(());
        }

        for &i in xs {
            for &j in self.b.range(y) {
                let d2 = pa.distance_sq(i, pb, j);
                if d2 > self.threshold_sq {
                    continue;
                }
                if self.same_tree {
                    visitor.visit(i.min(j), i.max(j), d2.sqrt())?;
                } else {
                    visitor.visit(i, j, d2.sqrt())?;
                }
            }
        }
        Ok(())
    }

    /// Expands node pairs level by level until there are at least `target` of them or only
    /// leaf pairs remain. Pruned pairs are dropped along the way.
    fn frontier(&self, target: usize) -> Vec<(NodeId, NodeId)> {
        let mut pairs = vec![(0, 0)];
        loop {
            if pairs.len() >= target {
                break;
            }
            let mut next = Vec::with_capacity(pairs.len() * 4);
            let mut expanded = false;
            for &(x, y) in &pairs {
                if self.is_pruned(x, y) {
                    continue;
                }
                let (children, n) = self.child_pairs(x, y);
                if n == 0 {
                    next.push((x, y));
                } else {
                    next.extend_from_slice(&children[..n]);
                    expanded = true;
                }
            }
            pairs = next;
            if !expanded {
                break;
            }
        }
        pairs
    }
}
