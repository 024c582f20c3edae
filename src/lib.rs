//! # kdcount
//!
//! `kdcount` is a Rust library for indexing point clouds with balanced k-d trees and
//! answering proximity questions on them, designed to be used in Rust as well as compiled
//! to WebAssembly (WASM).
//!
//! ## Features
//!
//! - **Raw input**: Points are read from flat little-endian `f32` records without a header.
//! - **Balanced trees**: Exact median splits on the widest axis keep the depth at
//!   `ceil(log2(N / min_leaf_size))` for any input, however skewed.
//! - **Compact layout**: Nodes live in one arena and index into a single permutation of the
//!   points; boxes are stored flat next to them.
//! - **Dual-tree queries**: A pruned walk over pairs of nodes drives pair counting, binned
//!   pair counting, pair collection and friends-of-friends grouping.
//! - **Parallel**: Tree construction and traversal fan out over `rayon`.
//!
//! ## Example
//!
//! ```
//! use kdcount::{PointSet, build, enumerate_nodes, traverse};
//!
//! let points = PointSet::from_points(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [5.0, 5.0, 5.0]])?;
//! let tree = build(&points)?;
//! assert_eq!(enumerate_nodes(&tree).len(), tree.node_count());
//!
//! let mut pairs = Vec::new();
//! traverse(&tree, &tree, 1.5, |i, j, _| pairs.push((i, j)))?;
//! assert_eq!(pairs, vec![(0, 1)]);
//! # Ok::<(), kdcount::Error>(())
//! ```
//!
//! ## Main Interface
//!
//! Load a [`PointSet`], build a [`KdTree`], then walk it with [`enumerate_nodes`],
//! [`traverse`] or one of the queries.

mod bounds;
mod error;
mod kdtree;
mod points;
mod queries;
mod traversal;
mod wasm;

pub use bounds::BoundingBox;
pub use bounds::BoxRef;
pub use error::Error;
pub use error::Result;
pub use kdtree::BreadthFirst;
pub use kdtree::BuildOptions;
pub use kdtree::KdTree;
pub use kdtree::Node;
pub use kdtree::NodeId;
pub use kdtree::DEFAULT_MIN_LEAF_SIZE;
pub use kdtree::DEFAULT_PARALLEL_THRESHOLD;
pub use points::PointSet;
pub use points::COORDINATE_BYTES;
pub use queries::Pair;
pub use queries::count_pairs;
pub use queries::count_pairs_binned;
pub use queries::count_pairs_binned_with;
pub use queries::count_pairs_with;
pub use queries::friends_of_friends;
pub use queries::pairs_within;
pub use queries::par_count_pairs;
pub use queries::par_pairs_within;
pub use traversal::CancelToken;
pub use traversal::DistanceSpan;
pub use traversal::PairVisitor;
pub use traversal::TraversalOptions;
pub use traversal::enumerate_nodes;
pub use traversal::par_traverse;
pub use traversal::par_traverse_with;
pub use traversal::traverse;
pub use traversal::try_traverse;
pub use wasm::PointIndex;

/// Builds a tree over `points` with [`BuildOptions::default`].
pub fn build(points: &PointSet) -> Result<KdTree<'_>> {
    KdTree::build(points, &BuildOptions::default())
}
