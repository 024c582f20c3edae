use crate::bounds::{BoundingBox, BoxRef};
use crate::error::{Error, Result};
use crate::points::PointSet;
use crate::traversal::check_threshold;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

/// Default maximum number of points kept in a leaf.
pub const DEFAULT_MIN_LEAF_SIZE: usize = 16;

/// Subsets at least this large build their two halves on separate rayon tasks.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 8192;

/// Position of a node in its tree's arena. The root is always `0`.
pub type NodeId = u32;

/// Parameters for [`KdTree::build`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Subsets of at most this many points are not split any further.
    pub min_leaf_size: usize,
    /// Hard recursion ceiling. `None` derives it as `ceil(log2(N))`.
    pub max_depth: Option<usize>,
    /// Minimum subset size for building the two children in parallel.
    pub parallel_threshold: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            min_leaf_size: DEFAULT_MIN_LEAF_SIZE,
            max_depth: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl BuildOptions {
    pub fn with_min_leaf_size(mut self, min_leaf_size: usize) -> Self {
        self.min_leaf_size = min_leaf_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Never fork build tasks.
    pub fn serial(self) -> Self {
        self.with_parallel_threshold(usize::MAX)
    }

    fn validate(&self) -> Result<()> {
        if self.min_leaf_size < 1 {
            return Err(Error::Config("min_leaf_size must be at least 1".into()));
        }
        if self.max_depth == Some(0) {
            return Err(Error::Config("max_depth must be at least 1".into()));
        }
        Ok(())
    }

    fn depth_limit(&self, count: usize) -> usize {
        self.max_depth.unwrap_or_else(|| ceil_log2(count).max(1))
    }
}

fn ceil_log2(n: usize) -> usize {
    if n <= 1 { 0 } else { (usize::BITS - (n - 1).leading_zeros()) as usize }
}

#[derive(Clone, Copy, Debug)]
struct KdNode {
    // `None` for leaves, otherwise `[less, greater]`
    children: Option<[NodeId; 2]>,
    // Points: indices[start..end]
    start: u32,
    end: u32,
    // Internal node data
    split_val: f64,
    axis: u32,
    depth: u32,
}

/// Nodes plus their boxes, laid out flat: node `i` owns `extents[2*D*i..2*D*(i+1)]`,
/// first the `D` minima and then the `D` maxima.
#[derive(Default)]
struct Arena {
    nodes: Vec<KdNode>,
    extents: Vec<f64>,
}

impl Arena {
    fn push(&mut self, node: KdNode, bounds: &BoundingBox) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        self.extents.extend_from_slice(&bounds.min);
        self.extents.extend_from_slice(&bounds.max);
        id
    }

    /// Moves a separately built subtree behind the existing nodes and returns the id of its root.
    fn append(&mut self, other: Arena) -> NodeId {
        let offset = self.nodes.len() as NodeId;
        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            if let Some(children) = node.children.as_mut() {
                for child in children.iter_mut() {
                    *child += offset;
                }
            }
            node
        }));
        self.extents.extend(other.extents);
        offset
    }
}

struct Builder<'p> {
    points: &'p PointSet,
    min_leaf_size: usize,
    max_depth: usize,
    parallel_threshold: usize,
}

impl Builder<'_> {
    /// Builds the subtree over `indices`, which sit at `offset` in the tree's permutation.
    ///
    /// Nodes are pushed in pre-order, so the serial and the parallel paths produce the same
    /// arena.
    fn build_recursive(&self, arena: &mut Arena, indices: &mut [usize], offset: usize, depth: usize) -> NodeId {
        let count = indices.len();
        let bounds = self.points.bounds_of(indices);

        let node_idx = arena.push(
            KdNode {
                children: None,
                start: offset as u32,
                end: (offset + count) as u32,
                split_val: 0.0,
                axis: 0,
                depth: depth as u32,
            },
            &bounds,
        );

        // Leaf condition
        if count <= self.min_leaf_size || depth >= self.max_depth {
            return node_idx;
        }

        // Median split on the widest axis; `less` keeps the ceil(n/2) smallest.
        let axis = bounds.view().widest_axis();
        let k = (count - 1) / 2;
        let points = self.points;
        let (_, median, _) = indices.select_nth_unstable_by(k, |&a, &b| {
            points.coord(a, axis).total_cmp(&points.coord(b, axis))
        });
        let split_val = points.coord(*median, axis) as f64;
        let (less, greater) = indices.split_at_mut(k + 1);

        let (left, right) = if count >= self.parallel_threshold {
            trace!(count, depth, "forking subtree builds");
            let (l, r) = rayon::join(
                || self.build_subtree(less, offset, depth + 1),
                || self.build_subtree(greater, offset + k + 1, depth + 1),
            );
            (arena.append(l), arena.append(r))
        } else {
            let l = self.build_recursive(arena, less, offset, depth + 1);
            let r = self.build_recursive(arena, greater, offset + k + 1, depth + 1);
            (l, r)
        };

        let node = &mut arena.nodes[node_idx as usize];
        node.children = Some([left, right]);
        node.split_val = split_val;
        node.axis = axis as u32;
        node_idx
    }

    fn build_subtree(&self, indices: &mut [usize], offset: usize, depth: usize) -> Arena {
        let mut arena = Arena::default();
        self.build_recursive(&mut arena, indices, offset, depth);
        arena
    }
}

/// A balanced k-d tree over a borrowed [`PointSet`].
///
/// The tree owns its nodes and a permutation of point indices; each node covers a
/// contiguous range of that permutation. Points are never copied.
pub struct KdTree<'p> {
    points: &'p PointSet,
    nodes: Vec<KdNode>,
    extents: Vec<f64>,
    indices: Vec<usize>,
}

impl<'p> KdTree<'p> {
    /// Builds a tree by recursive median splits on the widest axis.
    ///
    /// # Errors
    /// * [`Error::Config`] if `min_leaf_size` or `max_depth` is zero.
    /// * [`Error::EmptyInput`] if `points` is empty.
    pub fn build(points: &'p PointSet, options: &BuildOptions) -> Result<Self> {
        options.validate()?;
        let count = points.len();
        if count == 0 {
            return Err(Error::EmptyInput);
        }
        if count > u32::MAX as usize {
            return Err(Error::Config(format!("{count} points exceed the supported maximum of {}", u32::MAX)));
        }

        let builder = Builder {
            points,
            min_leaf_size: options.min_leaf_size,
            max_depth: options.depth_limit(count),
            parallel_threshold: options.parallel_threshold,
        };

        let mut indices: Vec<usize> = (0..count).collect();
        let mut arena = Arena::default();
        // Median splits give at most 2 * N / min_leaf_size nodes
        let capacity = 2 * count.div_ceil(options.min_leaf_size);
        arena.nodes.reserve(capacity);
        arena.extents.reserve(capacity * 2 * points.dim());

        builder.build_recursive(&mut arena, &mut indices, 0, 0);

        let tree = KdTree {
            points,
            nodes: arena.nodes,
            extents: arena.extents,
            indices,
        };
        debug!(
            points = count,
            nodes = tree.node_count(),
            leaves = tree.leaf_count(),
            depth = tree.depth(),
            "built kd-tree"
        );
        Ok(tree)
    }

    /// The indexed point set.
    pub fn points(&self) -> &'p PointSet {
        self.points
    }

    pub fn dim(&self) -> usize {
        self.points.dim()
    }

    pub fn root(&self) -> Node<'_> {
        Node { tree: self, id: 0 }
    }

    /// Node by arena id, or [`Error::Index`] if there is no such node.
    pub fn node(&self, id: usize) -> Result<Node<'_>> {
        if id >= self.nodes.len() {
            return Err(Error::Index { index: id, len: self.nodes.len() });
        }
        Ok(Node { tree: self, id: id as NodeId })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.children.is_none()).count()
    }

    /// Depth of the deepest node; a lone root has depth 0.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth as usize).max().unwrap_or(0)
    }

    /// Point indices in tree order. Every leaf covers a contiguous range of this slice.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// All nodes, breadth-first: root first, `less` before `greater`.
    pub fn breadth_first(&self) -> BreadthFirst<'_> {
        let mut queue = VecDeque::with_capacity(self.nodes.len().min(1024));
        queue.push_back(0);
        BreadthFirst { tree: self, queue }
    }

    /// Leaves from the lowest to the highest range of the permutation.
    pub fn leaves(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        (0..self.nodes.len() as NodeId)
            .filter(|&id| self.nodes[id as usize].children.is_none())
            .map(move |id| Node { tree: self, id })
    }

    /// Indices of all points within `radius` of `point`, sorted.
    pub fn query_radius(&self, point: &[f64], radius: f64) -> Result<Vec<usize>> {
        let mut found = Vec::new();
        self.visit_radius(point, radius, |idx, _| found.push(idx))?;
        found.sort_unstable();
        Ok(found)
    }

    /// Calls `callback(index, distance)` for every point within `radius` of `point`.
    pub fn visit_radius<F>(&self, point: &[f64], radius: f64, mut callback: F) -> Result<()>
    where
        F: FnMut(usize, f64),
    {
        if point.len() != self.dim() {
            return Err(Error::DimensionMismatch { left: self.dim(), right: point.len() });
        }
        check_threshold(radius)?;
        self.visit_radius_recursive(0, point, radius * radius, &mut callback);
        Ok(())
    }

    fn visit_radius_recursive<F>(&self, node_idx: NodeId, point: &[f64], radius_sq: f64, callback: &mut F)
    where
        F: FnMut(usize, f64),
    {
        // Pruning: distance from point to node bounding box
        if self.box_ref(node_idx).distance_sq_to_point(point) > radius_sq {
            return;
        }

        let node = &self.nodes[node_idx as usize];
        match node.children {
            // Leaf
            None => {
                for &idx in &self.indices[node.start as usize..node.end as usize] {
                    let d2 = self.points.distance_sq_to(idx, point);
                    if d2 <= radius_sq {
                        callback(idx, d2.sqrt());
                    }
                }
            }
            // Internal
            Some([less, greater]) => {
                let diff = point[node.axis as usize] - node.split_val;

                // Visit nearest child first
                let (first, second) = if diff <= 0.0 { (less, greater) } else { (greater, less) };
                self.visit_radius_recursive(first, point, radius_sq, callback);

                // The plane distance is diff^2.
                if diff * diff <= radius_sq {
                    self.visit_radius_recursive(second, point, radius_sq, callback);
                }
            }
        }
    }

    pub(crate) fn children(&self, id: NodeId) -> Option<[NodeId; 2]> {
        self.nodes[id as usize].children
    }

    pub(crate) fn box_ref(&self, id: NodeId) -> BoxRef<'_> {
        let d = self.dim();
        let base = id as usize * 2 * d;
        BoxRef {
            min: &self.extents[base..base + d],
            max: &self.extents[base + d..base + 2 * d],
        }
    }

    pub(crate) fn range(&self, id: NodeId) -> &[usize] {
        let node = &self.nodes[id as usize];
        &self.indices[node.start as usize..node.end as usize]
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }
}

impl fmt::Debug for KdTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdTree")
            .field("dim", &self.dim())
            .field("points", &self.indices.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Handle to one node of a [`KdTree`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a KdTree<'a>,
    id: NodeId,
}

impl<'a> Node<'a> {
    fn raw(&self) -> &'a KdNode {
        &self.tree.nodes[self.id as usize]
    }

    /// Arena id, usable with [`KdTree::node`].
    pub fn id(&self) -> usize {
        self.id as usize
    }

    pub fn is_leaf(&self) -> bool {
        self.raw().children.is_none()
    }

    /// Child holding the points with `coordinate[axis] <= split_value`.
    pub fn less(&self) -> Option<Node<'a>> {
        self.children().map(|(less, _)| less)
    }

    /// Child holding the points at or above the split value.
    pub fn greater(&self) -> Option<Node<'a>> {
        self.children().map(|(_, greater)| greater)
    }

    pub fn children(&self) -> Option<(Node<'a>, Node<'a>)> {
        self.raw().children.map(|[less, greater]| {
            (Node { tree: self.tree, id: less }, Node { tree: self.tree, id: greater })
        })
    }

    pub fn split_axis(&self) -> Option<usize> {
        let raw = self.raw();
        raw.children.map(|_| raw.axis as usize)
    }

    pub fn split_value(&self) -> Option<f64> {
        let raw = self.raw();
        raw.children.map(|_| raw.split_val)
    }

    pub fn bounds(&self) -> BoxRef<'a> {
        self.tree.box_ref(self.id)
    }

    /// Number of points below this node.
    pub fn count(&self) -> usize {
        let raw = self.raw();
        (raw.end - raw.start) as usize
    }

    pub fn depth(&self) -> usize {
        self.raw().depth as usize
    }

    pub fn point_indices(&self) -> &'a [usize] {
        self.tree.range(self.id)
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("count", &self.count())
            .field("depth", &self.depth())
            .field("leaf", &self.is_leaf())
            .finish()
    }
}

/// Breadth-first iterator over the nodes of a tree.
pub struct BreadthFirst<'a> {
    tree: &'a KdTree<'a>,
    queue: VecDeque<NodeId>,
}

impl<'a> Iterator for BreadthFirst<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        if let Some([less, greater]) = self.tree.children(id) {
            self.queue.push_back(less);
            self.queue.push_back(greater);
        }
        Some(Node { tree: self.tree, id })
    }
}
