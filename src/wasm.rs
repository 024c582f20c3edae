use crate::kdtree::{BuildOptions, KdTree};
use crate::points::PointSet;
use crate::queries;
use crate::traversal;
use js_sys::Uint32Array;
use rand::SeedableRng;
use rand::rngs::StdRng;
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_rayon::init_thread_pool;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_threads(n: usize) -> js_sys::Promise {
    init_thread_pool(n)
}

/// A point cloud with its k-d tree settings, exposed to JavaScript.
///
/// The tree borrows its points, so it is rebuilt for every query; building is
/// `O(N log N)` and cheap next to the queries themselves.
#[wasm_bindgen]
pub struct PointIndex {
    points: PointSet,
    options: BuildOptions,
}

#[wasm_bindgen]
impl PointIndex {
    /// Creates an index over a flat coordinate array `[x, y, z, x, y, z, ...]`.
    ///
    /// # Arguments
    ///
    /// * `coords` - The coordinates, `dim` per point.
    /// * `dim` - The number of coordinates per point.
    /// * `min_leaf_size` - The maximum number of points in a leaf node.
    #[wasm_bindgen(constructor)]
    pub fn new(coords: &[f32], dim: usize, min_leaf_size: usize) -> Result<PointIndex, JsError> {
        let points = PointSet::from_coords(coords.to_vec(), dim)?;
        let options = BuildOptions::default().with_min_leaf_size(min_leaf_size);
        Ok(PointIndex { points, options })
    }

    /// Creates an index over `count` random points in the unit cube.
    pub fn random(count: usize, dim: usize, min_leaf_size: usize) -> Result<PointIndex, JsError> {
        let mut rng = StdRng::seed_from_u64(get_seed());
        let points = PointSet::random(count, dim, &mut rng)?;
        let options = BuildOptions::default().with_min_leaf_size(min_leaf_size);
        Ok(PointIndex { points, options })
    }

    /// Returns the number of points.
    #[wasm_bindgen(getter)]
    pub fn count_points(&self) -> usize {
        self.points.len()
    }

    #[wasm_bindgen(getter)]
    pub fn dim(&self) -> usize {
        self.points.dim()
    }

    /// Returns the number of nodes of the k-d tree.
    pub fn node_count(&self) -> Result<usize, JsError> {
        let tree = KdTree::build(&self.points, &self.options)?;
        Ok(traversal::enumerate_nodes(&tree).len())
    }

    /// Counts the unordered point pairs within `threshold` of each other.
    pub fn count_pairs(&self, threshold: f64) -> Result<f64, JsError> {
        let tree = KdTree::build(&self.points, &self.options)?;
        let count = queries::par_count_pairs(&tree, &tree, threshold, &Default::default())?;
        Ok(count as f64)
    }

    /// Returns the point pairs within `threshold` as a flat array `[i0, j0, i1, j1, ...]`.
    pub fn pairs(&self, threshold: f64) -> Result<Uint32Array, JsError> {
        let tree = KdTree::build(&self.points, &self.options)?;
        let flat: Vec<u32> = queries::par_pairs_within(&tree, &tree, threshold)?
            .into_iter()
            .flat_map(|p| [p.a as u32, p.b as u32])
            .collect();
        Ok(Uint32Array::from(flat.as_slice()))
    }

    /// Returns the friends-of-friends group label of every point.
    pub fn friends_of_friends(&self, linking_length: f64) -> Result<Uint32Array, JsError> {
        let tree = KdTree::build(&self.points, &self.options)?;
        let labels: Vec<u32> = queries::friends_of_friends(&tree, linking_length)?
            .into_iter()
            .map(|l| l as u32)
            .collect();
        Ok(Uint32Array::from(labels.as_slice()))
    }
}

fn get_seed() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        (js_sys::Math::random() * 4294967296.0) as u64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        123456789
    }
}
