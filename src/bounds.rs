/// Axis-aligned bounding box in N-dimensional space.
///
/// Boxes are stored in `f64` even though coordinates are loaded as `f32`, so that
/// distances between boxes are computed without further rounding.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl BoundingBox {
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Self {
        debug_assert_eq!(min.len(), max.len(), "min and max must have the same dimension");
        Self { min, max }
    }

    /// An inverted box that any extended point will replace.
    pub fn empty(dim: usize) -> Self {
        Self {
            min: vec![f64::INFINITY; dim],
            max: vec![f64::NEG_INFINITY; dim],
        }
    }

    /// Grows the box to include `point`.
    pub fn extend(&mut self, point: &[f32]) {
        for (axis, &v) in point.iter().enumerate() {
            let v = v as f64;
            if v < self.min[axis] { self.min[axis] = v; }
            if v > self.max[axis] { self.max[axis] = v; }
        }
    }

    pub fn dim(&self) -> usize {
        self.min.len()
    }

    pub fn view(&self) -> BoxRef<'_> {
        BoxRef { min: &self.min, max: &self.max }
    }
}

/// Borrowed view of a bounding box, as stored in the node arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxRef<'a> {
    pub min: &'a [f64],
    pub max: &'a [f64],
}

impl<'a> BoxRef<'a> {
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Axis with the largest extent. Ties go to the lowest axis.
    pub fn widest_axis(&self) -> usize {
        let mut best = 0;
        let mut best_extent = self.extent(0);
        for axis in 1..self.dim() {
            let e = self.extent(axis);
            if e > best_extent {
                best = axis;
                best_extent = e;
            }
        }
        best
    }

    /// Smallest squared distance between any point of `self` and any point of `other`.
    pub fn min_distance_sq(&self, other: &BoxRef<'_>) -> f64 {
        let mut d2 = 0.0;
        for i in 0..self.dim() {
            let gap = (other.min[i] - self.max[i]).max(self.min[i] - other.max[i]).max(0.0);
            d2 += gap * gap;
        }
        d2
    }

    /// Largest squared distance between any point of `self` and any point of `other`.
    pub fn max_distance_sq(&self, other: &BoxRef<'_>) -> f64 {
        let mut d2 = 0.0;
        for i in 0..self.dim() {
            let span = (other.max[i] - self.min[i]).max(self.max[i] - other.min[i]);
            d2 += span * span;
        }
        d2
    }

    /// Squared distance from `point` to the nearest point of the box.
    pub fn distance_sq_to_point(&self, point: &[f64]) -> f64 {
        let mut d2 = 0.0;
        for i in 0..self.dim() {
            let v = point[i];
            if v < self.min[i] { d2 += (self.min[i] - v).powi(2); }
            else if v > self.max[i] { d2 += (v - self.max[i]).powi(2); }
        }
        d2
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoxRef<'_>) -> bool {
        (0..self.dim()).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    pub fn contains_point(&self, point: &[f32]) -> bool {
        point.iter().enumerate().all(|(i, &v)| {
            let v = v as f64;
            self.min[i] <= v && v <= self.max[i]
        })
    }

    pub fn to_box(&self) -> BoundingBox {
        BoundingBox::new(self.min.to_vec(), self.max.to_vec())
    }
}
