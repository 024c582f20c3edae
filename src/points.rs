use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use rand::Rng;
use std::path::Path;

/// Size in bytes of one stored coordinate (little-endian `f32`).
pub const COORDINATE_BYTES: usize = 4;

/// An immutable set of `N` points in `D` dimensions.
///
/// Coordinates are stored contiguously as `[x0, y0, z0, x1, y1, z1, ...]`. Trees and
/// queries only ever borrow a `PointSet`; there are no mutation operations.
#[derive(Clone, Debug, PartialEq)]
pub struct PointSet {
    dim: usize,
    coords: Vec<f32>,
}

impl PointSet {
    /// Parses a raw buffer of fixed-size records, each holding `dim` little-endian `f32`s.
    ///
    /// There is no header and no delimiter. Fails with [`Error::Format`] when the buffer
    /// length is not a multiple of `dim * 4`.
    pub fn load(bytes: &[u8], dim: usize) -> Result<Self> {
        check_dim(dim)?;
        let record = dim * COORDINATE_BYTES;
        if bytes.len() % record != 0 {
            return Err(Error::Format { len: bytes.len(), record });
        }

        let coords = bytes
            .chunks_exact(COORDINATE_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_coords(coords, dim)
    }

    /// Reads a whole raw point file, see [`PointSet::load`].
    pub fn open(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::load(&bytes, dim)
    }

    /// Takes ownership of a flat coordinate array.
    pub fn from_coords(coords: Vec<f32>, dim: usize) -> Result<Self> {
        check_dim(dim)?;
        if coords.len() % dim != 0 {
            return Err(Error::Format { len: coords.len() * COORDINATE_BYTES, record: dim * COORDINATE_BYTES });
        }
        if let Some(pos) = coords.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFinite { index: pos / dim, axis: pos % dim });
        }
        Ok(Self { dim, coords })
    }

    pub fn from_points<const D: usize>(points: &[[f32; D]]) -> Result<Self> {
        Self::from_coords(points.iter().flatten().copied().collect(), D)
    }

    /// Uniformly distributed points in the unit cube `[0, 1)^dim`.
    pub fn random<R: Rng>(count: usize, dim: usize, rng: &mut R) -> Result<Self> {
        check_dim(dim)?;
        let coords = (0..count * dim).map(|_| rng.gen_range(0.0..1.0)).collect();
        Ok(Self { dim, coords })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.coords.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Flat coordinate array.
    pub fn coords(&self) -> &[f32] {
        &self.coords
    }

    /// Coordinates of the point at `index`, or [`Error::Index`] if out of range.
    pub fn at(&self, index: usize) -> Result<&[f32]> {
        if index >= self.len() {
            return Err(Error::Index { index, len: self.len() });
        }
        Ok(self.point(index))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.coords.chunks_exact(self.dim)
    }

    /// Bounding box of all points, `None` for an empty set.
    pub fn bounds(&self) -> Option<BoundingBox> {
        if self.is_empty() {
            return None;
        }
        let mut b = BoundingBox::empty(self.dim);
        for p in self.iter() {
            b.extend(p);
        }
        Some(b)
    }

    pub(crate) fn point(&self, index: usize) -> &[f32] {
        &self.coords[index * self.dim..(index + 1) * self.dim]
    }

    pub(crate) fn coord(&self, index: usize, axis: usize) -> f32 {
        self.coords[index * self.dim + axis]
    }

    pub(crate) fn bounds_of(&self, indices: &[usize]) -> BoundingBox {
        let mut b = BoundingBox::empty(self.dim);
        for &i in indices {
            b.extend(self.point(i));
        }
        b
    }

    /// Squared distance between point `i` of `self` and point `j` of `other`.
    pub(crate) fn distance_sq(&self, i: usize, other: &PointSet, j: usize) -> f64 {
        self.point(i)
            .iter()
            .zip(other.point(j))
            .map(|(&a, &b)| {
                let d = a as f64 - b as f64;
                d * d
            })
            .sum()
    }

    pub(crate) fn distance_sq_to(&self, i: usize, point: &[f64]) -> f64 {
        self.point(i)
            .iter()
            .zip(point)
            .map(|(&a, &b)| {
                let d = a as f64 - b;
                d * d
            })
            .sum()
    }
}

fn check_dim(dim: usize) -> Result<()> {
    if dim == 0 {
        return Err(Error::Config("point dimension must be at least 1".into()));
    }
    Ok(())
}
