use nalgebra::{Point3, Vector3};

/// Signed distance value at a lattice sample.
pub type Value = f32;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// Integer lattice index `[x, y, z]`.
pub type LatticeIndex = [usize; 3];

/// A signed distance function: maps a world-space [`Point`] to a [`Value`].
///
/// Negative values are inside the surface, positive values outside.
pub type SdfFunction = dyn Fn(Point) -> Value + Sync;

/// One sample of a signed distance field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// World-space position of the sample.
    pub position: Point,
    /// Signed distance to the surface (negative = inside, positive = outside).
    pub distance: Value,
}

impl Sample {
    pub fn new(position: Point, distance: Value) -> Self {
        Self { position, distance }
    }

    /// Whether this sample lies strictly below the iso-level `threshold`.
    #[inline]
    pub fn is_inside(&self, threshold: Value) -> bool {
        self.distance < threshold
    }
}
