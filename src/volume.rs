use std::sync::Arc;

use ndarray::Array3;

use crate::{
    error::{IsosurfaceError, Result},
    tables::CORNER_OFFSETS,
    types::{LatticeIndex, Point, Sample, SdfFunction, Value, Vector},
};

/// Smallest edge length that still holds one full cell.
pub const MIN_SIZE: usize = 2;

/// A cube-shaped lattice of signed distance samples.
///
/// The lattice has `size` samples per axis and `(size - 1)³` cells. Sample
/// `(x, y, z)` sits at world position `origin + spacing * (x, y, z)`.
///
/// Values are stored as `values[[z, y, x]]`, so the flat row-major order is
/// `x + y * size + z * size * size`.
///
/// `values` is wrapped in an [`Arc`] so extraction tasks and callers can share
/// the buffer without copying it. The volume never hands out mutable access.
#[derive(Clone, Debug)]
pub struct Volume {
    size: usize,
    origin: Point,
    spacing: Value,
    threshold: Value,
    values: Arc<Array3<Value>>,
}

impl Volume {
    /// Creates a volume from a flat row-major buffer of `size³` distances.
    pub fn new(size: usize, distances: Vec<Value>) -> Result<Self> {
        check_size(size)?;
        let expected = cubed(size)?;
        if distances.len() != expected {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "expected {expected} samples for size {size}, got {}",
                distances.len()
            )));
        }
        let values = Array3::from_shape_vec((size, size, size), distances)
            .map_err(|e| IsosurfaceError::InvalidVolume(e.to_string()))?;
        Ok(Self::from_array(size, Arc::new(values)))
    }

    /// Creates a volume from a flat buffer, inferring the edge length from its length.
    ///
    /// Fails with [`IsosurfaceError::InvalidVolume`] unless the length is a perfect cube.
    pub fn from_flat(distances: Vec<Value>) -> Result<Self> {
        let len = distances.len();
        let size = (len as f64).cbrt().round() as usize;
        if size.checked_pow(3) != Some(len) {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "{len} samples do not form a cube"
            )));
        }
        Self::new(size, distances)
    }

    /// Creates a volume from explicitly positioned samples in row-major order.
    ///
    /// The origin is taken from the first sample and the spacing from the first
    /// step along X. Every sample must sit on its lattice position.
    pub fn from_samples(size: usize, samples: &[Sample]) -> Result<Self> {
        check_size(size)?;
        let expected = cubed(size)?;
        if samples.len() != expected {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "expected {expected} samples for size {size}, got {}",
                samples.len()
            )));
        }

        let origin = samples[0].position;
        let spacing = samples[1].position.x - origin.x;
        check_spacing(spacing)?;

        let tolerance = spacing * 1e-4;
        for (n, sample) in samples.iter().enumerate() {
            let index = [n % size, (n / size) % size, n / (size * size)];
            let lattice = lattice_position(origin, spacing, index);
            if (sample.position - lattice).amax() > tolerance {
                return Err(IsosurfaceError::InvalidVolume(format!(
                    "sample {n} at {} is not on lattice point {index:?}",
                    sample.position
                )));
            }
        }

        let distances = samples.iter().map(|s| s.distance).collect();
        Ok(Self::new(size, distances)?
            .with_origin(origin)
            .with_spacing(spacing))
    }

    /// Samples `function` at every lattice point.
    pub fn from_fn(
        size: usize,
        origin: Point,
        spacing: Value,
        function: &SdfFunction,
    ) -> Result<Self> {
        check_size(size)?;
        cubed(size)?;
        check_spacing(spacing)?;

        let values = Array3::from_shape_fn((size, size, size), |(z, y, x)| {
            function(lattice_position(origin, spacing, [x, y, z]))
        });
        Ok(Self::from_array(size, Arc::new(values))
            .with_origin(origin)
            .with_spacing(spacing))
    }

    /// Adopts a previously shared sample buffer.
    ///
    /// ```rust,ignore
    /// let shared = volume.shared_values();
    /// let again = Volume::from_shared(volume.size(), shared)?.with_threshold(0.5);
    /// ```
    pub fn from_shared(size: usize, values: Arc<Array3<Value>>) -> Result<Self> {
        check_size(size)?;
        if values.dim() != (size, size, size) {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "buffer shape {:?} does not match size {size}",
                values.shape()
            )));
        }
        Ok(Self::from_array(size, values))
    }

    fn from_array(size: usize, values: Arc<Array3<Value>>) -> Self {
        Self {
            size,
            origin: Point::origin(),
            spacing: 1.,
            threshold: 0.,
            values,
        }
    }

    /// Sets the world-space position of lattice index `(0, 0, 0)`.
    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the world-space distance between neighbouring samples.
    pub fn with_spacing(mut self, spacing: Value) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the iso-level. Samples strictly below it are "inside".
    pub fn with_threshold(mut self, threshold: Value) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn spacing(&self) -> Value {
        self.spacing
    }

    pub fn threshold(&self) -> Value {
        self.threshold
    }

    /// Read-only view of the samples, indexed `[[z, y, x]]`.
    pub fn values(&self) -> &Array3<Value> {
        &self.values
    }

    /// Returns another handle to the shared sample buffer.
    pub fn shared_values(&self) -> Arc<Array3<Value>> {
        Arc::clone(&self.values)
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }

    /// Number of cells, `(size - 1)³`.
    pub fn cell_count(&self) -> usize {
        self.size.saturating_sub(1).pow(3)
    }

    /// Re-checks every invariant extraction relies on.
    pub fn validate(&self) -> Result<()> {
        check_size(self.size)?;
        if self.values.dim() != (self.size, self.size, self.size) {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "buffer shape {:?} does not match size {}",
                self.values.shape(),
                self.size
            )));
        }
        check_spacing(self.spacing)?;
        if !self.threshold.is_finite() {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "threshold {} is not finite",
                self.threshold
            )));
        }
        let non_finite = self.values.indexed_iter().find(|(_, v)| !v.is_finite());
        if let Some(((z, y, x), v)) = non_finite {
            return Err(IsosurfaceError::InvalidVolume(format!(
                "sample {:?} holds non-finite distance {v}",
                [x, y, z]
            )));
        }
        Ok(())
    }

    /// Fails with [`IsosurfaceError::OutOfBounds`] if any component is `>= size`.
    #[inline]
    pub fn check_index(&self, index: LatticeIndex) -> Result<()> {
        if index.iter().any(|&c| c >= self.size) {
            return Err(IsosurfaceError::OutOfBounds {
                index,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Returns the distance stored at `index`.
    #[inline]
    pub fn value(&self, index: LatticeIndex) -> Result<Value> {
        let [x, y, z] = index;
        self.values
            .get((z, y, x))
            .copied()
            .ok_or(IsosurfaceError::OutOfBounds {
                index,
                size: self.size,
            })
    }

    /// Returns the world-space position of `index`. Not bounds checked.
    #[inline]
    pub fn position(&self, index: LatticeIndex) -> Point {
        lattice_position(self.origin, self.spacing, index)
    }

    /// Returns the sample at `index`.
    pub fn get(&self, index: LatticeIndex) -> Result<Sample> {
        Ok(Sample::new(self.position(index), self.value(index)?))
    }

    /// Row-major position of `index` in the flat sample buffer.
    #[inline]
    pub fn linear_index(&self, index: LatticeIndex) -> Result<usize> {
        self.check_index(index)?;
        let [x, y, z] = index;
        Ok(x + y * self.size + z * self.size * self.size)
    }

    /// Estimates the field gradient at `index` in world units.
    ///
    /// Central differences in the interior, one-sided differences on the lattice boundary.
    pub fn gradient(&self, index: LatticeIndex) -> Result<Vector> {
        self.check_index(index)?;
        let mut gradient = Vector::zeros();
        for axis in 0..3 {
            let mut lo = index;
            let mut hi = index;
            lo[axis] = index[axis].saturating_sub(1);
            hi[axis] = (index[axis] + 1).min(self.size - 1);
            let steps = (hi[axis] - lo[axis]) as Value;
            gradient[axis] = (self.value(hi)? - self.value(lo)?) / (steps * self.spacing);
        }
        Ok(gradient)
    }

    /// Returns the 8 corner indices `[x, y, z]` of the cell whose lowest corner is `cell`.
    ///
    /// Corners follow the table convention:
    ///
    /// ```text
    ///  0 = (x,   y,   z  )    4 = (x,   y,   z+1)
    ///  1 = (x+1, y,   z  )    5 = (x+1, y,   z+1)
    ///  2 = (x+1, y+1, z  )    6 = (x+1, y+1, z+1)
    ///  3 = (x,   y+1, z  )    7 = (x,   y+1, z+1)
    /// ```
    #[inline]
    pub fn cell_corner_indices(&self, cell: LatticeIndex) -> [LatticeIndex; 8] {
        let [x, y, z] = cell;
        CORNER_OFFSETS.map(|[dx, dy, dz]| [x + dx, y + dy, z + dz])
    }

    /// Iterates every sample in row-major order.
    pub fn iter_samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.values
            .indexed_iter()
            .map(move |((z, y, x), &distance)| Sample::new(self.position([x, y, z]), distance))
    }
}

#[inline]
fn lattice_position(origin: Point, spacing: Value, index: LatticeIndex) -> Point {
    let [x, y, z] = index;
    origin + Vector::new(x as Value, y as Value, z as Value) * spacing
}

fn check_size(size: usize) -> Result<()> {
    if size < MIN_SIZE {
        return Err(IsosurfaceError::InvalidVolume(format!(
            "size {size} is smaller than {MIN_SIZE}"
        )));
    }
    Ok(())
}

fn check_spacing(spacing: Value) -> Result<()> {
    if !(spacing.is_finite() && spacing > 0.) {
        return Err(IsosurfaceError::InvalidVolume(format!(
            "spacing {spacing} must be finite and positive"
        )));
    }
    Ok(())
}

fn cubed(size: usize) -> Result<usize> {
    size.checked_pow(3).ok_or_else(|| {
        IsosurfaceError::InvalidVolume(format!("size {size} overflows the sample count"))
    })
}
