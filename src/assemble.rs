use std::collections::HashMap;

use crate::{
    error::{IsosurfaceError, Result},
    mesh::IsoMesh,
    types::{LatticeIndex, Point, Vector},
};

/// Canonical identifier of a lattice edge.
///
/// Holds the row-major linear indices of the two endpoints, lower first, so the
/// two cells sharing an edge always produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(usize, usize);

impl EdgeKey {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn endpoints(&self) -> (usize, usize) {
        (self.0, self.1)
    }
}

/// A surface crossing on one lattice edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub key: EdgeKey,
    pub position: Point,
    /// Unit surface normal, or zero when normals are disabled or undefined.
    pub normal: Vector,
}

/// Geometry produced by a single cell before deduplication.
///
/// `triangles` index into `crossings`, which holds at most one entry per crossed edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGeometry {
    pub cell: LatticeIndex,
    /// Sign configuration the cell was classified with.
    pub state: u8,
    pub crossings: Vec<Crossing>,
    pub triangles: Vec<[usize; 3]>,
}

impl CellGeometry {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Merges per-cell geometry into one indexed mesh.
///
/// Vertices are deduplicated by [`EdgeKey`], never by position: the first cell
/// to reach an edge appends its crossing, every later cell reuses that index.
/// Cells must be fed in a fixed order for the output to be deterministic.
#[derive(Debug, Default)]
pub struct MeshAssembler {
    vertex_of_edge: HashMap<EdgeKey, u32>,
    mesh: IsoMesh,
    with_normals: bool,
}

impl MeshAssembler {
    pub fn new(with_normals: bool) -> Self {
        Self {
            with_normals,
            ..Default::default()
        }
    }

    /// Returns the output vertex for `crossing`, appending it on first sight.
    pub fn vertex_for(&mut self, crossing: &Crossing) -> Result<u32> {
        if let Some(&index) = self.vertex_of_edge.get(&crossing.key) {
            return Ok(index);
        }

        let vertices = self.mesh.vertices.len();
        let index = u32::try_from(vertices)
            .map_err(|_| IsosurfaceError::IndexOverflow { vertices })?;

        let p = crossing.position;
        self.mesh.vertices.push([p.x, p.y, p.z]);
        if self.with_normals {
            let n = crossing.normal;
            self.mesh.normals.push([n.x, n.y, n.z]);
        }
        self.vertex_of_edge.insert(crossing.key, index);
        Ok(index)
    }

    /// Appends the triangles of one cell.
    ///
    /// Fails with [`IsosurfaceError::InvalidIndex`] if a triangle points past
    /// the cell's crossings; nothing of that triangle is added.
    pub fn add_cell(&mut self, cell: &CellGeometry) -> Result<()> {
        for tri in &cell.triangles {
            let [a, b, c] = self.crossings_of(cell, tri)?;
            let a = self.vertex_for(a)?;
            let b = self.vertex_for(b)?;
            let c = self.vertex_for(c)?;
            self.mesh.triangle_from_verts(a, b, c)?;
        }
        Ok(())
    }

    fn crossings_of<'a>(
        &self,
        cell: &'a CellGeometry,
        tri: &[usize; 3],
    ) -> Result<[&'a Crossing; 3]> {
        let slot = |i: usize| {
            cell.crossings.get(i).ok_or(IsosurfaceError::InvalidIndex {
                triangle: self.mesh.triangle_count(),
                vertex: u32::try_from(i).unwrap_or(u32::MAX),
                vertex_count: cell.crossings.len(),
            })
        };
        Ok([slot(tri[0])?, slot(tri[1])?, slot(tri[2])?])
    }

    /// Output vertex already assigned to `key`, if any.
    pub fn vertex_index(&self, key: &EdgeKey) -> Option<u32> {
        self.vertex_of_edge.get(key).copied()
    }

    /// Number of distinct edges seen so far.
    pub fn edge_count(&self) -> usize {
        self.vertex_of_edge.len()
    }

    pub fn finish(self) -> IsoMesh {
        self.mesh
    }
}
