use crate::{
    error::{IsosurfaceError, Result},
    types::{Point, Value, Vector},
};

/// Indexed triangle mesh approximating the iso-surface of a [`Volume`](crate::volume::Volume).
///
/// Vertices are shared: each one lies on a single lattice edge, and every
/// triangle touching that edge refers to it by the same index. Triangles are
/// wound counter-clockwise when seen from outside the surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoMesh {
    /// Vertex positions: `[[x, y, z], ...]`
    pub vertices: Vec<[Value; 3]>,

    /// Per-vertex unit normals: `[[nx, ny, nz], ...]`
    ///
    /// Either empty (normals disabled) or the same length as `vertices`.
    pub normals: Vec<[Value; 3]>,

    /// Triangle index triples into `vertices`: `[[v0, v1, v2], ...]`
    pub indices: Vec<[u32; 3]>,
}

impl IsoMesh {
    /// Creates an empty mesh with no vertices, triangles, or normals.
    pub fn new_empty() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// `true` when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Adds a triangle defined by three vertex indices.
    ///
    /// Returns [`IsosurfaceError::InvalidIndex`] if any index is out of bounds.
    pub fn triangle_from_verts(&mut self, a: u32, b: u32, c: u32) -> Result<()> {
        let vertex = a.max(b.max(c));
        if vertex as usize >= self.vertices.len() {
            return Err(IsosurfaceError::InvalidIndex {
                triangle: self.indices.len(),
                vertex,
                vertex_count: self.vertices.len(),
            });
        }
        self.indices.push([a, b, c]);
        Ok(())
    }

    /// Position of vertex `index`.
    pub fn vertex(&self, index: u32) -> Point {
        Point::from(self.vertices[index as usize])
    }

    /// Returns the three vertex positions of triangle `tri`.
    pub fn tri_coords(&self, tri: usize) -> [Point; 3] {
        self.indices[tri].map(|i| self.vertex(i))
    }

    /// Computes the unit face normal for triangle `tri`.
    ///
    /// Returns the zero vector if the triangle is degenerate.
    pub fn tri_normal(&self, tri: usize) -> Vector {
        let [a, b, c] = self.tri_coords(tri);
        let cross = (b - a).cross(&(c - b));

        let nrm = cross.norm();
        if nrm == 0.0 {
            Vector::zeros()
        } else {
            cross / nrm
        }
    }

    /// Checks that every triangle refers to existing vertices.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len();
        for (triangle, tri) in self.indices.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(IsosurfaceError::InvalidIndex {
                    triangle,
                    vertex,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Axis-aligned `[min, max]` bounds of the vertices, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<[Point; 2]> {
        let mut points = self.vertices.iter().map(|&v| Point::from(v));
        let first = points.next()?;
        Some(points.fold([first, first], |[min, max], p| [min.inf(&p), max.sup(&p)]))
    }

    /// Returns a copy recentred on the origin and uniformly scaled into `[-1, 1]³`.
    ///
    /// ```text
    ///  center = (min + max) / 2
    ///  scale  = largest extent / 2
    ///  v'     = (v - center) / scale
    /// ```
    ///
    /// Normals are unaffected by a uniform scale and are copied as-is.
    pub fn fit_unit_cube(&self) -> Self {
        let Some([min, max]) = self.bounds() else {
            return self.clone();
        };
        let center = nalgebra::center(&min, &max);
        let scale = (max - min).max() / 2.;
        let scale = if scale > 0. { scale } else { 1. };

        let vertices = self
            .vertices
            .iter()
            .map(|&v| {
                let p = (Point::from(v) - center) / scale;
                [p.x, p.y, p.z]
            })
            .collect();

        Self {
            vertices,
            normals: self.normals.clone(),
            indices: self.indices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn quad() -> IsoMesh {
        IsoMesh {
            vertices: vec![[0., 0., 0.], [2., 0., 0.], [2., 2., 0.], [0., 2., 0.]],
            normals: vec![],
            indices: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    #[test]
    fn counts_vertices_and_triangles() {
        let mesh = quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(!mesh.is_empty());
        assert!(IsoMesh::new_empty().is_empty());
    }

    #[test]
    fn rejects_triangles_past_the_vertex_buffer() {
        let mut mesh = quad();
        assert!(mesh.triangle_from_verts(1, 2, 3).is_ok());
        assert_eq!(
            mesh.triangle_from_verts(0, 4, 1),
            Err(IsosurfaceError::InvalidIndex {
                triangle: 3,
                vertex: 4,
                vertex_count: 4
            })
        );
        assert_eq!(mesh.triangle_count(), 3);
    }

    #[test]
    fn validate_reports_the_first_bad_triangle() {
        let mut mesh = quad();
        assert!(mesh.validate().is_ok());
        mesh.indices.push([0, 1, 9]);
        assert!(matches!(
            mesh.validate(),
            Err(IsosurfaceError::InvalidIndex {
                triangle: 2,
                vertex: 9,
                ..
            })
        ));
    }

    #[test]
    fn counter_clockwise_triangles_face_positive_z() {
        let mesh = quad();
        assert_relative_eq!(mesh.tri_normal(0), Vector::z());
        assert_relative_eq!(mesh.tri_normal(1), Vector::z());
    }

    #[test]
    fn degenerate_triangles_have_zero_normal() {
        let mesh = IsoMesh {
            vertices: vec![[0., 0., 0.], [1., 1., 1.], [2., 2., 2.]],
            normals: vec![],
            indices: vec![[0, 1, 2]],
        };
        assert_eq!(mesh.tri_normal(0), Vector::zeros());
    }

    #[test]
    fn bounds_cover_every_vertex() {
        let [min, max] = quad().bounds().unwrap();
        assert_eq!(min, Point::new(0., 0., 0.));
        assert_eq!(max, Point::new(2., 2., 0.));
        assert!(IsoMesh::new_empty().bounds().is_none());
    }

    #[test]
    fn fits_into_the_unit_cube() {
        let fitted = quad().fit_unit_cube();
        let [min, max] = fitted.bounds().unwrap();
        assert_relative_eq!(min, Point::new(-1., -1., 0.));
        assert_relative_eq!(max, Point::new(1., 1., 0.));
        assert_eq!(fitted.indices, quad().indices);
    }
}
