use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, trace};

use crate::{
    assemble::{CellGeometry, Crossing, EdgeKey, MeshAssembler},
    classify::{CellClass, ambiguous_faces, classify_cell, triangle_edges},
    error::Result,
    interp::{crossing_t, interpolate_points, interpolate_vectors},
    mesh::IsoMesh,
    tables::CORNER_POINT_INDICES,
    types::Vector,
    volume::Volume,
};

/// Options for [`compute_mesh_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Classify and interpolate z-slabs of cells on the Rayon thread pool.
    ///
    /// The output is identical either way. Default: `true`.
    pub parallel: bool,

    /// Fill [`IsoMesh::normals`] from the field gradient. Default: `true`.
    pub compute_normals: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            compute_normals: true,
        }
    }
}

/// Extracts the iso-surface of `volume` with the default [`ExtractConfig`].
///
/// Deterministic: the same volume always yields the same vertex and triangle order.
pub fn compute_mesh(volume: &Volume) -> Result<IsoMesh> {
    compute_mesh_with(volume, &ExtractConfig::default())
}

/// Runs marching cubes over every cell of `volume`.
///
/// ```text
/// Per cell (parallel over z-slabs):
/// 1. classify_cell     →  8 corner values + 8-bit state
/// 2. state 0x00/0xFF   →  nothing
/// 3. EDGE_TABLE[state] →  crossed edges, one Crossing each
/// 4. TRI_TABLE[state]  →  outward-wound triangles over those crossings
///
/// Then, single-threaded, in cell order:
/// 5. MeshAssembler     →  dedup by EdgeKey, indexed IsoMesh
/// ```
///
/// Fails with [`InvalidVolume`](crate::error::IsosurfaceError::InvalidVolume)
/// before doing any work if the volume is malformed.
#[tracing::instrument(skip_all, fields(size = volume.size()))]
pub fn compute_mesh_with(volume: &Volume, config: &ExtractConfig) -> Result<IsoMesh> {
    volume.validate()?;

    let cells = volume.size() - 1;
    let slab = |z: usize| march_slab(volume, z, config.compute_normals);

    let per_z: Vec<Result<Vec<CellGeometry>>> = if config.parallel {
        (0..cells).into_par_iter().map(slab).collect()
    } else {
        (0..cells).map(slab).collect()
    };

    let mut assembler = MeshAssembler::new(config.compute_normals);
    let mut ambiguous = 0;
    for geometries in per_z {
        for geometry in geometries? {
            ambiguous += usize::from(ambiguous_faces(geometry.state) != 0);
            assembler.add_cell(&geometry)?;
        }
    }
    let edges = assembler.edge_count();
    let mesh = assembler.finish();

    debug!(
        cells = volume.cell_count(),
        ambiguous,
        edges,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "extracted iso-surface"
    );
    Ok(mesh)
}

/// Produces the geometry of every non-empty cell in the slab at depth `z`, in `(y, x)` order.
fn march_slab(volume: &Volume, z: usize, with_normals: bool) -> Result<Vec<CellGeometry>> {
    let cells = volume.size() - 1;
    let mut local = Vec::new();
    for y in 0..cells {
        for x in 0..cells {
            let class = classify_cell(volume, [x, y, z])?;
            if class.is_trivial() {
                continue;
            }
            local.push(cell_geometry(volume, &class, with_normals)?);
        }
    }
    trace!(z, cells = local.len(), "marched slab");
    Ok(local)
}

/// Interpolates the crossing on every edge `class` marks, and wires the table's triangles to them.
pub fn cell_geometry(
    volume: &Volume,
    class: &CellClass,
    with_normals: bool,
) -> Result<CellGeometry> {
    let mask = class.edges_mask();
    let mut slot = [usize::MAX; 12];
    let mut crossings = Vec::with_capacity(mask.count_ones() as usize);

    for (edge, pair) in CORNER_POINT_INDICES.iter().enumerate() {
        if mask & (1u16 << edge) == 0 {
            continue;
        }
        slot[edge] = crossings.len();
        let (c0, c1) = (pair[0] as usize, pair[1] as usize);
        crossings.push(edge_crossing(volume, class, c0, c1, with_normals)?);
    }

    let triangles = triangle_edges(class.state)
        .map(|tri| tri.map(|edge| slot[edge]))
        .collect();

    Ok(CellGeometry {
        cell: class.cell,
        state: class.state,
        crossings,
        triangles,
    })
}

/// Crossing on the edge between corners `c0` and `c1` of `class`.
///
/// Always interpolates from the endpoint with the lower linear index, so both
/// cells sharing the edge compute bit-identical positions.
fn edge_crossing(
    volume: &Volume,
    class: &CellClass,
    c0: usize,
    c1: usize,
    with_normals: bool,
) -> Result<Crossing> {
    let i0 = volume.linear_index(class.corners[c0])?;
    let i1 = volume.linear_index(class.corners[c1])?;
    let (lo, hi) = if i0 <= i1 { (c0, c1) } else { (c1, c0) };

    let (a, b) = (class.corners[lo], class.corners[hi]);
    let t = crossing_t(class.values[lo], class.values[hi], volume.threshold());
    let position = interpolate_points(volume.position(a), volume.position(b), t);

    let normal = if with_normals {
        let gradient = interpolate_vectors(volume.gradient(a)?, volume.gradient(b)?, t);
        gradient.try_normalize(0.).unwrap_or_else(Vector::zeros)
    } else {
        Vector::zeros()
    };

    Ok(Crossing {
        key: EdgeKey::new(i0, i1),
        position,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        error::IsosurfaceError,
        types::{Point, Value},
    };

    fn sphere(size: usize, radius: Value) -> Volume {
        let c = (size - 1) as Value / 2.;
        let center = Point::new(c, c, c);
        let field = move |p: Point| (p - center).norm() - radius;
        Volume::from_fn(size, Point::origin(), 1., &field).unwrap()
    }

    #[test]
    fn one_outside_corner_gives_one_triangle() {
        let volume = Volume::new(2, vec![-1., -1., -1., -1., -1., -1., -1., 1.]).unwrap();
        let mesh = compute_mesh(&volume).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);

        let mut points = mesh.vertices.clone();
        points.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(points, vec![[0.5, 1., 1.], [1., 0.5, 1.], [1., 1., 0.5]]);

        // faces the outside corner at (1, 1, 1)
        let normal = mesh.tri_normal(0);
        assert_relative_eq!(normal, Vector::new(1., 1., 1.).normalize(), epsilon = 1e-6);
    }

    #[test]
    fn uniform_volumes_are_empty() {
        for d in [1., -1.] {
            let mesh = compute_mesh(&Volume::new(4, vec![d; 64]).unwrap()).unwrap();
            assert_eq!(mesh.vertex_count(), 0);
            assert_eq!(mesh.triangle_count(), 0);
            assert!(mesh.normals.is_empty());
        }
    }

    #[test]
    fn malformed_volumes_are_rejected_before_meshing() {
        let volume = Volume::new(2, vec![-1.; 8]).unwrap().with_spacing(-1.);
        assert!(matches!(compute_mesh(&volume), Err(IsosurfaceError::InvalidVolume(_))));
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let volume = sphere(12, 3.7);
        let parallel = compute_mesh(&volume).unwrap();
        let sequential = compute_mesh_with(
            &volume,
            &ExtractConfig {
                parallel: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!parallel.is_empty());
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn normals_follow_the_gradient_outward() {
        let volume = sphere(10, 3.2);
        let mesh = compute_mesh(&volume).unwrap();
        assert_eq!(mesh.normals.len(), mesh.vertex_count());
        let center = Point::new(4.5, 4.5, 4.5);
        for (v, n) in mesh.vertices.iter().zip(&mesh.normals) {
            let outward = (Point::from(*v) - center).normalize();
            assert!(Vector::from(*n).dot(&outward) > 0.9);
        }
    }

    #[test]
    fn normals_can_be_disabled() {
        let config = ExtractConfig {
            compute_normals: false,
            ..Default::default()
        };
        let mesh = compute_mesh_with(&sphere(6, 1.6), &config).unwrap();
        assert!(!mesh.is_empty());
        assert!(mesh.normals.is_empty());
    }

    #[test]
    fn cell_geometry_maps_triangles_onto_crossings() {
        let volume = Volume::new(2, vec![-1., 1., 1., 1., 1., 1., 1., 1.]).unwrap();
        let class = classify_cell(&volume, [0, 0, 0]).unwrap();
        let geometry = cell_geometry(&volume, &class, false).unwrap();

        assert_eq!(geometry.crossings.len(), 3);
        assert_eq!(geometry.triangles, vec![[0, 1, 2]]);
        let keys: Vec<_> = geometry.crossings.iter().map(|c| c.key.endpoints()).collect();
        assert_eq!(keys, vec![(0, 1), (0, 2), (0, 4)]);
    }
}
