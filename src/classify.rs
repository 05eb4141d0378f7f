use crate::{
    error::Result,
    tables::{EDGE_TABLE, TRI_TABLE},
    types::{LatticeIndex, Value},
    volume::Volume,
};

/// Corners of each cell face, in cyclic order.
///
/// Faces are ordered `z = 0`, `z = 1`, `y = 0`, `y = 1`, `x = 0`, `x = 1`.
pub const FACE_CORNERS: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [3, 2, 6, 7],
    [0, 3, 7, 4],
    [1, 2, 6, 5],
];

/// Everything the edge interpolator needs to know about one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellClass {
    /// Lattice index of the cell's lowest corner.
    pub cell: LatticeIndex,
    /// 8-bit sign configuration (bit `i` set when corner `i` is inside).
    pub state: u8,
    /// Lattice indices of the 8 corners, in table order.
    pub corners: [LatticeIndex; 8],
    /// Distances at the 8 corners, in table order.
    pub values: [Value; 8],
}

impl CellClass {
    /// 12-bit mask of the edges crossed by the surface.
    pub fn edges_mask(&self) -> u16 {
        edges_mask(self.state)
    }

    pub fn is_trivial(&self) -> bool {
        is_trivial(self.state)
    }
}

/// Computes the marching cubes state bitmask for a cell.
///
/// Each of the 8 corners maps to one bit. A bit is set when the corner's value
/// is **strictly below** the threshold (i.e. "inside" the surface):
///
/// ```text
/// corner index:  7  6  5  4  3  2  1  0
/// state bits:   [_][_][_][_][_][_][_][_]
///                                      ^-- corner 0 inside?
/// ```
#[inline]
pub fn get_state(corner_values: &[Value; 8], threshold: Value) -> u8 {
    corner_values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v < threshold)
        .fold(0, |state, (i, _)| state | (1u8 << i))
}

/// All corners on the same side of the surface: the cell emits nothing.
#[inline]
pub fn is_trivial(state: u8) -> bool {
    state == 0x00 || state == 0xFF
}

#[inline]
pub fn edges_mask(state: u8) -> u16 {
    EDGE_TABLE[state as usize]
}

/// Returns the triangle fan of `state` as edge triples, wound to face outward.
///
/// `TRI_TABLE[state]` contains edge indices in groups of three, terminated by `-1`:
/// ```text
/// TRI_TABLE[state] = [e0, e1, e2,  e3, e4, e5,  -1, ...]
///                     \___tri0__/   \___tri1__/
/// ```
/// Each triple is emitted as `[e0, e2, e1]`, so the face normal points toward
/// the outside corners.
pub fn triangle_edges(state: u8) -> impl Iterator<Item = [usize; 3]> {
    TRI_TABLE[state as usize]
        .chunks_exact(3)
        .take_while(|tri| tri[0] != -1)
        .map(|tri| [tri[0] as usize, tri[2] as usize, tri[1] as usize])
}

/// Bitmask of the faces whose corners alternate inside/outside around the face.
///
/// On such a face the table always separates the two inside corners. The rule
/// depends only on the face itself, so both cells sharing it agree.
pub fn ambiguous_faces(state: u8) -> u8 {
    let inside = |corner: usize| state & (1u8 << corner) != 0;
    FACE_CORNERS
        .iter()
        .enumerate()
        .filter(|(_, [a, b, c, d])| {
            inside(*a) == inside(*c) && inside(*b) == inside(*d) && inside(*a) != inside(*b)
        })
        .fold(0, |mask, (face, _)| mask | (1u8 << face))
}

/// Reads the 8 corners of `cell` and classifies them against the volume's threshold.
///
/// Fails with [`OutOfBounds`](crate::error::IsosurfaceError::OutOfBounds) when
/// the cell does not lie fully inside the lattice.
pub fn classify_cell(volume: &Volume, cell: LatticeIndex) -> Result<CellClass> {
    let corners = volume.cell_corner_indices(cell);
    let mut values = [0.; 8];
    for (value, &corner) in values.iter_mut().zip(corners.iter()) {
        *value = volume.value(corner)?;
    }
    let state = get_state(&values, volume.threshold());
    Ok(CellClass {
        cell,
        state,
        corners,
        values,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{error::IsosurfaceError, tables::CORNER_POINT_INDICES};

    fn edge_between(a: usize, b: usize) -> usize {
        CORNER_POINT_INDICES
            .iter()
            .position(|&[p, q]| {
                let (p, q) = (p as usize, q as usize);
                (p, q) == (a, b) || (p, q) == (b, a)
            })
            .unwrap()
    }

    #[test]
    fn state_sets_a_bit_per_inside_corner() {
        let values = [-1., 1., 1., 1., 1., 1., -0.5, 1.];
        assert_eq!(get_state(&values, 0.), 0b0100_0001);
        assert_eq!(get_state(&[0.; 8], 0.), 0);
        assert_eq!(get_state(&[0.; 8], 0.5), 0xFF);
    }

    #[test]
    fn uniform_cells_are_trivial() {
        assert!(is_trivial(0x00));
        assert!(is_trivial(0xFF));
        assert!(!is_trivial(0x01));
        assert_eq!(triangle_edges(0x00).count(), 0);
        assert_eq!(triangle_edges(0xFF).count(), 0);
    }

    #[test]
    fn every_other_state_emits_geometry() {
        for state in 1..=254u8 {
            assert_ne!(edges_mask(state), 0, "state {state:#04x}");
            assert!(triangle_edges(state).count() > 0, "state {state:#04x}");
        }
    }

    #[test]
    fn triangles_only_use_crossed_edges() {
        for state in 0..=255u8 {
            let mask = edges_mask(state);
            let used = triangle_edges(state)
                .flatten()
                .fold(0u16, |used, edge| used | (1u16 << edge));
            assert_eq!(used, mask, "state {state:#04x}");
        }
    }

    #[test]
    fn single_inside_corner_is_cut_off() {
        let tris: Vec<_> = triangle_edges(0x01).collect();
        assert_eq!(tris, vec![[0, 3, 8]]);
    }

    #[test]
    fn checkerboard_faces_are_reported() {
        // corners 0 and 2 share face z = 0 diagonally
        assert_eq!(ambiguous_faces(0b0000_0101), 0b0000_0001);
        assert_eq!(ambiguous_faces(0x01), 0);
        // full checkerboard: every face is ambiguous
        assert_eq!(ambiguous_faces(0b0101_1010), 0b0011_1111);
    }

    #[test]
    fn ambiguous_faces_always_separate_inside_corners() {
        for state in 1..=254u8 {
            let mut segments: HashMap<(usize, usize), usize> = HashMap::new();
            for [a, b, c] in triangle_edges(state) {
                for (p, q) in [(a, b), (b, c), (c, a)] {
                    *segments.entry((p.min(q), p.max(q))).or_default() += 1;
                }
            }

            let faces = ambiguous_faces(state);
            for (face, corners) in FACE_CORNERS.iter().enumerate() {
                if faces & (1u8 << face) == 0 {
                    continue;
                }
                for k in 0..4 {
                    let corner = corners[k];
                    if state & (1u8 << corner) == 0 {
                        continue;
                    }
                    let e1 = edge_between(corner, corners[(k + 1) % 4]);
                    let e2 = edge_between(corner, corners[(k + 3) % 4]);
                    let count = segments.get(&(e1.min(e2), e1.max(e2))).copied().unwrap_or(0);
                    assert_eq!(count % 2, 1, "state {state:#04x} face {face} corner {corner}");
                }
            }
        }
    }

    #[test]
    fn classifies_cells_from_the_volume() {
        let mut distances = vec![1.; 27];
        distances[13] = -1.; // lattice (1, 1, 1)
        let volume = Volume::new(3, distances).unwrap();

        let class = classify_cell(&volume, [0, 0, 0]).unwrap();
        assert_eq!(class.state, 1 << 6);
        assert_eq!(class.corners[6], [1, 1, 1]);
        assert_eq!(class.values[6], -1.);

        let class = classify_cell(&volume, [1, 1, 1]).unwrap();
        assert_eq!(class.state, 1 << 0);
    }

    #[test]
    fn cells_past_the_lattice_are_out_of_bounds() {
        let volume = Volume::new(2, vec![1.; 8]).unwrap();
        assert!(matches!(
            classify_cell(&volume, [1, 0, 0]),
            Err(IsosurfaceError::OutOfBounds { .. })
        ));
    }
}
