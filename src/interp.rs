use crate::types::{Point, Value, Vector};

// Return the interpolation factor t corresponding to iso_val
pub fn find_t(v0: Value, v1: Value, iso_val: Value) -> Value {
    (iso_val - v0) / (v1 - v0)
}

// Linearly interpolate between two points by factor t
pub fn interpolate_points(p0: Point, p1: Point, t: Value) -> Point {
    p0 + (p1 - p0) * t
}

// Linearly interpolate between two vectors by factor t
pub fn interpolate_vectors(v0: Vector, v1: Vector, t: Value) -> Vector {
    v0 + (v1 - v0) * t
}

/// Returns the factor along `p0 → p1` where the field crosses `iso_val`.
///
/// Equal endpoint values give `0.5`. The factor is clamped to `[0, 1]` so
/// rounding can never push a crossing off its edge.
#[inline]
pub fn crossing_t(d0: Value, d1: Value, iso_val: Value) -> Value {
    if d0 == d1 {
        return 0.5;
    }
    find_t(d0, d1, iso_val).clamp(0., 1.)
}

/// Zero crossing of the edge `p0 → p1` whose endpoints hold `d0` and `d1`.
#[inline]
pub fn edge_crossing(p0: Point, d0: Value, p1: Point, d1: Value, iso_val: Value) -> Point {
    interpolate_points(p0, p1, crossing_t(d0, d1, iso_val))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn symmetric_distances_cross_at_the_midpoint() {
        let p = edge_crossing(Point::new(0., 0., 0.), -1., Point::new(2., 0., 0.), 1., 0.);
        assert_relative_eq!(p, Point::new(1., 0., 0.));
    }

    #[test]
    fn crossing_is_weighted_by_distance() {
        let p = edge_crossing(Point::new(0., 0., 0.), -1., Point::new(0., 0., 4.), 3., 0.);
        assert_relative_eq!(p, Point::new(0., 0., 1.));

        let p = edge_crossing(Point::new(0., 0., 0.), 0.5, Point::new(0., 1., 0.), 1.5, 1.);
        assert_relative_eq!(p, Point::new(0., 0.5, 0.));
    }

    #[test]
    fn equal_distances_pick_the_midpoint() {
        let p = edge_crossing(Point::new(0., 0., 0.), 0., Point::new(0., 2., 0.), 0., 0.);
        assert_relative_eq!(p, Point::new(0., 1., 0.));
    }

    #[test]
    fn crossing_stays_on_the_edge() {
        assert_eq!(crossing_t(-1., -0.5, 0.), 1.);
        assert_eq!(crossing_t(1., 2., 0.), 0.);
        assert_eq!(crossing_t(-1., 0., 0.), 1.);
    }
}
