use crate::geo::GeoBounds;

/// Ray-casting point-in-polygon test on (lon, lat) pairs.
/// The ring may be open or closed.
pub fn point_in_polygon(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let (x, y) = point;
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);

    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether a drawn lasso catches a footprint: the boxes overlap and at least
/// one footprint vertex lies inside the lasso.
pub fn lasso_hits(lasso: &[(f64, f64)], lasso_bounds: &GeoBounds, footprint: &[(f64, f64)], footprint_bounds: &GeoBounds) -> bool {
    if !lasso_bounds.intersects(footprint_bounds) {
        return false;
    }
    footprint.iter().any(|&p| point_in_polygon(p, lasso))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
    }

    #[test]
    fn test_point_in_square() {
        let sq = unit_square();
        assert!(point_in_polygon((0.5, 0.5), &sq));
        assert!(!point_in_polygon((1.5, 0.5), &sq));
        assert!(!point_in_polygon((0.5, -0.1), &sq));
    }

    #[test]
    fn test_concave_polygon() {
        // U shape opening upward
        let u = vec![
            (0.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (2.0, 3.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ];
        assert!(point_in_polygon((0.5, 2.0), &u));
        assert!(!point_in_polygon((1.5, 2.0), &u));
        assert!(point_in_polygon((1.5, 0.5), &u));
    }

    #[test]
    fn test_empty_ring() {
        assert!(!point_in_polygon((0.0, 0.0), &[]));
    }

    #[test]
    fn test_lasso_hits_requires_vertex_inside() {
        let lasso = unit_square();
        let lasso_bounds = GeoBounds::new(0.0, 1.0, 0.0, 1.0);

        let inside = vec![(0.8, 0.8), (1.2, 0.8), (1.2, 1.2), (0.8, 1.2)];
        let inside_bounds = GeoBounds::new(0.8, 1.2, 0.8, 1.2);
        assert!(lasso_hits(&lasso, &lasso_bounds, &inside, &inside_bounds));

        let far = vec![(5.0, 5.0), (6.0, 5.0), (6.0, 6.0)];
        let far_bounds = GeoBounds::new(5.0, 6.0, 5.0, 6.0);
        assert!(!lasso_hits(&lasso, &lasso_bounds, &far, &far_bounds));
    }
}
