use nalgebra::Point3;

/// Separation below which two atoms are considered coincident.
pub const COINCIDENCE_EPSILON: f64 = 1e-6;

/// Computes the angle at `vertex` formed by `left` and `right`, in degrees.
///
/// Returns 0.0 for degenerate input where either arm has zero length.
pub fn angle_deg(left: &Point3<f64>, vertex: &Point3<f64>, right: &Point3<f64>) -> f64 {
    let u = left - vertex;
    let v = right - vertex;
    let denom = u.norm() * v.norm();
    if denom < COINCIDENCE_EPSILON {
        return 0.0;
    }
    let cosine = (u.dot(&v) / denom).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// Returns `true` if two positions are separated by less than
/// [`COINCIDENCE_EPSILON`].
pub fn are_coincident(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    (a - b).norm() < COINCIDENCE_EPSILON
}

/// Arithmetic mean of a set of positions.
///
/// Returns `None` for an empty slice.
pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn right_angle_is_ninety_degrees() {
        let vertex = Point3::origin();
        let left = Point3::new(1.0, 0.0, 0.0);
        let right = Point3::new(0.0, 1.0, 0.0);
        assert!((angle_deg(&left, &vertex, &right) - 90.0).abs() < TOLERANCE);
    }

    #[test]
    fn collinear_points_give_straight_angle() {
        let vertex = Point3::origin();
        let left = Point3::new(-1.0, 0.0, 0.0);
        let right = Point3::new(2.0, 0.0, 0.0);
        assert!((angle_deg(&left, &vertex, &right) - 180.0).abs() < TOLERANCE);
    }

    #[test]
    fn degenerate_arm_yields_zero() {
        let vertex = Point3::origin();
        let left = Point3::origin();
        let right = Point3::new(1.0, 0.0, 0.0);
        assert_eq!(angle_deg(&left, &vertex, &right), 0.0);
    }

    #[test]
    fn coincidence_check_uses_epsilon() {
        let a = Point3::new(1.0, 1.0, 1.0);
        let b = Point3::new(1.0, 1.0, 1.0 + 1e-9);
        assert!(are_coincident(&a, &b));
        assert!(!are_coincident(&a, &Point3::new(1.0, 1.0, 2.0)));
    }

    #[test]
    fn centroid_averages_positions() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
        ];
        let c = centroid(&points).unwrap();
        assert!((c.x - 1.0).abs() < TOLERANCE);
        assert!((c.y - 1.0).abs() < TOLERANCE);
        assert!(centroid(&[]).is_none());
    }
}
