// THEORY:
// An egg's outline is close to an ellipse, so its size is read off a least-squares
// ellipse fit of the contour rather than off the raw pixel extent.
//
// Key principles:
// 1.  **Normalize First**: points are shifted to their centroid and scaled to unit
//     RMS distance before fitting. The conic coefficients then live on comparable
//     scales and the least-squares system stays well conditioned for contours of
//     any size.
// 2.  **Algebraic Fit**: the conic `A u^2 + B uv + C v^2 + D u + E v = 1` is solved
//     in the least-squares sense through an SVD. Because the centroid lies inside
//     any closed outline, the constant term can be pinned to -1 without loss.
// 3.  **Ellipse Or Nothing**: the result must be a real ellipse. A rank-deficient
//     system (collinear or duplicated points), a conic with `4AC - B^2 <= 0`
//     (parabola or hyperbola) or an imaginary ellipse are reported as infeasible
//     rather than coerced into numbers.
// 4.  **Self-Consistent Geometry**: the reported axes, the orientation and the
//     outline polygon all come from the same eigen-decomposition, so the bounding
//     box traced from the polygon always matches the reported axes.

use crate::core_modules::contour::{bounding_region, MIN_ELLIPSE_POINTS};
use crate::core_modules::region::Region;
use crate::error::SizeError;
use imageproc::point::Point;
use nalgebra::{DMatrix, DVector, Matrix2, SymmetricEigen, Vector2};
use serde::{Deserialize, Serialize};

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-9;

/// A fitted ellipse in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseFit {
    pub center_x: f64,
    pub center_y: f64,
    /// Full length of the axis pointing along `angle_degrees`.
    pub axis_a: f64,
    /// Full length of the perpendicular axis.
    pub axis_b: f64,
    /// Orientation of `axis_a`, in degrees within [0, 180).
    pub angle_degrees: f64,
}

impl EllipseFit {
    pub fn major_axis(&self) -> f64 {
        self.axis_a.max(self.axis_b)
    }

    pub fn minor_axis(&self) -> f64 {
        self.axis_a.min(self.axis_b)
    }

    /// Integer outline points sampled every `step_degrees` around the ellipse.
    pub fn polygon(&self, step_degrees: u32) -> Vec<Point<i32>> {
        let step = step_degrees.max(1);
        let (sin_t, cos_t) = self.angle_degrees.to_radians().sin_cos();
        let half_a = self.axis_a / 2.0;
        let half_b = self.axis_b / 2.0;

        (0..360)
            .step_by(step as usize)
            .map(|deg| {
                let (sin_p, cos_p) = (deg as f64).to_radians().sin_cos();
                let x = self.center_x + half_a * cos_p * cos_t - half_b * sin_p * sin_t;
                let y = self.center_y + half_a * cos_p * sin_t + half_b * sin_p * cos_t;
                Point::new(x.round() as i32, y.round() as i32)
            })
            .collect()
    }

    /// Inclusive integer bounding box of the outline sampled at one degree.
    pub fn bounding_box(&self) -> Option<Region> {
        bounding_region(self.polygon(1).into_iter().map(|p| (p.x, p.y)))
    }
}

/// Fits an ellipse to contour points.
pub fn fit_ellipse(points: &[Point<i32>]) -> Result<EllipseFit, SizeError> {
    if points.len() < MIN_ELLIPSE_POINTS {
        return Err(SizeError::EllipseFitInfeasible(format!(
            "{} points, at least {MIN_ELLIPSE_POINTS} required",
            points.len()
        )));
    }

    // --- 1. Normalize ---
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y as f64).sum::<f64>() / n;
    let spread = (points
        .iter()
        .map(|p| (p.x as f64 - mean_x).powi(2) + (p.y as f64 - mean_y).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    if spread <= f64::EPSILON {
        return Err(SizeError::EllipseFitInfeasible("all points coincide".into()));
    }
    let normalized: Vec<(f64, f64)> = points
        .iter()
        .map(|p| ((p.x as f64 - mean_x) / spread, (p.y as f64 - mean_y) / spread))
        .collect();

    // --- 2. Least-squares conic ---
    let design = DMatrix::from_fn(normalized.len(), 5, |row, col| {
        let (u, v) = normalized[row];
        match col {
            0 => u * u,
            1 => u * v,
            2 => v * v,
            3 => u,
            _ => v,
        }
    });
    let ones = DVector::from_element(normalized.len(), 1.0);
    let svd = design.svd(true, true);
    let largest = svd.singular_values.max();
    if svd.rank(largest * RANK_TOLERANCE) < 5 {
        return Err(SizeError::EllipseFitInfeasible(
            "points do not determine a conic (collinear or repeated)".into(),
        ));
    }
    let coefficients = svd
        .solve(&ones, largest * RANK_TOLERANCE)
        .map_err(|e| SizeError::EllipseFitInfeasible(e.to_string()))?;
    let (a, b, c, d, e) = (
        coefficients[0],
        coefficients[1],
        coefficients[2],
        coefficients[3],
        coefficients[4],
    );

    // --- 3. Ellipse check and center ---
    let discriminant = 4.0 * a * c - b * b;
    if discriminant <= 0.0 {
        return Err(SizeError::EllipseFitInfeasible(format!(
            "conic is not an ellipse (4AC - B^2 = {discriminant:.3e})"
        )));
    }
    let center = Matrix2::new(2.0 * a, b, b, 2.0 * c)
        .try_inverse()
        .map(|inverse| inverse * Vector2::new(-d, -e))
        .ok_or_else(|| SizeError::EllipseFitInfeasible("singular center system".into()))?;
    // Conic value at the center; the ellipse is (p - c)^T Q (p - c) = -value.
    let value_at_center = 0.5 * (d * center.x + e * center.y) - 1.0;

    // --- 4. Axes and orientation ---
    let quadratic = Matrix2::new(a, b / 2.0, b / 2.0, c);
    let eigen = SymmetricEigen::new(quadratic);
    let mut semi_axes = [0.0f64; 2];
    for (i, semi) in semi_axes.iter_mut().enumerate() {
        let squared = -value_at_center / eigen.eigenvalues[i];
        if !(squared.is_finite() && squared > 0.0) {
            return Err(SizeError::EllipseFitInfeasible("imaginary ellipse".into()));
        }
        *semi = squared.sqrt();
    }
    let direction = eigen.eigenvectors.column(0);
    let angle_degrees = direction[1].atan2(direction[0]).to_degrees().rem_euclid(180.0);

    // --- 5. Back to image coordinates ---
    Ok(EllipseFit {
        center_x: center.x * spread + mean_x,
        center_y: center.y * spread + mean_y,
        axis_a: 2.0 * semi_axes[0] * spread,
        axis_b: 2.0 * semi_axes[1] * spread,
        angle_degrees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ellipse(cx: f64, cy: f64, semi_a: f64, semi_b: f64, angle_deg: f64, count: usize) -> Vec<Point<i32>> {
        let (sin_t, cos_t) = angle_deg.to_radians().sin_cos();
        (0..count)
            .map(|i| {
                let phi = i as f64 / count as f64 * std::f64::consts::TAU;
                let x = cx + semi_a * phi.cos() * cos_t - semi_b * phi.sin() * sin_t;
                let y = cy + semi_a * phi.cos() * sin_t + semi_b * phi.sin() * cos_t;
                Point::new(x.round() as i32, y.round() as i32)
            })
            .collect()
    }

    #[test]
    fn recovers_a_rotated_ellipse() {
        let points = sample_ellipse(100.0, 80.0, 50.0, 30.0, 30.0, 120);
        let fit = fit_ellipse(&points).unwrap();

        assert!((fit.center_x - 100.0).abs() < 1.0, "{fit:?}");
        assert!((fit.center_y - 80.0).abs() < 1.0, "{fit:?}");
        assert!((fit.major_axis() - 100.0).abs() < 2.0, "{fit:?}");
        assert!((fit.minor_axis() - 60.0).abs() < 2.0, "{fit:?}");

        let major_angle = if fit.axis_a >= fit.axis_b {
            fit.angle_degrees
        } else {
            (fit.angle_degrees + 90.0) % 180.0
        };
        assert!((major_angle - 30.0).abs() < 3.0, "{fit:?}");
    }

    #[test]
    fn major_is_never_smaller_than_minor() {
        for (a, b) in [(40.0, 20.0), (20.0, 40.0), (25.0, 25.0)] {
            let fit = fit_ellipse(&sample_ellipse(60.0, 60.0, a, b, 0.0, 90)).unwrap();
            assert!(fit.major_axis() >= fit.minor_axis());
        }
    }

    #[test]
    fn too_few_points_is_infeasible() {
        let points = [Point::new(0, 0), Point::new(1, 0), Point::new(0, 1), Point::new(1, 1)];
        assert!(matches!(fit_ellipse(&points), Err(SizeError::EllipseFitInfeasible(_))));
    }

    #[test]
    fn collinear_points_are_infeasible() {
        let points: Vec<_> = (0..20).map(|i| Point::new(i * 3, i * 2 + 1)).collect();
        assert!(matches!(fit_ellipse(&points), Err(SizeError::EllipseFitInfeasible(_))));
    }

    #[test]
    fn bounding_box_matches_axes_for_an_upright_ellipse() {
        let fit = EllipseFit {
            center_x: 50.0,
            center_y: 40.0,
            axis_a: 60.0,
            axis_b: 20.0,
            angle_degrees: 0.0,
        };
        assert_eq!(fit.bounding_box(), Some(Region::new(20, 30, 61, 21)));
        assert_eq!(fit.polygon(90).len(), 4);
    }
}
