//! Homography estimator using a normalised 4-point DLT.

use nalgebra::{DMatrix, DVector, Matrix3};

use crate::core::Estimator;
use crate::models::{Homography, MIN_HOMOGENEOUS_SCALE};
use crate::types::DataMatrix;
use crate::utils::{cross2, gauss_elimination};

/// Collinearity tolerance on twice the triangle area, in normalised units.
const COLLINEAR_EPS: f64 = 1e-9;

/// Homography estimator: Gaussian elimination for minimal samples, SVD least
/// squares for over-determined ones. Both fix `h33 = 1` and work in
/// Hartley-normalised coordinates.
///
/// Models are accepted only when `|det(H)|` lies strictly inside
/// `(1e-6, 1e6)`. With `h33 = 1` a uniform scaling by `s` has determinant
/// `s^2`, so exact homographies that shrink by 1000 or more, or magnify by
/// 1000 or more, are rejected as degenerate. Image-to-image registration
/// stays far inside that range.
pub struct HomographyEstimator {
    min_det: f64,
    max_det: f64,
}

impl Default for HomographyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl HomographyEstimator {
    pub fn new() -> Self {
        Self {
            min_det: 1e-6,
            max_det: 1e6,
        }
    }

    fn build_system(
        data: &DataMatrix,
        sample: &[usize],
        t_src: &Matrix3<f64>,
        t_dst: &Matrix3<f64>,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let n = sample.len();
        let mut coefficients = DMatrix::<f64>::zeros(2 * n, 8);
        let mut inhomogeneous = DVector::<f64>::zeros(2 * n);

        for (i, &idx) in sample.iter().enumerate() {
            let (x1, y1) = apply(t_src, data[(idx, 0)], data[(idx, 1)]);
            let (x2, y2) = apply(t_dst, data[(idx, 2)], data[(idx, 3)]);

            let r = 2 * i;
            coefficients[(r, 0)] = -x1;
            coefficients[(r, 1)] = -y1;
            coefficients[(r, 2)] = -1.0;
            coefficients[(r, 6)] = x2 * x1;
            coefficients[(r, 7)] = x2 * y1;
            inhomogeneous[r] = -x2;

            coefficients[(r + 1, 3)] = -x1;
            coefficients[(r + 1, 4)] = -y1;
            coefficients[(r + 1, 5)] = -1.0;
            coefficients[(r + 1, 6)] = y2 * x1;
            coefficients[(r + 1, 7)] = y2 * y1;
            inhomogeneous[r + 1] = -y2;
        }

        (coefficients, inhomogeneous)
    }

    /// Undo the normalisation and rescale so that `h33 = 1`.
    fn denormalise(
        h: &DVector<f64>,
        t_src: &Matrix3<f64>,
        t_dst: &Matrix3<f64>,
    ) -> Option<Homography> {
        if h.iter().any(|x| !x.is_finite()) {
            return None;
        }
        let hn = Homography::from_parameters(h.as_slice()).h;
        let t_dst_inv = t_dst.try_inverse()?;
        let full = t_dst_inv * hn * t_src;
        let scale = full[(2, 2)];
        if scale.abs() < MIN_HOMOGENEOUS_SCALE {
            return None;
        }
        Some(Homography::new(full / scale))
    }

    fn estimate_minimal_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Homography> {
        let (t_src, t_dst) = match normalising_transforms(data, sample) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let (a, b) = Self::build_system(data, sample, &t_src, &t_dst);

        // Square 8x8 system solved as [A | b].
        let mut augmented = DMatrix::<f64>::zeros(8, 9);
        augmented.view_mut((0, 0), (8, 8)).copy_from(&a);
        augmented.set_column(8, &b);

        let mut h = DVector::<f64>::zeros(8);
        if !gauss_elimination(&mut augmented, &mut h) {
            return Vec::new();
        }

        Self::denormalise(&h, &t_src, &t_dst).into_iter().collect()
    }
}

impl Estimator for HomographyEstimator {
    type Model = Homography;

    fn sample_size(&self) -> usize {
        4
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        if sample.len() < self.sample_size() {
            return false;
        }
        for i in 0..sample.len() {
            for j in (i + 1)..sample.len() {
                if sample[i] == sample[j] {
                    return false;
                }
            }
        }

        // Any three collinear points in either image make the minimal system
        // rank deficient.
        let (t_src, t_dst) = match normalising_transforms(data, sample) {
            Some(t) => t,
            None => return false,
        };
        for (t, cx, cy) in [(&t_src, 0, 1), (&t_dst, 2, 3)] {
            let pts: Vec<(f64, f64)> = sample
                .iter()
                .map(|&idx| apply(t, data[(idx, cx)], data[(idx, cy)]))
                .collect();
            for a in 0..pts.len() {
                for b in (a + 1)..pts.len() {
                    for c in (b + 1)..pts.len() {
                        let area = cross2(
                            pts[a].0, pts[a].1, pts[b].0, pts[b].1, pts[c].0, pts[c].1,
                        );
                        if area.abs() < COLLINEAR_EPS {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        let n = sample.len();
        if n < self.sample_size() {
            return Vec::new();
        }
        if n == self.sample_size() {
            return self.estimate_minimal_model(data, sample);
        }
        self.estimate_model_nonminimal(data, sample)
    }

    fn estimate_model_nonminimal(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        if sample.len() < self.sample_size() {
            return Vec::new();
        }
        let (t_src, t_dst) = match normalising_transforms(data, sample) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let (a, b) = Self::build_system(data, sample, &t_src, &t_dst);

        // Least squares through the SVD; QR in nalgebra only solves square systems.
        let h = match a.svd(true, true).solve(&b, 1e-12) {
            Ok(h) => h,
            Err(_) => return Vec::new(),
        };

        Self::denormalise(&h, &t_src, &t_dst).into_iter().collect()
    }

    fn is_valid_model(
        &self,
        model: &Homography,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        let det = model.h.determinant().abs();
        det.is_finite() && det > self.min_det && det < self.max_det
    }
}

fn apply(t: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    // Similarity transforms only; the homogeneous row is (0, 0, 1).
    (
        t[(0, 0)] * x + t[(0, 1)] * y + t[(0, 2)],
        t[(1, 0)] * x + t[(1, 1)] * y + t[(1, 2)],
    )
}

/// Hartley normalisation for the src and dst columns of `sample`: centroid to
/// the origin, mean distance `sqrt(2)`. `None` if all points coincide.
fn normalising_transforms(
    data: &DataMatrix,
    sample: &[usize],
) -> Option<(Matrix3<f64>, Matrix3<f64>)> {
    let column_pair = |cx: usize, cy: usize| -> Option<Matrix3<f64>> {
        let n = sample.len() as f64;
        let (mut mx, mut my) = (0.0, 0.0);
        for &idx in sample {
            mx += data[(idx, cx)];
            my += data[(idx, cy)];
        }
        mx /= n;
        my /= n;

        let mean_dist = sample
            .iter()
            .map(|&idx| (data[(idx, cx)] - mx).hypot(data[(idx, cy)] - my))
            .sum::<f64>()
            / n;
        if !mean_dist.is_finite() || mean_dist < f64::EPSILON {
            return None;
        }

        let s = std::f64::consts::SQRT_2 / mean_dist;
        Some(Matrix3::new(s, 0.0, -s * mx, 0.0, s, -s * my, 0.0, 0.0, 1.0))
    };

    Some((column_pair(0, 1)?, column_pair(2, 3)?))
}
