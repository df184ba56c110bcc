//! Small numeric helpers shared by the sampler and the homography solver.

use nalgebra::{DMatrix, DVector};
use rand::distributions::uniform::SampleUniform;
use rand::distributions::Uniform;
use rand::prelude::*;

/// Uniform integer random-number generator.
///
/// Production code seeds from system entropy; tests and reproducible batch
/// runs construct it from a fixed seed.
pub struct UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    rng: StdRng,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            _marker: std::marker::PhantomData,
        }
    }

    /// Fill `out` with distinct values from `[min, max]`.
    ///
    /// Rejection sampling; intended for the small sample sizes of minimal
    /// solvers. The caller guarantees the range holds at least `out.len()`
    /// values.
    pub fn gen_unique(&mut self, out: &mut [T], min: T, max: T)
    where
        T: Eq,
    {
        let dist = Uniform::new_inclusive(min, max);
        for i in 0..out.len() {
            loop {
                let candidate = self.rng.sample(&dist);
                if out[..i].iter().all(|&v| v != candidate) {
                    out[i] = candidate;
                    break;
                }
            }
        }
    }
}

/// Gaussian elimination with partial pivoting to solve `A * x = b`.
///
/// `augmented` is `[A | b]` with `A` square. Returns `false` for a
/// (numerically) singular system, leaving `result` unspecified.
pub fn gauss_elimination(augmented: &mut DMatrix<f64>, result: &mut DVector<f64>) -> bool {
    let n = augmented.nrows();
    if n + 1 != augmented.ncols() || n != result.len() {
        return false;
    }

    for i in 0..n {
        let mut max_row = i;
        let mut max_val = augmented[(i, i)].abs();
        for k in (i + 1)..n {
            let val = augmented[(k, i)].abs();
            if val > max_val {
                max_val = val;
                max_row = k;
            }
        }

        if max_row != i {
            augmented.swap_rows(i, max_row);
        }

        if augmented[(i, i)].abs() < 1e-10 {
            return false;
        }

        for k in (i + 1)..n {
            let factor = augmented[(k, i)] / augmented[(i, i)];
            for j in i..=n {
                augmented[(k, j)] -= factor * augmented[(i, j)];
            }
        }
    }

    for i in (0..n).rev() {
        result[i] = augmented[(i, n)];
        for j in (i + 1)..n {
            result[i] -= augmented[(i, j)] * result[j];
        }
        result[i] /= augmented[(i, i)];
    }

    true
}

/// Twice the signed area of triangle `(a, b, c)`.
pub fn cross2(ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64) -> f64 {
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_samples_within_bounds() {
        let mut rng = UniformRandomGenerator::<u32>::from_seed(1234);
        let mut buf = [0u32; 5];
        rng.gen_unique(&mut buf, 0, 10);

        assert!(buf.iter().all(|&v| v <= 10));
        for i in 0..buf.len() {
            for j in (i + 1)..buf.len() {
                assert_ne!(buf[i], buf[j]);
            }
        }
    }

    #[test]
    fn deterministic_with_same_seed() {
        let mut rng1 = UniformRandomGenerator::<u32>::from_seed(42);
        let mut rng2 = UniformRandomGenerator::<u32>::from_seed(42);
        let (mut a, mut b) = ([0u32; 4], [0u32; 4]);
        for _ in 0..10 {
            rng1.gen_unique(&mut a, 0, 100);
            rng2.gen_unique(&mut b, 0, 100);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn gauss_solves_small_system() {
        // x + y = 3, x - y = 1
        let mut aug = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 3.0, 1.0, -1.0, 1.0]);
        let mut x = DVector::zeros(2);
        assert!(gauss_elimination(&mut aug, &mut x));
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gauss_reports_singular_system() {
        let mut aug = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
        let mut x = DVector::zeros(2);
        assert!(!gauss_elimination(&mut aug, &mut x));
    }
}
