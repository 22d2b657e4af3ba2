use crate::numerics::linalg::norm_inf;
use crate::numerics::try_zeroed;

/// Relative step used when the caller does not provide one.
pub const DEFAULT_RELATIVE_STEP_SIZE: f64 = 1e-6;

/// Options for the central-difference Jacobian.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumericDiffOptions {
    /// Perturbation of `x_j` is `relative_step_size * |x_j|`, or
    /// `relative_step_size` itself when `x_j == 0`.
    pub relative_step_size: f64,
}

impl Default for NumericDiffOptions {
    fn default() -> Self {
        Self {
            relative_step_size: DEFAULT_RELATIVE_STEP_SIZE,
        }
    }
}

impl NumericDiffOptions {
    /// Use `rel` when it is finite and larger than the default; smaller steps
    /// make the central difference dominated by rounding.
    pub fn with_relative_step_size(rel: f64) -> Self {
        if rel.is_finite() && rel > DEFAULT_RELATIVE_STEP_SIZE {
            Self {
                relative_step_size: rel,
            }
        } else {
            Self::default()
        }
    }

    fn step_for(&self, xj: f64) -> f64 {
        let h = self.relative_step_size * xj.abs();
        if h == 0.0 {
            self.relative_step_size
        } else {
            h
        }
    }
}

/// Scratch buffers for [`CentralDifference`].
#[derive(Clone, Debug)]
pub struct CentralDifference {
    options: NumericDiffOptions,
    x_step: Vec<f64>,
    r_plus: Vec<f64>,
    r_minus: Vec<f64>,
}

impl CentralDifference {
    /// `None` if the scratch buffers cannot be allocated.
    pub fn try_new(options: NumericDiffOptions, m: usize, n: usize) -> Option<Self> {
        Some(Self {
            options,
            x_step: try_zeroed(n)?,
            r_plus: try_zeroed(m)?,
            r_minus: try_zeroed(m)?,
        })
    }

    /// Fill `j` (m x n, row-major) with central differences of `residual_fn`
    /// around `x`.
    ///
    /// Returns `false` as soon as one evaluation fails or produces a
    /// non-finite residual.
    pub fn jacobian<R>(&mut self, x: &[f64], residual_fn: &mut R, j: &mut [f64]) -> bool
    where
        R: FnMut(&[f64], &mut [f64]) -> bool,
    {
        let n = x.len();
        let m = self.r_plus.len();
        debug_assert_eq!(j.len(), m * n);

        self.x_step.copy_from_slice(x);
        for col in 0..n {
            let h = self.options.step_for(x[col]);

            self.x_step[col] = x[col] + h;
            if !residual_fn(&self.x_step, &mut self.r_plus) {
                return false;
            }
            self.x_step[col] = x[col] - h;
            if !residual_fn(&self.x_step, &mut self.r_minus) {
                return false;
            }
            self.x_step[col] = x[col];

            let inv = 0.5 / h;
            for row in 0..m {
                j[row * n + col] = (self.r_plus[row] - self.r_minus[row]) * inv;
            }
        }

        norm_inf(j).is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_difference_is_exact_for_quadratics() {
        // r0 = x0^2 + x1, r1 = 3 x1
        let mut residual = |x: &[f64], r: &mut [f64]| {
            r[0] = x[0] * x[0] + x[1];
            r[1] = 3.0 * x[1];
            true
        };
        let mut diff = CentralDifference::try_new(NumericDiffOptions::default(), 2, 2).unwrap();
        let mut j = [0.0; 4];
        assert!(diff.jacobian(&[2.0, 0.0], &mut residual, &mut j));
        let expected = [4.0, 1.0, 0.0, 3.0];
        for (got, want) in j.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{j:?}");
        }
    }

    #[test]
    fn failed_evaluation_aborts_jacobian() {
        let mut residual = |_x: &[f64], _r: &mut [f64]| false;
        let mut diff = CentralDifference::try_new(NumericDiffOptions::default(), 1, 1).unwrap();
        let mut j = [0.0];
        assert!(!diff.jacobian(&[1.0], &mut residual, &mut j));
    }

    #[test]
    fn steps_at_or_below_the_default_keep_the_default() {
        for rel in [0.0, -1.0, 1e-9, DEFAULT_RELATIVE_STEP_SIZE, f64::NAN] {
            assert_eq!(
                NumericDiffOptions::with_relative_step_size(rel),
                NumericDiffOptions::default(),
                "{rel}"
            );
        }
        assert_eq!(
            NumericDiffOptions::with_relative_step_size(1e-4).relative_step_size,
            1e-4
        );
    }
}
