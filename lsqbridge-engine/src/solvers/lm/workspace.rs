use crate::numerics::try_zeroed;

/// Buffers for one solve. The damped normal equations are formed on the
/// smaller side of J: `J J^T` (m x m) when m <= n, `J^T J` (n x n) otherwise.
pub(super) struct LmWorkspace {
    pub(super) dim: usize, // min(m, n)
    pub(super) r: Vec<f64>,
    pub(super) j: Vec<f64>, // row-major (m x n)
    pub(super) a: Vec<f64>, // (dim x dim)
    pub(super) y: Vec<f64>, // dim
    pub(super) g: Vec<f64>, // J^T r
    pub(super) dx: Vec<f64>,
    pub(super) x_trial: Vec<f64>,
    pub(super) r_trial: Vec<f64>,
}

impl LmWorkspace {
    /// `None` if the buffers cannot be allocated.
    pub(super) fn try_new(m: usize, n: usize) -> Option<Self> {
        let dim = m.min(n);
        let j = try_zeroed(m.checked_mul(n)?)?;
        let a = try_zeroed(dim.checked_mul(dim)?)?;
        Some(Self {
            dim,
            r: try_zeroed(m)?,
            j,
            a,
            y: try_zeroed(dim)?,
            g: try_zeroed(n)?,
            dx: try_zeroed(n)?,
            x_trial: try_zeroed(n)?,
            r_trial: try_zeroed(m)?,
        })
    }

    /// Whether the step is solved in residual space (`J J^T`).
    pub(super) fn residual_space(&self) -> bool {
        self.dim == self.r.len()
    }
}
