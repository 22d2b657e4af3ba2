//! Dense linear algebra on row-major `f64` buffers.
//!
//! Everything here is allocation-free; callers own the buffers.

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(ai, bi)| ai * bi).sum()
}

pub fn norm2(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Max-abs norm. NaN entries propagate instead of being skipped.
pub fn norm_inf(v: &[f64]) -> f64 {
    v.iter()
        .map(|vi| vi.abs())
        .fold(0.0f64, |acc, a| if a > acc || a.is_nan() { a } else { acc })
}

/// out = J J^T + lambda I, where J is (m x n) row-major and out is (m x m).
pub fn jj_t_plus_lambda(j: &[f64], m: usize, n: usize, lambda: f64, out: &mut [f64]) {
    debug_assert_eq!(j.len(), m * n);
    debug_assert_eq!(out.len(), m * m);
    for row in 0..m {
        let ji = &j[row * n..(row + 1) * n];
        for col in row..m {
            let jk = &j[col * n..(col + 1) * n];
            let v = dot(ji, jk);
            out[row * m + col] = v;
            out[col * m + row] = v;
        }
        out[row * m + row] += lambda;
    }
}

/// out = J^T J + lambda I, where J is (m x n) row-major and out is (n x n).
pub fn jt_j_plus_lambda(j: &[f64], m: usize, n: usize, lambda: f64, out: &mut [f64]) {
    debug_assert_eq!(j.len(), m * n);
    debug_assert_eq!(out.len(), n * n);
    out.fill(0.0);
    for row in 0..m {
        let ji = &j[row * n..(row + 1) * n];
        for a in 0..n {
            let jia = ji[a];
            if jia == 0.0 {
                continue;
            }
            for b in a..n {
                out[a * n + b] += jia * ji[b];
            }
        }
    }
    for a in 0..n {
        for b in (a + 1)..n {
            out[b * n + a] = out[a * n + b];
        }
        out[a * n + a] += lambda;
    }
}

/// out = J^T v, where J is (m x n) row-major, v has len m and out has len n.
pub fn jt_mul_vec(j: &[f64], m: usize, n: usize, v: &[f64], out: &mut [f64]) {
    debug_assert_eq!(j.len(), m * n);
    debug_assert_eq!(v.len(), m);
    debug_assert_eq!(out.len(), n);
    out.fill(0.0);
    for row in 0..m {
        let vi = v[row];
        if vi == 0.0 {
            continue;
        }
        let ji = &j[row * n..(row + 1) * n];
        for (o, jik) in out.iter_mut().zip(ji) {
            *o += jik * vi;
        }
    }
}

/// Solve A x = b in place with partial pivoting. `a` is (dim x dim) row-major
/// and is destroyed; `b` holds the solution on success.
///
/// Returns `false` for singular or non-finite systems.
pub fn solve_linear_inplace(a: &mut [f64], b: &mut [f64], dim: usize) -> bool {
    debug_assert_eq!(a.len(), dim * dim);
    debug_assert_eq!(b.len(), dim);

    for col in 0..dim {
        let mut pivot = col;
        let mut pivot_abs = a[col * dim + col].abs();
        for row in (col + 1)..dim {
            let v = a[row * dim + col].abs();
            if v > pivot_abs {
                pivot = row;
                pivot_abs = v;
            }
        }
        if !pivot_abs.is_finite() || pivot_abs <= f64::MIN_POSITIVE {
            return false;
        }

        if pivot != col {
            for k in 0..dim {
                a.swap(col * dim + k, pivot * dim + k);
            }
            b.swap(col, pivot);
        }

        let diag = a[col * dim + col];
        for row in (col + 1)..dim {
            let factor = a[row * dim + col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..dim {
                a[row * dim + k] -= factor * a[col * dim + k];
            }
            b[row] -= factor * b[col];
        }
    }

    for row in (0..dim).rev() {
        let mut acc = b[row];
        for k in (row + 1)..dim {
            acc -= a[row * dim + k] * b[k];
        }
        b[row] = acc / a[row * dim + row];
    }

    b.iter().all(|v| v.is_finite())
}
