/// Box constraints on the parameter block.
///
/// Infinite entries mean "unbounded". Setting a bound twice overwrites the
/// earlier value.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn set_lower(&mut self, index: usize, value: f64) {
        self.lower[index] = value;
    }

    pub fn set_upper(&mut self, index: usize, value: f64) {
        self.upper[index] = value;
    }

    /// True when no component is constrained.
    pub fn is_unbounded(&self) -> bool {
        self.lower.iter().all(|v| *v == f64::NEG_INFINITY)
            && self.upper.iter().all(|v| *v == f64::INFINITY)
    }

    /// Every lower bound is <= its upper bound and nothing is NaN.
    pub fn is_consistent(&self) -> bool {
        self.lower
            .iter()
            .zip(&self.upper)
            .all(|(lo, hi)| !lo.is_nan() && !hi.is_nan() && lo <= hi)
    }

    /// Clamp `x` into the box.
    pub fn project(&self, x: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dim());
        for ((xi, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            if *xi < *lo {
                *xi = *lo;
            } else if *xi > *hi {
                *xi = *hi;
            }
        }
    }
}
