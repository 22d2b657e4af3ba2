pub mod linalg;

/// Zero-filled buffer of `len` doubles, or `None` when it cannot be allocated.
pub fn try_zeroed(len: usize) -> Option<Vec<f64>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, 0.0);
    Some(v)
}
