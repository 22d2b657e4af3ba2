//! C ABI of the engine.
//!
//! The caller creates a config record, appends bounds, and hands the engine a
//! parameter block plus a residual callback identified by an integer handle.
//! The engine never stores the callback or the handle past `lsq_optimize`.

use std::ffi::{c_int, c_void};
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use crate::numerics::try_zeroed;
use crate::solvers::bounds::Bounds;
use crate::solvers::lm::{LevenbergMarquardt, Termination};
use crate::solvers::numeric_diff::NumericDiffOptions;

/// Converged, or stopped at the iteration limit with a usable estimate.
pub const LSQ_OK: c_int = 0;
/// `lsq_init` was never called.
pub const LSQ_NOT_INITIALIZED: c_int = 1;
/// Null pointers, non-positive sizes, or bad bound entries.
pub const LSQ_INVALID_CONFIG: c_int = 2;
/// The callback failed at the initial point or while building a Jacobian.
pub const LSQ_EVALUATION_FAILED: c_int = 3;
/// The problem could not be solved (non-finite cost).
pub const LSQ_SOLVER_FAILED: c_int = 4;

/// Residual callback: fill `residuals` (len = num_residuals) from `params`
/// (len = num_params). Both buffers are only valid for the duration of the
/// call. Returning `false` reports an evaluation failure.
pub type ResidualCallback =
    unsafe extern "C" fn(handle: c_int, params: *mut f64, residuals: *mut f64) -> bool;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundKind {
    Lower = 0,
    Upper = 1,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundEntry {
    pub param_index: c_int,
    pub kind: BoundKind,
    pub value: f64,
}

/// Configuration record shared with the caller.
#[repr(C)]
#[derive(Debug)]
pub struct LsqConfig {
    pub num_params: c_int,
    pub num_residuals: c_int,

    pub relative_step_size: f64, // <= 1e-6 keeps the default

    pub progress_to_stdout: bool,
    pub print_summary: bool, // show result summary at end

    internal: *mut c_void, // Box<Vec<BoundEntry>>
}

impl LsqConfig {
    /// Bound entries in the order they were appended.
    pub fn bounds(&self) -> &[BoundEntry] {
        if self.internal.is_null() {
            return &[];
        }
        // SAFETY: `internal` is only ever set by `lsq_create_config` to a
        // leaked `Box<Vec<BoundEntry>>` and freed by `lsq_delete_config`.
        unsafe { &*(self.internal as *const Vec<BoundEntry>) }
    }

    fn push_bound(&mut self, entry: BoundEntry) {
        if self.internal.is_null() {
            return;
        }
        // SAFETY: see `bounds`; `&mut self` guarantees exclusive access.
        let list = unsafe { &mut *(self.internal as *mut Vec<BoundEntry>) };
        list.push(entry);
    }
}

static INIT: Once = Once::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// One-time global initialization. Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn lsq_init() {
    INIT.call_once(|| {
        INITIALIZED.store(true, Ordering::Release);
    });
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

#[no_mangle]
pub extern "C" fn lsq_create_config() -> *mut LsqConfig {
    let bounds: Box<Vec<BoundEntry>> = Box::default();
    Box::into_raw(Box::new(LsqConfig {
        num_params: 0,
        num_residuals: 0,
        relative_step_size: 0.0,
        progress_to_stdout: false,
        print_summary: false,
        internal: Box::into_raw(bounds) as *mut c_void,
    }))
}

/// # Safety
/// `config` must be null or a pointer returned by `lsq_create_config` that
/// has not been deleted yet.
#[no_mangle]
pub unsafe extern "C" fn lsq_delete_config(config: *mut LsqConfig) {
    if config.is_null() {
        return;
    }
    // SAFETY: guaranteed by the caller.
    let config = unsafe { Box::from_raw(config) };
    if !config.internal.is_null() {
        // SAFETY: created by `lsq_create_config`.
        drop(unsafe { Box::from_raw(config.internal as *mut Vec<BoundEntry>) });
    }
}

/// # Safety
/// `config` must be null or a live pointer from `lsq_create_config`.
#[no_mangle]
pub unsafe extern "C" fn lsq_add_lower_bound(
    config: *mut LsqConfig,
    param_num: c_int,
    lower: f64,
) {
    // SAFETY: guaranteed by the caller.
    if let Some(config) = unsafe { config.as_mut() } {
        config.push_bound(BoundEntry {
            param_index: param_num,
            kind: BoundKind::Lower,
            value: lower,
        });
    }
}

/// # Safety
/// `config` must be null or a live pointer from `lsq_create_config`.
#[no_mangle]
pub unsafe extern "C" fn lsq_add_upper_bound(
    config: *mut LsqConfig,
    param_num: c_int,
    upper: f64,
) {
    // SAFETY: guaranteed by the caller.
    if let Some(config) = unsafe { config.as_mut() } {
        config.push_bound(BoundEntry {
            param_index: param_num,
            kind: BoundKind::Upper,
            value: upper,
        });
    }
}

fn collect_bounds(entries: &[BoundEntry], n: usize) -> Option<Bounds> {
    let mut bounds = Bounds::unbounded(n);
    for entry in entries {
        let index = usize::try_from(entry.param_index).ok().filter(|i| *i < n)?;
        match entry.kind {
            BoundKind::Lower => bounds.set_lower(index, entry.value),
            BoundKind::Upper => bounds.set_upper(index, entry.value),
        }
    }
    bounds.is_consistent().then_some(bounds)
}

/// Run the optimizer loop. Returns when optimization is complete.
///
/// `handle` is passed back verbatim on every callback so the caller can find
/// its cost function without handing function pointers to closures across
/// the boundary. The parameter block is mutated and holds the adjusted values
/// when this returns.
///
/// # Safety
/// `config` must be a live pointer from `lsq_create_config`; `params` must
/// point to `config.num_params` writable doubles that nothing else accesses
/// until this returns.
#[no_mangle]
pub unsafe extern "C" fn lsq_optimize(
    handle: c_int,
    config: *const LsqConfig,
    params: *mut f64,
    callback: Option<ResidualCallback>,
) -> c_int {
    if !is_initialized() {
        return LSQ_NOT_INITIALIZED;
    }
    // SAFETY: guaranteed by the caller.
    let Some(config) = (unsafe { config.as_ref() }) else {
        return LSQ_INVALID_CONFIG;
    };
    let Some(callback) = callback else {
        return LSQ_INVALID_CONFIG;
    };
    let (Ok(n), Ok(m)) = (
        usize::try_from(config.num_params),
        usize::try_from(config.num_residuals),
    ) else {
        return LSQ_INVALID_CONFIG;
    };
    if n == 0 || m == 0 || params.is_null() {
        return LSQ_INVALID_CONFIG;
    }
    let Some(bounds) = collect_bounds(config.bounds(), n) else {
        return LSQ_INVALID_CONFIG;
    };

    // SAFETY: guaranteed by the caller.
    let x = unsafe { slice::from_raw_parts_mut(params, n) };

    // The callback gets its own copy of the evaluation point, so it can never
    // observe or corrupt the solver's state.
    let Some(mut scratch) = try_zeroed(n) else {
        return LSQ_SOLVER_FAILED;
    };
    let residual_fn = |point: &[f64], r: &mut [f64]| {
        scratch.copy_from_slice(point);
        // SAFETY: both buffers are live, distinct, and sized per the config.
        unsafe { callback(handle, scratch.as_mut_ptr(), r.as_mut_ptr()) }
    };

    let solver = LevenbergMarquardt {
        progress_to_stdout: config.progress_to_stdout,
        ..LevenbergMarquardt::default()
    };
    let options = NumericDiffOptions::with_relative_step_size(config.relative_step_size);
    let summary = solver.solve_numeric_diff(m, x, residual_fn, options, |x| bounds.project(x));

    if config.print_summary {
        println!("{}", summary.full_report());
    }

    match summary.termination {
        t if t.is_usable() => LSQ_OK,
        Termination::InitialEvaluationFailed | Termination::JacobianEvaluationFailed => {
            LSQ_EVALUATION_FAILED
        }
        _ => LSQ_SOLVER_FAILED,
    }
}
