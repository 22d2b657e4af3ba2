//! Reverse entry: the function the native engine calls for every residual
//! evaluation.

use std::ffi::c_int;
use std::slice;

use log::error;

use crate::registry::{CallbackHandle, RegistryScope};

/// Evaluate the cost function registered under `handle` in scope `S`.
///
/// Returns `false` when the handle is unknown, a buffer is null, or the cost
/// function fails; the failure itself stays in the registration's error slot.
///
/// # Safety
/// When non-null, `params` and `residuals` must point to distinct buffers of
/// at least the registered number of parameters and residuals, valid for the
/// duration of this call.
pub unsafe extern "C" fn compute_residual<S: RegistryScope>(
    handle: c_int,
    params: *mut f64,
    residuals: *mut f64,
) -> bool {
    let handle = CallbackHandle::from_raw(handle);
    let registration = match S::registry().resolve(handle) {
        Ok(registration) => registration,
        Err(err) => {
            error!("{err}");
            return false;
        }
    };

    if params.is_null() || residuals.is_null() {
        error!("native engine passed a null buffer for handle {handle}");
        registration.record_error("native engine passed a null buffer".into());
        return false;
    }

    let arity = registration.arity();
    // SAFETY: non-null and sized per the caller contract; the views do not
    // outlive this call.
    let (params, residuals) = unsafe {
        (
            slice::from_raw_parts(params as *const f64, arity.num_params),
            slice::from_raw_parts_mut(residuals, arity.num_residuals),
        )
    };
    registration.evaluate(params, residuals)
}
