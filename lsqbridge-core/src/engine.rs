//! Seam between the bridge and the native engine.
//!
//! Everything the bridge does to the engine goes through [`NativeEngine`],
//! shaped after the engine's C ABI. [`LinkedEngine`] forwards to the linked
//! `lsqbridge-engine`; tests substitute their own engines to script status
//! codes and callback sequences.

use std::ffi::c_int;
use std::ptr::NonNull;

use lsqbridge_engine::ffi;
pub use lsqbridge_engine::ffi::{LsqConfig, ResidualCallback};

use crate::config::{BoundKind, SolverConfig};
use crate::error::AdjustError;

pub trait NativeEngine {
    /// Process-wide engine setup. The bridge calls this once before its first
    /// solve.
    fn initialize(&self);

    fn create_config(&self) -> *mut LsqConfig {
        ffi::lsq_create_config()
    }

    /// # Safety
    /// `config` must come from [`create_config`](Self::create_config) and
    /// must not be used afterwards.
    unsafe fn delete_config(&self, config: *mut LsqConfig) {
        unsafe { ffi::lsq_delete_config(config) }
    }

    /// # Safety
    /// `config` must be a live record from [`create_config`](Self::create_config).
    unsafe fn add_bound(
        &self,
        config: *mut LsqConfig,
        param_index: c_int,
        kind: BoundKind,
        value: f64,
    ) {
        match kind {
            BoundKind::Lower => unsafe { ffi::lsq_add_lower_bound(config, param_index, value) },
            BoundKind::Upper => unsafe { ffi::lsq_add_upper_bound(config, param_index, value) },
        }
    }

    /// Run the solve. Blocks until the engine terminates and returns its
    /// status (0 = success).
    ///
    /// # Safety
    /// `config` must be a live record and `params` must point to
    /// `config.num_params` doubles exclusively borrowed for the call.
    unsafe fn optimize(
        &self,
        handle: c_int,
        config: *const LsqConfig,
        params: *mut f64,
        callback: ResidualCallback,
    ) -> c_int;
}

/// The engine linked into this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkedEngine;

impl NativeEngine for LinkedEngine {
    fn initialize(&self) {
        ffi::lsq_init();
    }

    unsafe fn optimize(
        &self,
        handle: c_int,
        config: *const LsqConfig,
        params: *mut f64,
        callback: ResidualCallback,
    ) -> c_int {
        unsafe { ffi::lsq_optimize(handle, config, params, Some(callback)) }
    }
}

/// Native config record owned for one solve; deleted on drop.
pub(crate) struct NativeConfig<'e, E: NativeEngine + ?Sized> {
    engine: &'e E,
    raw: NonNull<LsqConfig>,
}

impl<'e, E: NativeEngine + ?Sized> NativeConfig<'e, E> {
    /// Copy a validated configuration into a fresh engine record.
    pub(crate) fn materialize(engine: &'e E, config: &SolverConfig) -> Result<Self, AdjustError> {
        let raw = NonNull::new(engine.create_config()).ok_or(AdjustError::ConfigAllocation)?;
        let native = Self { engine, raw };

        // Dimensions and indices were checked against c_int by the builder.
        let record = native.raw.as_ptr();
        // SAFETY: `record` is live and exclusively ours until drop.
        unsafe {
            (*record).num_params = config.num_params() as c_int;
            (*record).num_residuals = config.num_residuals() as c_int;
            (*record).relative_step_size = config.relative_step_size();
            (*record).progress_to_stdout = config.progress_to_stdout();
            (*record).print_summary = config.print_summary();
        }
        for bound in config.bounds() {
            // SAFETY: as above.
            unsafe {
                engine.add_bound(record, bound.param_index() as c_int, bound.kind(), bound.value())
            };
        }
        Ok(native)
    }

    pub(crate) fn as_ptr(&self) -> *const LsqConfig {
        self.raw.as_ptr()
    }
}

impl<E: NativeEngine + ?Sized> Drop for NativeConfig<'_, E> {
    fn drop(&mut self) {
        // SAFETY: created by `engine.create_config` and never handed out
        // beyond a borrow of `self`.
        unsafe { self.engine.delete_config(self.raw.as_ptr()) };
    }
}
