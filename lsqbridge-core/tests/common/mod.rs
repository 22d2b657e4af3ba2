#![allow(dead_code)]

use std::ffi::c_int;
use std::sync::atomic::{AtomicUsize, Ordering};

use lsqbridge::engine::{LsqConfig, ResidualCallback};
use lsqbridge::{LinkedEngine, NativeEngine};

/// Declare a registry scope with its own private registry.
macro_rules! isolated_scope {
    ($name:ident) => {
        struct $name;

        impl lsqbridge::RegistryScope for $name {
            fn registry() -> &'static lsqbridge::CallbackRegistry {
                static REGISTRY: std::sync::LazyLock<lsqbridge::CallbackRegistry> =
                    std::sync::LazyLock::new(lsqbridge::CallbackRegistry::new);
                &REGISTRY
            }
        }
    };
}

/// Linked engine that counts every call made through the seam.
#[derive(Debug, Default)]
pub struct CountingEngine {
    pub inits: AtomicUsize,
    pub created: AtomicUsize,
    pub deleted: AtomicUsize,
    pub optimized: AtomicUsize,
}

impl CountingEngine {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl NativeEngine for CountingEngine {
    fn initialize(&self) {
        self.inits.fetch_add(1, Ordering::SeqCst);
        LinkedEngine.initialize();
    }

    fn create_config(&self) -> *mut LsqConfig {
        self.created.fetch_add(1, Ordering::SeqCst);
        LinkedEngine.create_config()
    }

    unsafe fn delete_config(&self, config: *mut LsqConfig) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        unsafe { LinkedEngine.delete_config(config) }
    }

    unsafe fn optimize(
        &self,
        handle: c_int,
        config: *const LsqConfig,
        params: *mut f64,
        callback: ResidualCallback,
    ) -> c_int {
        self.optimized.fetch_add(1, Ordering::SeqCst);
        unsafe { LinkedEngine.optimize(handle, config, params, callback) }
    }
}

/// Evaluates the callback once at the current point, then reports `status`
/// regardless of the outcome.
#[derive(Debug)]
pub struct ScriptedEngine {
    pub status: c_int,
    /// Added to the handle before calling back, to simulate a stale handle.
    pub handle_offset: c_int,
}

impl ScriptedEngine {
    pub fn with_status(status: c_int) -> Self {
        Self {
            status,
            handle_offset: 0,
        }
    }
}

impl NativeEngine for ScriptedEngine {
    fn initialize(&self) {
        LinkedEngine.initialize();
    }

    unsafe fn optimize(
        &self,
        handle: c_int,
        config: *const LsqConfig,
        params: *mut f64,
        callback: ResidualCallback,
    ) -> c_int {
        let config = unsafe { &*config };
        let mut residuals = vec![0.0; config.num_residuals as usize];
        unsafe { callback(handle + self.handle_offset, params, residuals.as_mut_ptr()) };
        self.status
    }
}

/// Linked engine whose config allocation always fails.
#[derive(Debug, Default)]
pub struct NullConfigEngine {
    pub optimized: AtomicUsize,
}

impl NativeEngine for NullConfigEngine {
    fn initialize(&self) {
        LinkedEngine.initialize();
    }

    fn create_config(&self) -> *mut LsqConfig {
        std::ptr::null_mut()
    }

    unsafe fn optimize(
        &self,
        handle: c_int,
        config: *const LsqConfig,
        params: *mut f64,
        callback: ResidualCallback,
    ) -> c_int {
        self.optimized.fetch_add(1, Ordering::SeqCst);
        unsafe { LinkedEngine.optimize(handle, config, params, callback) }
    }
}
