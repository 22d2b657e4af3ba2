//! Handle-keyed registry of cost functions reachable from the native engine.
//!
//! The engine only ever sees an integer handle. Every callback resolves that
//! handle here, so registrations must stay cheap to look up and must never be
//! held under the lock while user code runs.

use std::collections::HashMap;
use std::ffi::c_int;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use log::{debug, error};

use crate::error::{CostError, LookupError};

/// Boxed cost function: fill residuals from parameters.
pub type CostFn = Box<dyn Fn(&[f64], &mut [f64]) -> Result<(), CostError> + Send + Sync>;

/// Opaque key handed to the native engine in place of a function pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(c_int);

impl CallbackHandle {
    pub const fn from_raw(raw: c_int) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> c_int {
        self.0
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Buffer lengths a cost function was registered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arity {
    pub num_params: usize,
    pub num_residuals: usize,
}

impl Arity {
    pub const fn new(num_params: usize, num_residuals: usize) -> Self {
        Self {
            num_params,
            num_residuals,
        }
    }
}

/// A registered cost function plus the state the reverse entry writes back.
pub struct Registration {
    arity: Arity,
    cost: CostFn,
    last_error: Mutex<Option<CostError>>,
    invocations: AtomicUsize,
}

impl Registration {
    fn new(arity: Arity, cost: CostFn) -> Self {
        Self {
            arity,
            cost,
            last_error: Mutex::new(None),
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Number of times the cost function has been entered.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Run the cost function on views of exactly the registered arity.
    ///
    /// Returns `true` on success. Any error (including a length mismatch or a
    /// panic inside the cost function) is stored in the error slot and
    /// reported as `false`.
    pub fn evaluate(&self, params: &[f64], residuals: &mut [f64]) -> bool {
        if params.len() != self.arity.num_params || residuals.len() != self.arity.num_residuals {
            self.record_error(
                format!(
                    "buffer length mismatch: expected ({}, {}), got ({}, {})",
                    self.arity.num_params,
                    self.arity.num_residuals,
                    params.len(),
                    residuals.len()
                )
                .into(),
            );
            return false;
        }

        self.invocations.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.cost)(params, residuals)));
        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                debug!("cost function reported an error: {err}");
                self.record_error(err);
                false
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!("cost function panicked: {msg}");
                self.record_error(format!("cost function panicked: {msg}").into());
                false
            }
        }
    }

    /// Overwrite the error slot with the latest failure.
    pub fn record_error(&self, err: CostError) {
        *lock(&self.last_error) = Some(err);
    }

    /// Take (and clear) the last recorded error.
    pub fn take_error(&self) -> Option<CostError> {
        lock(&self.last_error).take()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("arity", &self.arity)
            .field("invocations", &self.invocations())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Nothing runs user code while holding these locks, so a poisoned guard
    // still protects consistent data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct RegistryState {
    last: c_int,
    fns: HashMap<CallbackHandle, Arc<Registration>>,
}

/// Mapping of handle to registered cost function.
#[derive(Default)]
pub struct CallbackRegistry {
    state: Mutex<RegistryState>,
    lookup_misses: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `cost` under the next free handle.
    pub fn register(&self, arity: Arity, cost: CostFn) -> CallbackHandle {
        self.insert(arity, cost).0
    }

    fn insert(&self, arity: Arity, cost: CostFn) -> (CallbackHandle, Arc<Registration>) {
        let registration = Arc::new(Registration::new(arity, cost));
        let mut state = lock(&self.state);
        // Handles are positive and monotonic; after a wrap the counter skips
        // anything still in flight.
        let handle = loop {
            state.last = if state.last == c_int::MAX {
                1
            } else {
                state.last + 1
            };
            let candidate = CallbackHandle(state.last);
            if !state.fns.contains_key(&candidate) {
                break candidate;
            }
        };
        state.fns.insert(handle, Arc::clone(&registration));
        debug!(
            "registered cost function {handle} ({} params, {} residuals)",
            arity.num_params, arity.num_residuals
        );
        (handle, registration)
    }

    /// Remove `handle`. Removing an absent handle is a no-op.
    pub fn deregister(&self, handle: CallbackHandle) {
        if lock(&self.state).fns.remove(&handle).is_some() {
            debug!("deregistered cost function {handle}");
        }
    }

    pub fn lookup(&self, handle: CallbackHandle) -> Option<Arc<Registration>> {
        lock(&self.state).fns.get(&handle).cloned()
    }

    /// Like [`lookup`](Self::lookup), but a miss is counted and returned as
    /// an error.
    pub fn resolve(&self, handle: CallbackHandle) -> Result<Arc<Registration>, LookupError> {
        self.lookup(handle).ok_or_else(|| {
            self.lookup_misses.fetch_add(1, Ordering::Relaxed);
            LookupError { handle }
        })
    }

    /// Number of callbacks that arrived with an unknown handle.
    pub fn lookup_misses(&self) -> u64 {
        self.lookup_misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("active", &self.len())
            .field("lookup_misses", &self.lookup_misses())
            .finish()
    }
}

/// Selects the registry a reverse entry routes through.
///
/// The native callback carries nothing but a handle, so the registry has to
/// be reachable from a plain function. Each scope type gets its own
/// monomorphized entry point and therefore its own isolated routing domain.
pub trait RegistryScope: 'static {
    fn registry() -> &'static CallbackRegistry;
}

/// The process-wide registry used by default.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessScope;

impl RegistryScope for ProcessScope {
    fn registry() -> &'static CallbackRegistry {
        static REGISTRY: LazyLock<CallbackRegistry> = LazyLock::new(CallbackRegistry::new);
        &REGISTRY
    }
}

/// Keeps a registration alive for one solve and removes it on drop.
pub(crate) struct RegistrationGuard {
    registry: &'static CallbackRegistry,
    handle: CallbackHandle,
    registration: Arc<Registration>,
}

impl RegistrationGuard {
    pub(crate) fn register(
        registry: &'static CallbackRegistry,
        arity: Arity,
        cost: CostFn,
    ) -> Self {
        let (handle, registration) = registry.insert(arity, cost);
        Self {
            registry,
            handle,
            registration,
        }
    }

    pub(crate) fn handle(&self) -> CallbackHandle {
        self.handle
    }

    pub(crate) fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.handle);
    }
}
