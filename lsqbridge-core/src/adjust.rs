//! The `adjust` entry point.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Once;

use log::{debug, warn};

use crate::config::{ConfigBuilder, SolverOption};
use crate::engine::{LinkedEngine, NativeConfig, NativeEngine};
use crate::entry::compute_residual;
use crate::error::{AdjustError, CostError, ValidationError};
use crate::registry::{Arity, ProcessScope, RegistrationGuard, RegistryScope};

/// Owns an engine and routes its callbacks through the registry of scope `S`.
///
/// Engine initialization happens at most once per bridge, on the first call
/// to [`adjust`](Self::adjust); concurrent first callers wait for it.
pub struct Bridge<E = LinkedEngine, S = ProcessScope> {
    engine: E,
    init: Once,
    _scope: PhantomData<fn() -> S>,
}

impl<E, S> Bridge<E, S> {
    pub const fn new(engine: E) -> Self {
        Self {
            engine,
            init: Once::new(),
            _scope: PhantomData,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: Default, S> Default for Bridge<E, S> {
    fn default() -> Self {
        Self::new(E::default())
    }
}

impl<E, S> fmt::Debug for Bridge<E, S>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("engine", &self.engine)
            .field("initialized", &self.init.is_completed())
            .finish()
    }
}

impl<E: NativeEngine, S: RegistryScope> Bridge<E, S> {
    /// Adjust `params` in place so the residuals produced by `cost` are
    /// minimized in the least-squares sense.
    ///
    /// `cost(params, residuals)` receives views of exactly `params.len()` and
    /// `num_residuals` elements. Options are applied in order; the first
    /// invalid one aborts the call before the engine runs. On failure
    /// `params` holds whatever the engine left there.
    pub fn adjust<F>(
        &self,
        params: &mut [f64],
        num_residuals: usize,
        cost: F,
        options: &[SolverOption],
    ) -> Result<(), AdjustError>
    where
        F: Fn(&[f64], &mut [f64]) -> Result<(), CostError> + Send + Sync + 'static,
    {
        self.init.call_once(|| {
            debug!("initializing native engine");
            self.engine.initialize();
        });

        if params.is_empty() {
            return Err(ValidationError::EmptyParameters.into());
        }
        let num_params = params.len();

        let registration = RegistrationGuard::register(
            S::registry(),
            Arity::new(num_params, num_residuals),
            Box::new(cost),
        );
        let config = ConfigBuilder::new(num_params, num_residuals)?
            .apply_all(options)?
            .build();
        let native = NativeConfig::materialize(&self.engine, &config)?;

        let handle = registration.handle();
        debug!(
            "invoking native engine for {handle} ({num_params} params, {num_residuals} residuals)"
        );
        // SAFETY: `native` is live for the whole call, `params` is exclusively
        // borrowed and matches `num_params`, and the entry resolves `handle`
        // through the same registry it was registered in.
        let status = unsafe {
            self.engine.optimize(
                handle.raw(),
                native.as_ptr(),
                params.as_mut_ptr(),
                compute_residual::<S>,
            )
        };
        let cause = registration.registration().take_error();

        if status != 0 {
            warn!(
                "native engine returned status {status} for {handle} after {} evaluations",
                registration.registration().invocations()
            );
            return Err(AdjustError::Execution { status, cause });
        }
        if let Some(err) = cause {
            debug!("{handle} converged despite a rejected evaluation: {err}");
        }
        Ok(())
    }
}

static DEFAULT_BRIDGE: Bridge = Bridge::new(LinkedEngine);

/// [`Bridge::adjust`] on the process-wide bridge over the linked engine.
///
/// ```
/// let mut params = vec![0.5];
/// lsqbridge::adjust(&mut params, 1, |x, r| {
///     r[0] = 0.5 * (10.0 - x[0]).powi(2);
///     Ok(())
/// }, &[])?;
/// assert!((params[0] - 10.0).abs() < 1e-3);
/// # Ok::<(), lsqbridge::AdjustError>(())
/// ```
pub fn adjust<F>(
    params: &mut [f64],
    num_residuals: usize,
    cost: F,
    options: &[SolverOption],
) -> Result<(), AdjustError>
where
    F: Fn(&[f64], &mut [f64]) -> Result<(), CostError> + Send + Sync + 'static,
{
    DEFAULT_BRIDGE.adjust(params, num_residuals, cost, options)
}
