//! Bridge between Rust cost functions and a native nonlinear least-squares
//! engine.
//!
//! The engine only understands C function pointers and integer handles. The
//! bridge registers a closure in a [`CallbackRegistry`], hands the engine the
//! handle together with [`compute_residual`] as its residual callback, and
//! routes every evaluation back to the closure. The registration lives for
//! exactly one [`adjust`] call.
//!
//! ```
//! use lsqbridge::SolverOption;
//!
//! let mut params = vec![0.5];
//! lsqbridge::adjust(
//!     &mut params,
//!     1,
//!     |x, r| {
//!         r[0] = 10.0 - x[0];
//!         Ok(())
//!     },
//!     &[SolverOption::UpperBound(0, 5.0)],
//! )?;
//! assert!((params[0] - 5.0).abs() < 1e-6);
//! # Ok::<(), lsqbridge::AdjustError>(())
//! ```

pub mod adjust;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod registry;

pub use adjust::{adjust, Bridge};
pub use config::{BoundConstraint, BoundKind, ConfigBuilder, SolverConfig, SolverOption};
pub use engine::{LinkedEngine, NativeEngine};
pub use entry::compute_residual;
pub use error::{AdjustError, CostError, LookupError, ValidationError};
pub use registry::{
    Arity, CallbackHandle, CallbackRegistry, CostFn, ProcessScope, Registration, RegistryScope,
};
