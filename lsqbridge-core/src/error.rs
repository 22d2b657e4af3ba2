//! Error types for the bridge.

use std::ffi::c_int;

use thiserror::Error;

use crate::config::BoundKind;
use crate::registry::CallbackHandle;

/// Error produced by a cost function. Only its presence crosses the native
/// boundary; the value itself waits in the registration's error slot.
pub type CostError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An option or problem dimension failed validation. Nothing has been handed
/// to the native engine when this is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("parameter vector is empty")]
    EmptyParameters,

    #[error("number of residuals must be positive")]
    NoResiduals,

    #[error("{what} = {value} does not fit the native engine's integer width")]
    DimensionTooLarge { what: &'static str, value: usize },

    #[error("{kind} bound refers to parameter {index}, but there are only {num_params} parameters")]
    ParamIndexOutOfRange {
        index: usize,
        kind: BoundKind,
        num_params: usize,
    },

    #[error("relative step size must be finite and non-negative, got {0}")]
    InvalidStepSize(f64),

    #[error("{kind} bound for parameter {index} is NaN")]
    NonFiniteBound { index: usize, kind: BoundKind },
}

/// The native engine was called with a handle nobody registered (or one that
/// was already released).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no cost function registered for handle {handle}")]
pub struct LookupError {
    pub handle: CallbackHandle,
}

/// Result of a failed `adjust` call.
#[derive(Error, Debug)]
pub enum AdjustError {
    #[error("invalid solver configuration: {0}")]
    Validation(#[from] ValidationError),

    /// The native engine returned a nonzero status. `cause` is the last error
    /// reported by the cost function during the solve, if any.
    #[error("optimization failed (native status {status})")]
    Execution {
        status: c_int,
        #[source]
        cause: Option<CostError>,
    },

    #[error("native engine could not allocate a configuration record")]
    ConfigAllocation,
}

impl AdjustError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}
