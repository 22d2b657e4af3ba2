//! lsqbridge-engine: a small nonlinear least-squares engine behind a C ABI
//!
//! - `ffi`: the boundary surface (`lsq_init`, config records, `lsq_optimize`)
//! - `solvers::lm`: Levenberg-Marquardt loop driving a residual callback
//! - `solvers::numeric_diff`: central-difference Jacobians
//! - `solvers::bounds`: box constraints applied by projection
//!
//! Callers are expected to go through `ffi`; the solver modules are public so
//! the loop can be tested without a callback in between.

pub mod ffi;
pub mod numerics;
pub mod solvers;
