use lsqbridge::{AdjustError, SolverOption};
use numpy::PyReadwriteArray1;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::bindings::callbacks::PyCostFunction;

fn solver_options(
    relative_step_size: Option<f64>,
    verbose: Option<bool>,
    lower_bounds: Option<Vec<(usize, f64)>>,
    upper_bounds: Option<Vec<(usize, f64)>>,
) -> Vec<SolverOption> {
    let mut options = Vec::new();
    if let Some(rel) = relative_step_size {
        options.push(SolverOption::RelativeStepSize(rel));
    }
    if let Some(verbose) = verbose {
        options.push(SolverOption::VerboseOutput(verbose));
    }
    options.extend(
        lower_bounds
            .into_iter()
            .flatten()
            .map(|(i, v)| SolverOption::LowerBound(i, v)),
    );
    options.extend(
        upper_bounds
            .into_iter()
            .flatten()
            .map(|(i, v)| SolverOption::UpperBound(i, v)),
    );
    options
}

fn into_py_err(err: AdjustError) -> PyErr {
    match err {
        AdjustError::Validation(e) => PyValueError::new_err(e.to_string()),
        AdjustError::Execution {
            status,
            cause: Some(cause),
        } => match cause.downcast::<PyErr>() {
            Ok(py_err) => *py_err,
            Err(other) => PyRuntimeError::new_err(format!(
                "optimization failed (native status {status}): {other}"
            )),
        },
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Adjust `params` in place to minimize the squared residuals of `cost`.
///
/// params: 1-D contiguous float64 ndarray, overwritten with the estimate
/// cost: callable(x: list[float]) -> list[float] | ndarray   (len = num_residuals)
/// lower_bounds / upper_bounds: list of (param_index, value)
#[pyfunction(
    signature = (
        params,
        num_residuals,
        cost,
        relative_step_size = None,
        verbose = None,
        lower_bounds = None,
        upper_bounds = None
    )
)]
fn adjust(
    py: Python<'_>,
    mut params: PyReadwriteArray1<'_, f64>,
    num_residuals: usize,
    cost: Py<PyAny>,
    relative_step_size: Option<f64>,
    verbose: Option<bool>,
    lower_bounds: Option<Vec<(usize, f64)>>,
    upper_bounds: Option<Vec<(usize, f64)>>,
) -> PyResult<()> {
    let options = solver_options(relative_step_size, verbose, lower_bounds, upper_bounds);
    let cost = PyCostFunction::new(cost);
    let x = params
        .as_slice_mut()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    // The solve runs without the GIL; every evaluation re-acquires it.
    py.detach(|| lsqbridge::adjust(x, num_residuals, move |x, r| cost.evaluate(x, r), &options))
        .map_err(into_py_err)
}

pub(crate) fn register(module: &Bound<PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(adjust, module)?)?;
    Ok(())
}
