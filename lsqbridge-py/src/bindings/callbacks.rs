use lsqbridge::CostError;
use numpy::{IntoPyArray, PyArray1, PyArrayMethods, PyUntypedArrayMethods};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn extract_vec1(py: Python<'_>, out: &Bound<'_, PyAny>) -> PyResult<Vec<f64>> {
    if let Ok(arr) = out.downcast::<PyArray1<f64>>() {
        let owned;
        let arr_c = if arr.is_contiguous() {
            arr
        } else {
            owned = arr.to_owned_array().into_pyarray(py);
            &owned
        };
        let slice = unsafe { arr_c.as_slice()? };
        return Ok(slice.to_vec());
    }

    out.extract::<Vec<f64>>()
}

/// A Python callable `cost(x) -> residuals` usable as a bridge cost function.
///
/// The callable runs with the GIL re-acquired, so it may be invoked from a
/// thread that released it around the solve. Exceptions and shape errors
/// are boxed as [`PyErr`] and travel back through the bridge as the cost
/// error.
pub(crate) struct PyCostFunction {
    cost_fn: Py<PyAny>,
}

impl PyCostFunction {
    pub(crate) fn new(cost_fn: Py<PyAny>) -> Self {
        Self { cost_fn }
    }

    pub(crate) fn evaluate(&self, x: &[f64], r_out: &mut [f64]) -> Result<(), CostError> {
        Python::attach(|py| self.residual_into(py, x, r_out)).map_err(|e| Box::new(e) as CostError)
    }

    fn residual_into(&self, py: Python<'_>, x: &[f64], r_out: &mut [f64]) -> PyResult<()> {
        let out = self.cost_fn.bind(py).call1((x.to_vec(),))?;
        let r = extract_vec1(py, &out)?;
        if r.len() != r_out.len() {
            return Err(PyValueError::new_err(format!(
                "residual length mismatch: expected {}, got {}",
                r_out.len(),
                r.len()
            )));
        }
        r_out.copy_from_slice(&r);
        Ok(())
    }
}
