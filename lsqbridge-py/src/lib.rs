use pyo3::prelude::*;

mod bindings;

/// Python module definition
#[pymodule]
#[pyo3(name = "lsqbridge")]
fn lsqbridge_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::adjust::register(m)?;
    Ok(())
}
