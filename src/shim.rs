//! Fault isolation at the Python boundary.
//!
//! Every entry into the interpreter funnels through here: raised errors are
//! converted to [`ScriptFault`] and never propagate past this module. There is
//! no retry; a fault requires a reload or a path reassignment to recover.

use crate::error::ScriptFault;
use pyo3::prelude::*;
use pyo3::types::PyTracebackMethods;

/// Render a Python exception, with its traceback when one is attached.
pub(crate) fn format_py_err(py: Python<'_>, err: &PyErr) -> String {
    let mut text = err.to_string();
    if let Some(traceback) = err.traceback(py) {
        if let Ok(rendered) = traceback.format() {
            text.push('\n');
            text.push_str(rendered.trim_end());
        }
    }
    text
}

/// Convert a raised exception into a host-local fault value.
pub(crate) fn fault(py: Python<'_>, method: &'static str, err: &PyErr) -> ScriptFault {
    let message = format_py_err(py, err);
    tracing::error!("Python exception in `{}`:\n{}", method, message);
    ScriptFault { method, message }
}

/// Run Python-facing code, converting any raise into a fault attributed to
/// `method`.
pub(crate) fn catch<'py, T>(
    py: Python<'py>,
    method: &'static str,
    f: impl FnOnce(Python<'py>) -> PyResult<T>,
) -> Result<T, ScriptFault> {
    f(py).map_err(|err| fault(py, method, &err))
}

/// Invoke an optional no-argument hook. A script that does not define the
/// hook skips the call; that is success, not failure.
pub(crate) fn call_hook0(
    py: Python<'_>,
    hook: Option<&Py<PyAny>>,
    method: &'static str,
) -> Result<(), ScriptFault> {
    let Some(hook) = hook else { return Ok(()) };
    hook.bind(py)
        .call0()
        .map(drop)
        .map_err(|err| fault(py, method, &err))
}
