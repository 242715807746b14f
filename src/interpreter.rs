//! Interpreter lifecycle management.
//!
//! One embedded CPython interpreter lives per process. It is created on first
//! use (explicit home configuration or first script import), torn down at most
//! once at host shutdown, and never re-initialized while live. Components
//! reach it through [`Runtime::global`] and hold only the borrowed capability.

use crate::error::RuntimeError;
use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::PyList;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

#[derive(Default)]
struct RuntimeState {
    initialized: bool,
    finalized: bool,
    home: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

/// Process-wide handle to the embedded interpreter.
pub struct Runtime {
    state: Mutex<RuntimeState>,
}

impl Runtime {
    pub fn global() -> &'static Runtime {
        RUNTIME.get_or_init(|| Runtime {
            state: Mutex::new(RuntimeState::default()),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Home path the interpreter was initialized from, if any.
    pub fn home(&self) -> Option<PathBuf> {
        self.state.lock().home.clone()
    }

    /// Directories appended to the module search path so far.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.state.lock().search_paths.clone()
    }

    /// Initialize the interpreter from `home`, falling back to the last-known
    /// home when `None`.
    ///
    /// Idempotent: a second call is a no-op success and leaves the original
    /// home in place, whatever path it was given. Failures leave the runtime
    /// uninitialized and the call retriable.
    pub fn ensure(&self, home: Option<&Path>) -> Result<(), RuntimeError> {
        // Python code never calls back into this manager, so holding the state
        // lock across GIL acquisition cannot deadlock.
        let mut state = self.state.lock();
        if state.finalized {
            return Err(RuntimeError::Finalized);
        }
        if state.initialized {
            tracing::debug!(
                "Python runtime already initialized from {}",
                state.home.as_deref().unwrap_or(Path::new("?")).display()
            );
            return Ok(());
        }

        let home = match home.map(Path::to_path_buf).or_else(|| state.home.clone()) {
            Some(home) => home,
            None => return Err(RuntimeError::HomeNotSet),
        };
        if !home.is_dir() {
            return Err(RuntimeError::InitFailed {
                detail: format!("Python home is not a directory: {}", home.display()),
            });
        }

        std::env::set_var("PYTHONHOME", &home);
        pyo3::prepare_freethreaded_python();
        state.initialized = true;

        let appended = Python::with_gil(|py| configure_search_paths(py, &home)).map_err(|err| {
            RuntimeError::InitFailed {
                detail: err.to_string(),
            }
        })?;
        state.search_paths.extend(appended);
        state.home = Some(home.clone());

        tracing::info!("Python runtime initialized from {}", home.display());
        Ok(())
    }

    /// Initialize against whatever installation the interpreter was linked
    /// with, leaving `PYTHONHOME` alone. For hosts that ship no relocated
    /// Python, and for tests.
    pub fn ensure_default(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if state.finalized {
            return Err(RuntimeError::Finalized);
        }
        if state.initialized {
            return Ok(());
        }

        pyo3::prepare_freethreaded_python();
        state.initialized = true;

        let home = Python::with_gil(|py| -> PyResult<PathBuf> {
            let prefix: String = py.import("sys")?.getattr("prefix")?.extract()?;
            Ok(PathBuf::from(prefix))
        })
        .map_err(|err| RuntimeError::InitFailed {
            detail: err.to_string(),
        })?;

        tracing::info!("Python runtime initialized from {}", home.display());
        state.home = Some(home);
        Ok(())
    }

    /// Append `dir` to the interpreter's module search path.
    ///
    /// Append-only and idempotent; directories are never removed while the
    /// interpreter lives.
    pub fn append_search_path(&self, dir: &Path) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(RuntimeError::NotInitialized);
        }
        if state.search_paths.iter().any(|p| p == dir) {
            return Ok(());
        }

        Python::with_gil(|py| sys_path_append(py, dir)).map_err(|err| {
            RuntimeError::PathSetup {
                detail: err.to_string(),
            }
        })?;
        state.search_paths.push(dir.to_path_buf());
        Ok(())
    }

    /// Finalize the interpreter.
    ///
    /// # Safety
    ///
    /// Finalization invalidates every outstanding `Py` handle. All bridges,
    /// loaded modules, and script instances must have been dropped first, and
    /// no thread may be executing Python. Call at most once, at host shutdown.
    pub unsafe fn teardown(&self) {
        let mut state = self.state.lock();
        if !state.initialized || state.finalized {
            return;
        }
        state.finalized = true;

        unsafe {
            pyo3::ffi::PyGILState_Ensure();
            if pyo3::ffi::Py_FinalizeEx() != 0 {
                tracing::warn!("Python finalization reported errors");
            }
        }
        tracing::info!("Python runtime finalized");
    }
}

/// Extend `sys.path` with library directories derived from `home` and log the
/// resulting search path.
fn configure_search_paths(py: Python<'_>, home: &Path) -> PyResult<Vec<PathBuf>> {
    #[cfg_attr(not(windows), allow(unused_mut))]
    let mut appended = Vec::new();

    // Relocated installations on Windows need their library directories made
    // visible by hand; elsewhere PYTHONHOME is enough.
    #[cfg(windows)]
    {
        for dir in [
            home.join("lib"),
            home.join("lib").join("site-packages"),
            home.join("DLLs"),
        ] {
            if sys_path_append(py, &dir)? {
                appended.push(dir);
            }
        }
        let dll_dir = home.join("Library").join("bin");
        py.import("os")?
            .call_method1("add_dll_directory", (dll_dir.to_string_lossy().as_ref(),))?;
    }
    #[cfg(not(windows))]
    let _ = home;

    let path = py.import("sys")?.getattr("path")?;
    for entry in path.try_iter()? {
        tracing::debug!("Python sys.path: {}", entry?);
    }

    Ok(appended)
}

/// Append `dir` to `sys.path` unless already present. Returns whether it was
/// added.
fn sys_path_append(py: Python<'_>, dir: &Path) -> PyResult<bool> {
    let path = py
        .import("sys")?
        .getattr("path")?
        .downcast_into::<PyList>()
        .map_err(PyErr::from)?;
    let dir = dir.to_string_lossy();
    if path.contains(dir.as_ref())? {
        return Ok(false);
    }
    path.append(dir.as_ref())?;
    Ok(true)
}
