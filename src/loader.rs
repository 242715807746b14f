//! Script module loading and reload.

use crate::error::LoadError;
use crate::interpreter::Runtime;
use crate::shim;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use std::path::{Path, PathBuf};

/// The currently imported script file.
///
/// At most one module is loaded per bridge: importing a new path replaces the
/// whole value, and reload re-executes the same module name in place while
/// bumping the generation counter.
pub struct LoadedModule {
    path: PathBuf,
    name: String,
    generation: u64,
    module: Py<PyModule>,
}

impl LoadedModule {
    /// Import the module at `script_path`, lazily initializing the runtime
    /// from its last-known home when needed.
    ///
    /// The containing directory is appended to the module search path and the
    /// file stem becomes the module identifier.
    pub fn import(runtime: &Runtime, script_path: &Path) -> Result<Self, LoadError> {
        if script_path.as_os_str().is_empty() {
            return Err(LoadError::EmptyPath);
        }
        runtime.ensure(None)?;

        let name = script_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| LoadError::InvalidPath {
                path: script_path.to_path_buf(),
            })?
            .to_string();

        if let Some(dir) = script_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            runtime.append_search_path(dir)?;
        }

        tracing::info!(
            "Importing Python module `{}` from {}",
            name,
            script_path.display()
        );

        let module = Python::with_gil(|py| {
            PyModule::import(py, name.as_str())
                .map(Bound::unbind)
                .map_err(|err| shim::format_py_err(py, &err))
        })
        .map_err(|detail| LoadError::ImportFailed {
            module: name.clone(),
            detail,
        })?;

        tracing::info!("Successfully imported `{}`", name);

        Ok(Self {
            path: script_path.to_path_buf(),
            name,
            generation: 0,
            module,
        })
    }

    /// Re-execute the module in place.
    ///
    /// Success bumps the generation, invalidating instances built against the
    /// prior one. Failure leaves the module faulted; partial top-level side
    /// effects of the failed run are not rolled back.
    pub fn reload(&mut self) -> Result<(), LoadError> {
        let reloaded = Python::with_gil(|py| {
            py.import("importlib")
                .and_then(|importlib| importlib.call_method1("reload", (self.module.bind(py),)))
                .and_then(|module| module.downcast_into::<PyModule>().map_err(PyErr::from))
                .map(Bound::unbind)
                .map_err(|err| shim::format_py_err(py, &err))
        })
        .map_err(|detail| LoadError::ReloadFailed {
            module: self.name.clone(),
            detail,
        })?;

        self.module = reloaded;
        self.generation += 1;
        tracing::info!("Reloaded `{}` (generation {})", self.name, self.generation);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Module identifier derived from the file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counts in-place reloads; starts at 0 on a fresh import.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn bind<'py>(&self, py: Python<'py>) -> &Bound<'py, PyModule> {
        self.module.bind(py)
    }
}
