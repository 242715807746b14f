//! Error types for the script bridge.

use std::path::PathBuf;
use thiserror::Error;

/// Interpreter lifecycle failures.
///
/// All variants leave the runtime in a retriable state: `ensure` can be called
/// again once a valid home path is supplied.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("No Python home configured")]
    HomeNotSet,

    #[error("Failed to initialize Python runtime: {detail}")]
    InitFailed { detail: String },

    #[error("Python runtime is not initialized")]
    NotInitialized,

    #[error("Python runtime has been finalized")]
    Finalized,

    #[error("Failed to extend Python search path: {detail}")]
    PathSetup { detail: String },
}

/// Import and reload failures.
///
/// Recoverable by supplying a different path or fixing the script; the bridge
/// falls back to not-ready until then.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Script path is empty")]
    EmptyPath,

    #[error("Script path has no module name: {path}")]
    InvalidPath { path: PathBuf },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Failed to import Python module `{module}`: {detail}")]
    ImportFailed { module: String, detail: String },

    #[error("Failed to reload Python module `{module}`: {detail}")]
    ReloadFailed { module: String, detail: String },
}

/// An error raised inside a script call, caught at the isolation boundary.
///
/// The bridge becomes Faulted on the first fault; recovery requires a reload
/// or a path reassignment.
#[derive(Error, Debug, Clone)]
#[error("Python raised in `{method}`: {message}")]
pub struct ScriptFault {
    pub method: &'static str,
    pub message: String,
}

/// Top-level error union for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Script(#[from] ScriptFault),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
