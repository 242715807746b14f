//! Host-facing configuration surface.

use crate::host::StreamId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bridge configuration as stored by the host.
///
/// Applied with [`crate::ScriptBridge::apply_config`]; the individual setters
/// on the bridge are the primitive surface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Python installation to embed. `None` defers runtime init until one is set.
    #[serde(default)]
    pub python_home: Option<PathBuf>,

    /// Script file to import. `None` leaves the bridge without a module.
    #[serde(default)]
    pub script_path: Option<PathBuf>,

    /// Selected stream id; `0` selects no stream.
    #[serde(default)]
    pub stream_id: StreamId,
}
