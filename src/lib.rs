//! # pybridge - embedded Python script hosting for real-time signal pipelines
//!
//! Runs a user-supplied, hot-reloadable Python module inside a host's
//! audio/ephys processing chain. Per-block sample data crosses the boundary
//! as numpy arrays, TTL events raised by the script cross back through a
//! locked queue, and every entry into the interpreter is fault-isolated so a
//! broken script degrades the bridge to a pass-through instead of taking down
//! the host.
//!
//! ## Usage
//!
//! ```ignore
//! use pybridge::{AudioBlock, BlockInfo, ScriptBridge};
//! use std::sync::{atomic::AtomicBool, Arc};
//!
//! let acquiring = Arc::new(AtomicBool::new(false));
//! let mut bridge = ScriptBridge::new(acquiring.clone());
//!
//! bridge.set_python_home("/opt/python3.11")?;
//! bridge.update_settings(streams);          // host topology
//! bridge.select_stream(101);
//! bridge.set_script_path("modules/gain.py")?;
//!
//! // On the audio thread, once per block:
//! bridge.process(&mut block, &mut sink);
//! ```
//!
//! ## Script contract
//!
//! The module must export a `PyProcessor` class constructed with
//! `(num_channels, sample_rate)` or `(num_channels, sample_rate, host)`.
//! `process(data)` is required and receives a (channels × samples) float32
//! numpy array to mutate in place. `handle_ttl_event`, `handle_spike`,
//! `start_acquisition`, `stop_acquisition`, `start_recording(directory)`,
//! and `stop_recording` are optional. The `host` handle exposes
//! `add_event(line, state)` to schedule TTL output.
//!
//! ## Fault model
//!
//! Python exceptions never cross the boundary raw: they become
//! [`ScriptFault`] values, the failing block passes through untouched, and
//! the bridge reports `(ERROR) <module>` on its status surface until the
//! script is reloaded or replaced. A script that blocks inside a hook stalls
//! the audio thread; synchronous embedding provides no timeout.

pub mod error;
pub use error::{BridgeError, LoadError, Result, RuntimeError, ScriptFault};

mod host;
pub use host::{AudioBlock, BlockInfo, EventSink, SpikeEvent, StreamId, StreamInfo, TtlEvent};

mod config;
pub use config::BridgeConfig;

mod interpreter;
pub use interpreter::Runtime;

mod loader;
pub use loader::LoadedModule;

#[doc(hidden)]
pub mod marshal;

mod events;
pub use events::{EventQueue, PendingEvent, ScriptHostHandle};

mod shim;

mod instance;
pub use instance::SCRIPT_CLASS;

mod bridge;
pub use bridge::{BridgeState, ScriptBridge, StatusLabel, NO_MODULE_LOADED};
