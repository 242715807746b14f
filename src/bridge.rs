//! The bridge façade: lifecycle state machine, per-block processing, and the
//! status surface the host displays.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, LoadError, RuntimeError, ScriptFault};
use crate::events::{EventQueue, ScriptHostHandle};
use crate::host::{AudioBlock, EventSink, SpikeEvent, StreamId, StreamInfo, TtlEvent};
use crate::instance::ScriptInstance;
use crate::interpreter::Runtime;
use crate::loader::LoadedModule;
use crate::{marshal, shim};
use arc_swap::ArcSwap;
use pyo3::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Status text shown before any module has been imported.
pub const NO_MODULE_LOADED: &str = "No Module Loaded";

/// Lifecycle state of the bridge.
///
/// A fault in any script call demotes the bridge to `Faulted`; only a reload
/// or a path reassignment recovers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Uninitialized,
    RuntimeReady,
    ModuleLoaded,
    InstanceReady,
    Faulted,
}

/// Human-readable status for diagnostic display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabel {
    /// "No Module Loaded", the module name, or "(ERROR) " + module name.
    pub text: String,
    /// Last Python exception text, empty while healthy.
    pub detail: String,
}

/// Hosts a user Python module inside the processing chain.
///
/// The host drives one bridge from a single audio thread; configuration and
/// topology updates happen on the control thread between blocks, under
/// `&mut self`, so a process call never observes a half-replaced instance.
pub struct ScriptBridge {
    runtime: &'static Runtime,
    python_home: Option<PathBuf>,
    script_path: Option<PathBuf>,
    module: Option<LoadedModule>,
    instance: Option<ScriptInstance>,
    state: BridgeState,
    stream: Option<StreamId>,
    streams: Vec<StreamInfo>,
    queue: Arc<EventQueue>,
    status: ArcSwap<StatusLabel>,
}

impl ScriptBridge {
    /// `acquisition` is the host-owned flag gating script-raised events.
    pub fn new(acquisition: Arc<AtomicBool>) -> Self {
        let runtime = Runtime::global();
        Self {
            runtime,
            python_home: None,
            script_path: None,
            module: None,
            instance: None,
            state: if runtime.is_initialized() {
                BridgeState::RuntimeReady
            } else {
                BridgeState::Uninitialized
            },
            stream: None,
            streams: Vec::new(),
            queue: Arc::new(EventQueue::new(acquisition)),
            status: ArcSwap::from_pointee(StatusLabel {
                text: NO_MODULE_LOADED.to_string(),
                detail: String::new(),
            }),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == BridgeState::InstanceReady
    }

    pub fn status(&self) -> Arc<StatusLabel> {
        self.status.load_full()
    }

    pub fn selected_stream(&self) -> Option<StreamId> {
        self.stream
    }

    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    pub fn module_generation(&self) -> Option<u64> {
        self.module.as_ref().map(LoadedModule::generation)
    }

    /// Called by the host when the processor joins the chain.
    ///
    /// Eagerly brings the runtime up when the chain is being built
    /// interactively; a chain restored from disk defers to the configuration
    /// that follows.
    pub fn initialize(&mut self, signal_chain_is_loading: bool) {
        if signal_chain_is_loading {
            return;
        }
        if self.runtime.is_initialized() {
            if self.state == BridgeState::Uninitialized {
                self.state = BridgeState::RuntimeReady;
            }
            return;
        }
        match self.runtime.ensure(self.python_home.as_deref()) {
            Ok(()) => {
                if self.state == BridgeState::Uninitialized {
                    self.state = BridgeState::RuntimeReady;
                }
            }
            Err(RuntimeError::HomeNotSet) => {
                tracing::debug!("Python home not configured; deferring runtime init");
            }
            Err(err) => tracing::warn!("Python runtime init failed: {}", err),
        }
    }

    /// Configure the Python installation and bring the runtime up.
    ///
    /// Once the runtime is live the home cannot change; a second call with a
    /// different path succeeds without re-initializing.
    pub fn set_python_home(&mut self, home: impl AsRef<Path>) -> crate::Result<()> {
        let home = home.as_ref();
        self.python_home = Some(home.to_path_buf());
        self.runtime.ensure(Some(home)).map_err(BridgeError::from)?;
        if self.state == BridgeState::Uninitialized {
            self.state = BridgeState::RuntimeReady;
        }
        Ok(())
    }

    /// Import the module at `path`, replacing any previous module.
    ///
    /// Re-setting the current path is a no-op; use [`reload`](Self::reload)
    /// to re-execute it.
    pub fn set_script_path(&mut self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        if self.script_path.as_deref() == Some(path) {
            return Ok(());
        }
        self.script_path = Some(path.to_path_buf());
        self.import_current()
    }

    /// Re-execute the current module in place and rebuild the instance.
    ///
    /// Logs and succeeds when no module is loaded.
    pub fn reload(&mut self) -> crate::Result<()> {
        let Some(module) = self.module.as_mut() else {
            tracing::info!("No Python module to reload");
            return Ok(());
        };
        match module.reload() {
            Ok(()) => {
                let name = module.name().to_string();
                self.set_status(name, String::new());
                self.state = BridgeState::ModuleLoaded;
                self.rebuild_instance().map_err(BridgeError::from)
            }
            Err(err) => {
                let name = module.name().to_string();
                self.state = BridgeState::Faulted;
                self.set_status(format!("(ERROR) {}", name), err.to_string());
                Err(err.into())
            }
        }
    }

    /// Bind to stream `id`. `0` or an id absent from the current topology
    /// clears the binding and invalidates the instance.
    pub fn select_stream(&mut self, id: StreamId) {
        let requested = (id != 0).then_some(id);
        let exists = requested.is_some_and(|id| self.streams.iter().any(|s| s.id == id));

        if !exists {
            if requested.is_some() {
                tracing::warn!("Stream {} does not exist; clearing selection", id);
            }
            self.clear_binding();
            return;
        }
        if self.stream == requested {
            return;
        }
        self.stream = requested;
        if matches!(
            self.state,
            BridgeState::ModuleLoaded | BridgeState::InstanceReady
        ) {
            let _ = self.rebuild_instance();
        }
    }

    /// Host topology-change notification.
    ///
    /// A vanished bound stream clears the binding; a changed channel count or
    /// sample rate on the bound stream forces reconstruction.
    pub fn update_settings(&mut self, streams: Vec<StreamInfo>) {
        self.streams = streams;

        let Some(bound) = self.stream else { return };
        let Some(info) = self.streams.iter().find(|s| s.id == bound).cloned() else {
            tracing::warn!("Stream {} disappeared; clearing selection", bound);
            self.clear_binding();
            return;
        };

        let generation = self.module.as_ref().map(LoadedModule::generation);
        let valid = match (&self.instance, generation) {
            (Some(instance), Some(generation)) => instance.matches(&info, generation),
            _ => false,
        };
        if valid {
            return;
        }
        if matches!(
            self.state,
            BridgeState::ModuleLoaded | BridgeState::InstanceReady
        ) {
            let _ = self.rebuild_instance();
        }
    }

    /// Apply a stored configuration: home, then stream selection, then script.
    pub fn apply_config(&mut self, config: &BridgeConfig) -> crate::Result<()> {
        if let Some(home) = &config.python_home {
            self.set_python_home(home)?;
        }
        self.select_stream(config.stream_id);
        if let Some(path) = &config.script_path {
            self.set_script_path(path)?;
        }
        Ok(())
    }

    /// Process one block.
    ///
    /// A no-op unless the bridge is `InstanceReady`. Only the bound stream's
    /// channels are marshalled; other streams in the block pass through
    /// untouched. On a script fault the block passes through unmodified and
    /// the bridge demotes itself — the audio callback never fails.
    pub fn process(&mut self, block: &mut AudioBlock<'_, '_>, sink: &mut dyn EventSink) {
        if self.state != BridgeState::InstanceReady {
            return;
        }

        // A reload may have outpaced the instance; rebuild before touching
        // samples.
        let stale = match (&self.instance, &self.module) {
            (Some(instance), Some(module)) => instance.generation() != module.generation(),
            _ => true,
        };
        if stale && (self.rebuild_instance().is_err() || self.state != BridgeState::InstanceReady)
        {
            return;
        }

        let Some(stream) = self.bound_stream() else {
            return;
        };
        let sample_number = block.first_sample_number(stream.id);
        let num_samples = block.num_samples(stream.id);

        if num_samples > 0 {
            let Some(instance) = &self.instance else {
                return;
            };
            let result = Python::with_gil(|py| -> Result<(), ScriptFault> {
                let buffer = shim::catch(py, "process", |py| {
                    marshal::to_foreign(py, block, &stream, num_samples)
                })?;
                instance.process(py, &buffer)?;
                // Write back only after a clean return; a raising script
                // leaves the native block untouched.
                shim::catch(py, "process", |py| {
                    marshal::from_foreign(&buffer, block, &stream, num_samples)
                })
            });
            if let Err(fault) = result {
                self.fault(fault);
            }
        }

        self.queue.drain_and_emit(sample_number, |event, sample_number| {
            sink.emit_ttl(event.line, event.state, sample_number);
        });
    }

    /// Forward `start_acquisition` to the script; a no-op unless ready.
    pub fn start_acquisition(&mut self) {
        self.call_lifecycle_hook(|instance, py| instance.on_start_acquisition(py));
    }

    /// Forward `stop_acquisition` to the script; a no-op unless ready.
    pub fn stop_acquisition(&mut self) {
        self.call_lifecycle_hook(|instance, py| instance.on_stop_acquisition(py));
    }

    /// Forward `start_recording` with the recording directory; a no-op unless
    /// ready.
    pub fn start_recording(&mut self, directory: impl AsRef<Path>) {
        let directory = directory.as_ref().to_string_lossy().into_owned();
        self.call_lifecycle_hook(|instance, py| instance.on_start_recording(py, &directory));
    }

    /// Forward `stop_recording` to the script; a no-op unless ready.
    pub fn stop_recording(&mut self) {
        self.call_lifecycle_hook(|instance, py| instance.on_stop_recording(py));
    }

    /// Forward a host TTL event to the script when it belongs to the bound
    /// stream.
    pub fn handle_ttl_event(&mut self, event: &TtlEvent<'_>) {
        if self.stream != Some(event.stream_id) {
            return;
        }
        self.call_lifecycle_hook(|instance, py| instance.on_ttl_event(py, event));
    }

    /// Forward a host spike event to the script when it belongs to the bound
    /// stream.
    pub fn handle_spike(&mut self, spike: &SpikeEvent<'_>) {
        if self.stream != Some(spike.stream_id) {
            return;
        }
        self.call_lifecycle_hook(|instance, py| instance.on_spike(py, spike));
    }

    fn call_lifecycle_hook(
        &mut self,
        f: impl FnOnce(&ScriptInstance, Python<'_>) -> Result<(), ScriptFault>,
    ) {
        if self.state != BridgeState::InstanceReady {
            return;
        }
        let Some(instance) = &self.instance else {
            return;
        };
        let result = Python::with_gil(|py| f(instance, py));
        if let Err(fault) = result {
            self.fault(fault);
        }
    }

    fn import_current(&mut self) -> crate::Result<()> {
        // The previous module is discarded either way; a failed import leaves
        // none loaded.
        self.instance = None;
        self.module = None;

        let Some(path) = self.script_path.clone() else {
            return Ok(());
        };

        if !self.runtime.is_initialized() {
            if let Err(err) = self.runtime.ensure(self.python_home.as_deref()) {
                self.set_status(NO_MODULE_LOADED.to_string(), err.to_string());
                return Err(LoadError::Runtime(err).into());
            }
        }

        match LoadedModule::import(self.runtime, &path) {
            Ok(module) => {
                self.set_status(module.name().to_string(), String::new());
                self.module = Some(module);
                self.state = BridgeState::ModuleLoaded;
                self.rebuild_instance().map_err(BridgeError::from)
            }
            Err(err) => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("?")
                    .to_string();
                self.state = BridgeState::Faulted;
                self.set_status(format!("(ERROR) {}", stem), err.to_string());
                tracing::error!("{}", err);
                Err(err.into())
            }
        }
    }

    /// Tear down and rebuild the script instance for the current binding.
    /// Without a bound stream the bridge parks at `ModuleLoaded`.
    fn rebuild_instance(&mut self) -> Result<(), ScriptFault> {
        self.instance = None;

        let Some(module) = &self.module else {
            return Ok(());
        };
        let Some(stream) = self.bound_stream() else {
            self.state = BridgeState::ModuleLoaded;
            return Ok(());
        };

        tracing::info!(
            "Initializing `{}` with {} channels at {} Hz",
            module.name(),
            stream.channel_count,
            stream.sample_rate
        );

        let result = Python::with_gil(|py| {
            let host = shim::catch(py, "__init__", |py| {
                Py::new(py, ScriptHostHandle::new(self.queue.clone()))
            })?;
            ScriptInstance::construct(py, module, &stream, &host)
        });

        match result {
            Ok(instance) => {
                self.instance = Some(instance);
                self.state = BridgeState::InstanceReady;
                Ok(())
            }
            Err(fault) => {
                self.fault(fault.clone());
                Err(fault)
            }
        }
    }

    fn bound_stream(&self) -> Option<StreamInfo> {
        let id = self.stream?;
        self.streams.iter().find(|s| s.id == id).cloned()
    }

    fn clear_binding(&mut self) {
        if self.stream.take().is_some() || self.instance.is_some() {
            self.instance = None;
            if self.state == BridgeState::InstanceReady {
                self.state = BridgeState::ModuleLoaded;
            }
        }
    }

    fn fault(&mut self, fault: ScriptFault) {
        let name = self
            .module
            .as_ref()
            .map(|m| m.name().to_string())
            .unwrap_or_default();
        self.state = BridgeState::Faulted;
        self.set_status(format!("(ERROR) {}", name), fault.message.clone());
        tracing::error!("`{}` disabled after fault in `{}`", name, fault.method);
    }

    fn set_status(&self, text: String, detail: String) {
        self.status.store(Arc::new(StatusLabel { text, detail }));
    }
}
