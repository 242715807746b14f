//! The live script object and its resolved hooks.

use crate::error::ScriptFault;
use crate::events::ScriptHostHandle;
use crate::host::{SpikeEvent, StreamId, StreamInfo, TtlEvent};
use crate::loader::LoadedModule;
use crate::{marshal, shim};
use numpy::PyArray2;
use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;

/// Name of the user-defined class the module must export.
pub const SCRIPT_CLASS: &str = "PyProcessor";

/// Hooks resolved once at construction. `None` means the script does not
/// define the method and the call is skipped.
struct Hooks {
    process: Py<PyAny>,
    handle_ttl_event: Option<Py<PyAny>>,
    handle_spike: Option<Py<PyAny>>,
    start_acquisition: Option<Py<PyAny>>,
    stop_acquisition: Option<Py<PyAny>>,
    start_recording: Option<Py<PyAny>>,
    stop_recording: Option<Py<PyAny>>,
}

impl Hooks {
    fn probe(object: &Bound<'_, PyAny>) -> PyResult<Self> {
        Ok(Self {
            // `process` is the one required hook; a missing attribute raises
            // here and surfaces as a construction fault.
            process: object.getattr("process")?.unbind(),
            handle_ttl_event: Self::optional(object, "handle_ttl_event")?,
            handle_spike: Self::optional(object, "handle_spike")?,
            start_acquisition: Self::optional(object, "start_acquisition")?,
            stop_acquisition: Self::optional(object, "stop_acquisition")?,
            start_recording: Self::optional(object, "start_recording")?,
            stop_recording: Self::optional(object, "stop_recording")?,
        })
    }

    fn optional(object: &Bound<'_, PyAny>, name: &str) -> PyResult<Option<Py<PyAny>>> {
        if object.hasattr(name)? {
            Ok(Some(object.getattr(name)?.unbind()))
        } else {
            Ok(None)
        }
    }
}

/// The user-defined processing object.
///
/// Valid only for the module generation and (channels, rate, stream) tuple it
/// was constructed with; any change forces reconstruction before the next
/// process call.
pub struct ScriptInstance {
    hooks: Hooks,
    generation: u64,
    channel_count: usize,
    sample_rate: f32,
    stream: StreamId,
}

impl ScriptInstance {
    /// Build the script object with `(channels, rate, host)`. Constructors
    /// that predate the host handle take `(channels, rate)` and are accepted
    /// via fallback.
    pub(crate) fn construct(
        py: Python<'_>,
        module: &LoadedModule,
        stream: &StreamInfo,
        host: &Py<ScriptHostHandle>,
    ) -> Result<Self, ScriptFault> {
        let class = shim::catch(py, "__init__", |_| module.bind(py).getattr(SCRIPT_CLASS))?;

        let object = match class.call1((stream.channel_count, stream.sample_rate, host.clone_ref(py)))
        {
            Ok(object) => object,
            Err(err) if err.is_instance_of::<PyTypeError>(py) => {
                shim::catch(py, "__init__", |_| {
                    class.call1((stream.channel_count, stream.sample_rate))
                })?
            }
            Err(err) => return Err(shim::fault(py, "__init__", &err)),
        };

        let hooks = shim::catch(py, "__init__", |_| Hooks::probe(&object))?;

        Ok(Self {
            hooks,
            generation: module.generation(),
            channel_count: stream.channel_count,
            sample_rate: stream.sample_rate,
            stream: stream.id,
        })
    }

    /// Whether this instance is still valid for `stream` at `generation`.
    pub(crate) fn matches(&self, stream: &StreamInfo, generation: u64) -> bool {
        self.generation == generation
            && self.stream == stream.id
            && self.channel_count == stream.channel_count
            && self.sample_rate == stream.sample_rate
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Call the script's `process` hook with the marshalled block.
    pub(crate) fn process(
        &self,
        py: Python<'_>,
        buffer: &Bound<'_, PyArray2<f32>>,
    ) -> Result<(), ScriptFault> {
        self.hooks
            .process
            .bind(py)
            .call1((buffer,))
            .map(drop)
            .map_err(|err| shim::fault(py, "process", &err))
    }

    pub(crate) fn on_start_acquisition(&self, py: Python<'_>) -> Result<(), ScriptFault> {
        shim::call_hook0(py, self.hooks.start_acquisition.as_ref(), "start_acquisition")
    }

    pub(crate) fn on_stop_acquisition(&self, py: Python<'_>) -> Result<(), ScriptFault> {
        shim::call_hook0(py, self.hooks.stop_acquisition.as_ref(), "stop_acquisition")
    }

    pub(crate) fn on_start_recording(
        &self,
        py: Python<'_>,
        directory: &str,
    ) -> Result<(), ScriptFault> {
        let Some(hook) = &self.hooks.start_recording else {
            return Ok(());
        };
        hook.bind(py)
            .call1((directory,))
            .map(drop)
            .map_err(|err| shim::fault(py, "start_recording", &err))
    }

    pub(crate) fn on_stop_recording(&self, py: Python<'_>) -> Result<(), ScriptFault> {
        shim::call_hook0(py, self.hooks.stop_recording.as_ref(), "stop_recording")
    }

    pub(crate) fn on_ttl_event(
        &self,
        py: Python<'_>,
        event: &TtlEvent<'_>,
    ) -> Result<(), ScriptFault> {
        let Some(hook) = &self.hooks.handle_ttl_event else {
            return Ok(());
        };
        hook.bind(py)
            .call1((
                event.source_node_id,
                event.channel_name,
                event.sample_number,
                event.line,
                event.state,
            ))
            .map(drop)
            .map_err(|err| shim::fault(py, "handle_ttl_event", &err))
    }

    pub(crate) fn on_spike(&self, py: Python<'_>, spike: &SpikeEvent<'_>) -> Result<(), ScriptFault> {
        let Some(hook) = &self.hooks.handle_spike else {
            return Ok(());
        };
        let num_channels = spike.waveform.len();
        let num_samples = spike.waveform.first().map_or(0, |row| row.len());
        shim::catch(py, "handle_spike", |py| {
            let waveform = marshal::waveform_to_foreign(py, spike.waveform)?;
            hook.bind(py)
                .call1((
                    spike.source_node_id,
                    spike.electrode_name,
                    num_channels,
                    num_samples,
                    spike.sample_number,
                    spike.sorted_id,
                    &waveform,
                ))
                .map(drop)
        })
    }
}
