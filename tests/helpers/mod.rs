//! Test fixtures for the embedded-interpreter integration tests.
//!
//! Scripts are written to per-test temp directories with unique module names:
//! the interpreter caches modules by name and the search path only grows, so
//! two tests must never share one.

// Each test binary compiles this module and uses a different subset.
#![allow(dead_code)]

use pybridge::{
    AudioBlock, BlockInfo, EventSink, Runtime, ScriptBridge, StreamId, StreamInfo,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SAMPLE_RATE: f32 = 30000.0;

/// Initialize the embedded interpreter once per test binary.
pub fn ensure_python() {
    Runtime::global()
        .ensure_default()
        .expect("embedded Python unavailable");
}

/// Write `body` to `<dir>/<name>.py` and return its path.
pub fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(format!("{}.py", name));
    fs::write(&path, body).expect("failed to write script");
    path
}

pub fn stream_info(id: StreamId, channels: usize, first_channel: usize) -> StreamInfo {
    StreamInfo {
        id,
        name: format!("stream-{}", id),
        channel_count: channels,
        sample_rate: TEST_SAMPLE_RATE,
        first_channel,
    }
}

pub fn block_info(stream_id: StreamId, num_samples: usize, first_sample_number: i64) -> BlockInfo {
    BlockInfo {
        stream_id,
        num_samples,
        first_sample_number,
    }
}

/// Run `f` with an [`AudioBlock`] viewing `data`.
pub fn with_block<R>(
    data: &mut [Vec<f32>],
    streams: &[BlockInfo],
    f: impl FnOnce(&mut AudioBlock<'_, '_>) -> R,
) -> R {
    let mut channels: Vec<&mut [f32]> = data.iter_mut().map(|c| c.as_mut_slice()).collect();
    let mut block = AudioBlock {
        channels: &mut channels,
        streams,
    };
    f(&mut block)
}

/// A bridge bound to a single stream, with the script at `path` imported.
pub fn ready_bridge(
    path: &Path,
    stream: StreamId,
    channels: usize,
) -> (ScriptBridge, Arc<AtomicBool>) {
    ensure_python();
    let acquiring = Arc::new(AtomicBool::new(false));
    let mut bridge = ScriptBridge::new(acquiring.clone());
    bridge.update_settings(vec![stream_info(stream, channels, 0)]);
    bridge.select_stream(stream);
    bridge.set_script_path(path).expect("script import failed");
    (bridge, acquiring)
}

/// Collects emitted TTL events as `(line, state, sample_number)`.
#[derive(Default)]
pub struct TtlCollector {
    pub events: Vec<(u8, bool, i64)>,
}

impl TtlCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for TtlCollector {
    fn emit_ttl(&mut self, line: u8, state: bool, sample_number: i64) {
        self.events.push((line, state, sample_number));
    }
}
