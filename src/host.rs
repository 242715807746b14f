//! Host-side collaborator contract.
//!
//! The bridge lives inside a larger processing graph; these are the narrow
//! types it is handed by that graph. The host owns buffer memory, stream
//! topology, and event dispatch — nothing here crosses into Python.

/// Stable numeric id of a host data stream. `0` is never a valid stream.
pub type StreamId = u16;

/// Metadata for one of the host's data streams.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub id: StreamId,
    pub name: String,
    pub channel_count: usize,
    pub sample_rate: f32,
    /// Index of this stream's first channel in the block's global channel layout.
    pub first_channel: usize,
}

/// Per-stream metadata for one processing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub stream_id: StreamId,
    pub num_samples: usize,
    /// Sample number of the first sample in this block.
    pub first_sample_number: i64,
}

/// One block of multichannel audio as planar channel slices.
///
/// Channels are indexed globally across all streams; [`StreamInfo::first_channel`]
/// maps a stream's local channel index into this layout.
pub struct AudioBlock<'a, 'b> {
    pub channels: &'a mut [&'b mut [f32]],
    pub streams: &'a [BlockInfo],
}

impl AudioBlock<'_, '_> {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn info(&self, stream: StreamId) -> Option<&BlockInfo> {
        self.streams.iter().find(|s| s.stream_id == stream)
    }

    /// Samples available for `stream` in this block, 0 when the stream is absent.
    pub fn num_samples(&self, stream: StreamId) -> usize {
        self.info(stream).map_or(0, |s| s.num_samples)
    }

    pub fn first_sample_number(&self, stream: StreamId) -> i64 {
        self.info(stream).map_or(0, |s| s.first_sample_number)
    }

    pub fn channel(&self, global_index: usize) -> &[f32] {
        &self.channels[global_index][..]
    }

    pub fn channel_mut(&mut self, global_index: usize) -> &mut [f32] {
        &mut self.channels[global_index][..]
    }
}

/// A TTL transition received from the host's event stream.
#[derive(Debug, Clone, Copy)]
pub struct TtlEvent<'a> {
    pub stream_id: StreamId,
    pub source_node_id: i32,
    pub channel_name: &'a str,
    pub sample_number: i64,
    pub line: u8,
    pub state: bool,
}

/// A sorted spike received from the host's event stream.
///
/// `waveform` is planar, channels × samples.
#[derive(Debug, Clone, Copy)]
pub struct SpikeEvent<'a> {
    pub stream_id: StreamId,
    pub source_node_id: i32,
    pub electrode_name: &'a str,
    pub sample_number: i64,
    pub sorted_id: u16,
    pub waveform: &'a [&'a [f32]],
}

/// Where the bridge emits host-level TTL events drained from the script queue.
pub trait EventSink {
    fn emit_ttl(&mut self, line: u8, state: bool, sample_number: i64);
}
