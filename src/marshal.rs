//! Buffer marshalling between native planar blocks and numpy arrays.
//!
//! One block's worth of samples is copied per direction per call. The foreign
//! array never aliases host memory and lives only for the enclosing GIL scope,
//! so it is released on every exit path, including a raising script.

use crate::host::{AudioBlock, StreamInfo};
use numpy::{PyArray2, PyArrayMethods};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Copy the bound stream's channels into a fresh (channels × samples) array.
pub fn to_foreign<'py>(
    py: Python<'py>,
    block: &AudioBlock<'_, '_>,
    stream: &StreamInfo,
    num_samples: usize,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    check_layout(block, stream, num_samples)?;

    let array = PyArray2::<f32>::zeros(py, [stream.channel_count, num_samples], false);
    {
        let mut guard = array.readwrite();
        let mut view = guard.as_array_mut();
        for ch in 0..stream.channel_count {
            let samples = &block.channel(stream.first_channel + ch)[..num_samples];
            for (dst, &src) in view.row_mut(ch).iter_mut().zip(samples) {
                *dst = src;
            }
        }
    }
    Ok(array)
}

/// Copy the (possibly mutated) array contents back into the native block.
pub fn from_foreign(
    array: &Bound<'_, PyArray2<f32>>,
    block: &mut AudioBlock<'_, '_>,
    stream: &StreamInfo,
    num_samples: usize,
) -> PyResult<()> {
    check_layout(block, stream, num_samples)?;

    let guard = array.try_readonly()?;
    let view = guard.as_array();
    if view.nrows() < stream.channel_count || view.ncols() < num_samples {
        return Err(PyValueError::new_err(format!(
            "process buffer shrank to {}x{}, expected {}x{}",
            view.nrows(),
            view.ncols(),
            stream.channel_count,
            num_samples
        )));
    }

    for ch in 0..stream.channel_count {
        let samples = &mut block.channel_mut(stream.first_channel + ch)[..num_samples];
        for (dst, &src) in samples.iter_mut().zip(view.row(ch)) {
            *dst = src;
        }
    }
    Ok(())
}

/// Copy a spike waveform (channels × samples) into a fresh array.
pub fn waveform_to_foreign<'py>(
    py: Python<'py>,
    rows: &[&[f32]],
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let num_samples = rows.first().map_or(0, |row| row.len());
    if rows.iter().any(|row| row.len() != num_samples) {
        return Err(PyValueError::new_err("ragged spike waveform"));
    }

    let array = PyArray2::<f32>::zeros(py, [rows.len(), num_samples], false);
    {
        let mut guard = array.readwrite();
        let mut view = guard.as_array_mut();
        for (ch, row) in rows.iter().enumerate() {
            for (dst, &src) in view.row_mut(ch).iter_mut().zip(*row) {
                *dst = src;
            }
        }
    }
    Ok(array)
}

fn check_layout(
    block: &AudioBlock<'_, '_>,
    stream: &StreamInfo,
    num_samples: usize,
) -> PyResult<()> {
    let end = stream.first_channel + stream.channel_count;
    if end > block.num_channels() {
        return Err(PyValueError::new_err(format!(
            "stream {} maps channels {}..{} but the block has {}",
            stream.id,
            stream.first_channel,
            end,
            block.num_channels()
        )));
    }
    for ch in stream.first_channel..end {
        if block.channel(ch).len() < num_samples {
            return Err(PyValueError::new_err(format!(
                "channel {} holds fewer than {} samples",
                ch, num_samples
            )));
        }
    }
    Ok(())
}
