//! # Sample Format Converter
//!
//! Normalizes decoded symphonia buffers to interleaved `f32` in `[-1.0, 1.0]`.

use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};

/// Converts any symphonia sample format (8/16/24/32-bit integer, 32/64-bit
/// float, planar or interleaved) to interleaved `f32`.
pub struct SampleConverter {
    buffer: Option<SampleBuffer<f32>>,
    spec: Option<SignalSpec>,
    capacity_frames: u64,
}

impl SampleConverter {
    pub fn new() -> Self {
        Self {
            buffer: None,
            spec: None,
            capacity_frames: 0,
        }
    }

    /// Convert one decoded packet.
    ///
    /// The scratch buffer is reused across packets and only reallocated when
    /// the signal spec changes or a packet is larger than any seen before.
    pub fn to_interleaved_f32(&mut self, decoded: AudioBufferRef<'_>) -> Vec<f32> {
        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;

        if self.spec != Some(spec) || self.capacity_frames < capacity {
            self.buffer = Some(SampleBuffer::<f32>::new(capacity, spec));
            self.spec = Some(spec);
            self.capacity_frames = capacity;
        }

        match self.buffer.as_mut() {
            Some(buf) => {
                buf.copy_interleaved_ref(decoded);
                buf.samples().to_vec()
            }
            None => Vec::new(),
        }
    }
}

impl Default for SampleConverter {
    fn default() -> Self {
        Self::new()
    }
}
