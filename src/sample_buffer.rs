//! Host-owned sample window.
//!
//! The host writes a fresh frame here and then asks for its pitch. The
//! estimator only ever sees a borrowed slice for the duration of one call.

use crate::pitch_analysis;

/// Default window length, matching a 2048-point analyser frame.
pub const BUFFER_SIZE: usize = 2048;

#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Box<[f32]>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(BUFFER_SIZE)
    }
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Raw handle for hosts that fill the buffer across an FFI boundary.
    ///
    /// Valid for `capacity()` samples while `self` is alive and not moved.
    pub fn as_mut_ptr(&mut self) -> *mut f32 {
        self.samples.as_mut_ptr()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples.to_vec()
    }

    /// Copies up to `capacity()` samples in and zero-fills whatever is left.
    /// Returns how many samples were taken from `samples`.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let n = samples.len().min(self.samples.len());
        self.samples[..n].copy_from_slice(&samples[..n]);
        self.samples[n..].fill(0.0);
        n
    }

    /// Pitch of the current contents in Hz, or [`pitch_analysis::NO_PITCH`].
    pub fn estimate_pitch(&self, sample_rate: f32, threshold: f32) -> f32 {
        pitch_analysis::auto_correlate(&self.samples, sample_rate, threshold)
    }
}
