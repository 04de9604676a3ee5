//! Frame-by-frame analysis of a recorded signal.
//!
//! Frames are independent: each one gets its own estimate and nothing is
//! carried from one frame to the next.

use rayon::prelude::*;
use serde::Serialize;

use crate::config_loader::TunerConfig;
use crate::note::Note;
use crate::pitch_analysis::{self, PitchEstimator};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub index: usize,
    pub start_seconds: f32,
    pub rms: f32,
    pub pitch_hz: Option<f32>,
    pub note: Option<Note>,
}

/// Number of full frames in `len` samples.
pub fn frame_count(len: usize, frame_len: usize, hop: usize) -> usize {
    if frame_len == 0 || hop == 0 || len < frame_len {
        return 0;
    }
    (len - frame_len) / hop + 1
}

/// Estimates every full `buffer_size` frame, starting every `hop_size`
/// samples. Frames run in parallel; the result is in frame order.
pub fn analyze_frames(samples: &[f32], config: &TunerConfig) -> Vec<FrameReport> {
    let frame_len = config.buffer_size;
    let hop = config.hop_size;
    let count = frame_count(samples.len(), frame_len, hop);
    let estimator = PitchEstimator::new(frame_len, config.pitch_config());

    log::debug!(
        target: "frame_analysis",
        "{} samples -> {} frames (len={}, hop={})",
        samples.len(), count, frame_len, hop
    );

    (0..count)
        .into_par_iter()
        .map(|index| {
            let start = index * hop;
            let window = &samples[start..start + frame_len];
            let pitch_hz = estimator.estimate(window).frequency();
            FrameReport {
                index,
                start_seconds: start as f32 / config.sample_rate,
                rms: pitch_analysis::rms(window),
                pitch_hz,
                note: pitch_hz.and_then(|hz| Note::from_frequency(hz, config.concert_pitch)),
            }
        })
        .collect()
}
