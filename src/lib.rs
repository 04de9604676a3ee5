/// Celeste Tuner Library
///
/// Autocorrelation pitch estimation plus the host-side pieces around it

pub mod pitch_analysis;
pub mod note;
pub mod sample_buffer;
pub mod capture;
pub mod frame_analysis;
pub mod wav_input;
pub mod config_loader;

pub use pitch_analysis::{auto_correlate, estimate, Estimate, PitchConfig, PitchEstimator, NO_PITCH};
pub use sample_buffer::{SampleBuffer, BUFFER_SIZE};
