//! Pitch analysis using time-domain autocorrelation.
//!
//! One window in, one frequency out. The estimator gates the window on RMS
//! energy, trims the quiet edges, autocorrelates what is left, skips the
//! zero-lag lobe and refines the strongest remaining peak with a parabola.
//!
//! Nothing here keeps state between calls; every function works on the
//! snapshot it is handed.

/// Returned by [`auto_correlate`] when no reliable pitch was found.
pub const NO_PITCH: f32 = -1.0;

/// Configuration for the pitch analysis.
///
/// `threshold` is used twice: as the RMS cutoff of the silence gate and as
/// the per-sample amplitude cutoff of the trim stage.
#[derive(Debug, Clone)]
pub struct PitchConfig {
    pub sample_rate: f32,
    pub threshold: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            threshold: 0.02,
        }
    }
}

/// Outcome of one estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// Frequency from the parabola-refined lag.
    Refined(f32),
    /// Frequency from the integer peak lag; the three points around the peak
    /// were collinear so the parabola had no vertex.
    Unrefined(f32),
    /// Silence, or no usable interior correlation peak.
    Undetected,
}

impl Estimate {
    pub fn frequency(self) -> Option<f32> {
        match self {
            Estimate::Refined(hz) | Estimate::Unrefined(hz) => Some(hz),
            Estimate::Undetected => None,
        }
    }

    pub fn is_detected(self) -> bool {
        !matches!(self, Estimate::Undetected)
    }

    /// Collapses the estimate into the single-float form: Hz, or [`NO_PITCH`].
    pub fn hz_or_sentinel(self) -> f32 {
        self.frequency().unwrap_or(NO_PITCH)
    }
}

/// Closed-open range `[left, right)` of the window that gets autocorrelated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimBounds {
    pub left: usize,
    pub right: usize,
}

impl TrimBounds {
    /// Bounds used when neither scan finds a quiet sample.
    ///
    /// `right` stops one short of the window end, so even an untrimmed window
    /// drops its final sample.
    pub fn untrimmed(len: usize) -> Self {
        Self {
            left: 0,
            right: len.saturating_sub(1),
        }
    }

    pub fn len(&self) -> usize {
        self.right.saturating_sub(self.left)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Location and height of the correlation maximum after the descent skip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub lag: usize,
    pub value: f32,
}

/// Root-mean-square level of a window. Empty windows have no energy.
pub fn rms(window: &[f32]) -> f32 {
    rms_f64(window) as f32
}

fn rms_f64(window: &[f32]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let sumsq: f64 = window.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sumsq / window.len() as f64).sqrt()
}

/// Finds the active part of the window.
///
/// `left` is the first sample in the first half whose magnitude is below
/// `threshold`; `right` is the first such sample scanning the second half
/// from the end. Either side keeps its [`TrimBounds::untrimmed`] value when
/// its scan finds nothing.
pub fn trim_bounds(window: &[f32], threshold: f32) -> TrimBounds {
    let n = window.len();
    let half = n / 2;
    let mut bounds = TrimBounds::untrimmed(n);

    if let Some(i) = window[..half].iter().position(|x| x.abs() < threshold) {
        bounds.left = i;
    }
    if let Some(i) = (1..half).map(|i| n - i).find(|&i| window[i].abs() < threshold) {
        bounds.right = i;
    }
    bounds
}

/// Unnormalized, non-circular autocorrelation: one value per lag in `0..len`.
pub fn autocorrelate(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    (0..n)
        .map(|lag| {
            signal[..n - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum::<f32>()
        })
        .collect()
}

/// Index where the descent from the zero-lag maximum stops.
///
/// Never walks past `len - 2`.
pub fn skip_initial_descent(c: &[f32]) -> usize {
    let mut d = 0;
    while d + 2 < c.len() && c[d] > c[d + 1] {
        d += 1;
    }
    d
}

/// First maximum of `c` at or after the end of the initial descent.
///
/// Values not above -1 never qualify, so a sequence with nothing above that
/// floor has no peak.
pub fn find_peak(c: &[f32]) -> Option<Peak> {
    let start = skip_initial_descent(c);
    let mut best: Option<Peak> = None;
    let mut best_value = -1.0f32;
    for (lag, &value) in c.iter().enumerate().skip(start) {
        if value > best_value {
            best_value = value;
            best = Some(Peak { lag, value });
        }
    }
    best
}

/// Refines `peak_lag` with a parabola through its two neighbours and
/// converts the lag to Hz.
///
/// The peak needs a neighbour on both sides; a peak at lag 0 or at the last
/// lag is `Undetected`. So is a vertex that lands at or before lag 0, which
/// happens when the descent skip runs into its cap on a concave tail.
pub fn refine_peak(c: &[f32], peak_lag: usize, sample_rate: f32) -> Estimate {
    if peak_lag < 1 || peak_lag + 1 >= c.len() {
        return Estimate::Undetected;
    }

    let x1 = c[peak_lag - 1];
    let x2 = c[peak_lag];
    let x3 = c[peak_lag + 1];

    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;

    if a == 0.0 {
        return Estimate::Unrefined(sample_rate / peak_lag as f32);
    }

    let period = peak_lag as f64 - b as f64 / (2.0 * a as f64);
    let hz = (sample_rate as f64 / period) as f32;
    if !(period > 0.0) || !hz.is_finite() {
        log::trace!(target: "pitch_analysis", "rejected refined period {}", period);
        return Estimate::Undetected;
    }
    Estimate::Refined(hz)
}

/// Peak localization and refinement over an autocorrelation sequence.
pub fn pitch_from_correlation(c: &[f32], sample_rate: f32) -> Estimate {
    match find_peak(c) {
        Some(peak) => {
            log::trace!(target: "pitch_analysis", "peak lag={} value={}", peak.lag, peak.value);
            refine_peak(c, peak.lag, sample_rate)
        }
        None => Estimate::Undetected,
    }
}

/// Runs all five stages on one window.
pub fn estimate(window: &[f32], sample_rate: f32, threshold: f32) -> Estimate {
    let level = rms_f64(window);
    if level < threshold as f64 {
        log::trace!(target: "pitch_analysis", "gated: rms={:.5} < {:.5}", level, threshold);
        return Estimate::Undetected;
    }

    let bounds = trim_bounds(window, threshold);
    log::trace!(target: "pitch_analysis", "trim [{}, {})", bounds.left, bounds.right);

    let c = autocorrelate(&window[bounds.left..bounds.right]);
    pitch_from_correlation(&c, sample_rate)
}

/// Pitch of `window` in Hz, or exactly [`NO_PITCH`].
pub fn auto_correlate(window: &[f32], sample_rate: f32, threshold: f32) -> f32 {
    estimate(window, sample_rate, threshold).hz_or_sentinel()
}

/// Estimator bound to one window length and one configuration.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    window_len: usize,
    config: PitchConfig,
}

impl PitchEstimator {
    pub fn new(window_len: usize, config: PitchConfig) -> Self {
        Self { window_len, config }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    /// Windows of any other length than the one this estimator was built for
    /// are rejected as `Undetected`.
    pub fn estimate(&self, window: &[f32]) -> Estimate {
        if window.len() != self.window_len {
            log::warn!(
                target: "pitch_analysis",
                "window length {} does not match estimator length {}",
                window.len(),
                self.window_len
            );
            return Estimate::Undetected;
        }
        estimate(window, self.config.sample_rate, self.config.threshold)
    }

    pub fn pitch(&self, window: &[f32]) -> f32 {
        self.estimate(window).hz_or_sentinel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn assert_close(actual: f32, expected: f32, rel: f32) {
        let err = (actual - expected).abs() / expected;
        assert!(err < rel, "expected ~{} Hz, got {} Hz ({:.3}% off)", expected, actual, err * 100.0);
    }

    #[test]
    fn silent_window_returns_sentinel() {
        for len in [0usize, 1, 2, 3, 64, 2048] {
            let window = vec![0.0f32; len];
            assert_eq!(auto_correlate(&window, 44100.0, 0.02), NO_PITCH, "len {}", len);
        }
        // Zero threshold lets silence through the gate; the peak search still rejects it.
        assert_eq!(auto_correlate(&vec![0.0; 2048], 44100.0, 0.0), NO_PITCH);
    }

    #[test]
    fn pure_tones_within_one_percent() {
        for &(freq, rate) in &[(220.0, 44100.0), (440.0, 44100.0), (880.0, 44100.0), (1000.0, 48000.0)] {
            let window = sine(freq, rate, 0.5, 2048);
            let hz = auto_correlate(&window, rate, 0.01);
            assert_close(hz, freq, 0.01);
        }
    }

    #[test]
    fn pure_tone_is_refined() {
        let window = sine(440.0, 44100.0, 0.5, 2048);
        assert!(matches!(estimate(&window, 44100.0, 0.01), Estimate::Refined(_)));
    }

    #[test]
    fn threshold_above_rms_gates_signal() {
        let window = sine(440.0, 44100.0, 0.05, 2048);
        let level = rms(&window);
        assert!((level - 0.05 / 2f32.sqrt()).abs() < 1e-3);

        assert_eq!(auto_correlate(&window, 44100.0, level * 1.5), NO_PITCH);
        assert_close(auto_correlate(&window, 44100.0, level * 0.25), 440.0, 0.01);
    }

    #[test]
    fn trim_is_noop_when_every_sample_is_loud() {
        let window: Vec<f32> = (0..2048).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let bounds = trim_bounds(&window, 0.1);
        assert_eq!(bounds, TrimBounds { left: 0, right: 2047 });
        assert_eq!(bounds.len(), 2047);
    }

    #[test]
    fn trim_finds_first_quiet_sample_on_each_side() {
        let mut window = vec![0.5f32; 10];
        window[3] = 0.0;
        window[7] = 0.01;
        window[8] = -0.9;
        let bounds = trim_bounds(&window, 0.1);
        assert_eq!(bounds, TrimBounds { left: 3, right: 7 });
    }

    #[test]
    fn autocorrelation_is_truncated_not_circular() {
        let c = autocorrelate(&[1.0, 2.0, 3.0]);
        assert_eq!(c, vec![14.0, 8.0, 3.0]);
        assert!(autocorrelate(&[]).is_empty());
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let window = sine(330.0, 44100.0, 0.3, 2048);
        let first = auto_correlate(&window, 44100.0, 0.02);
        let second = auto_correlate(&window, 44100.0, 0.02);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn collinear_peak_falls_back_to_integer_lag() {
        let c = [4.0, 1.0, 2.0, 3.0, 0.0];
        assert_eq!(refine_peak(&c, 2, 100.0), Estimate::Unrefined(50.0));
    }

    #[test]
    fn dc_window_hits_the_collinear_fallback() {
        // A constant window autocorrelates to a straight line.
        let window = vec![0.5f32; 64];
        let est = estimate(&window, 6100.0, 0.1);
        assert_eq!(est, Estimate::Unrefined(100.0));
        assert!(auto_correlate(&window, 6100.0, 0.1).is_finite());
    }

    #[test]
    fn concave_tail_with_vertex_before_zero_is_rejected() {
        // Descent stops at lag 2 (its cap); the parabola's vertex lands at -8.5.
        let c = [10.0, 9.0, 8.0, 6.9];
        assert_eq!(find_peak(&c), Some(Peak { lag: 2, value: 8.0 }));
        assert_eq!(refine_peak(&c, 2, 44100.0), Estimate::Undetected);
        assert_eq!(pitch_from_correlation(&c, 44100.0), Estimate::Undetected);
    }

    #[test]
    fn offset_noise_never_yields_negative_pitch() {
        // Deterministic LCG noise riding on a DC offset.
        let mut state = 0x2545_f491u32;
        for _ in 0..200 {
            let window: Vec<f32> = (0..256)
                .map(|_| {
                    state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    let noise = (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
                    0.5 + 0.2 * noise
                })
                .collect();
            let hz = auto_correlate(&window, 44100.0, 0.02);
            assert!(hz == NO_PITCH || (hz.is_finite() && hz > 0.0), "got {}", hz);
        }
    }

    #[test]
    fn gate_compares_at_full_precision() {
        // A threshold equal to the level rounded up to f32 sits above the
        // true level, so the window is gated.
        let mut checked = false;
        for k in 1..64 {
            let window = [0.1f32, 0.1 + 0.01 * k as f32];
            let level = rms_f64(&window);
            let threshold = level as f32;
            if threshold as f64 > level {
                assert_eq!(estimate(&window, 44100.0, threshold), Estimate::Undetected);
                checked = true;
            }
        }
        assert!(checked);

        let window = vec![0.1f32; 64];
        assert!(estimate(&window, 44100.0, 0.05).is_detected());
    }

    #[test]
    fn ramp_after_descent_is_rejected_at_last_lag() {
        let c = [5.0, 3.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(skip_initial_descent(&c), 2);
        assert_eq!(find_peak(&c), Some(Peak { lag: 7, value: 6.0 }));
        assert_eq!(pitch_from_correlation(&c, 44100.0), Estimate::Undetected);
    }

    #[test]
    fn descent_skip_never_returns_zero_lag() {
        let window = sine(440.0, 44100.0, 0.5, 2048);
        let bounds = trim_bounds(&window, 0.01);
        let c = autocorrelate(&window[bounds.left..bounds.right]);

        assert!(c.iter().all(|&v| v <= c[0]));
        let d = skip_initial_descent(&c);
        assert!(d > 0);
        let peak = find_peak(&c).expect("tone has a peak");
        assert!(peak.lag >= d);
        assert!((peak.lag as i64 - 100).abs() <= 1, "lag {}", peak.lag);
    }

    #[test]
    fn descent_skip_stops_before_last_two_lags() {
        let c = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_eq!(skip_initial_descent(&c), 3);
        assert_eq!(skip_initial_descent(&[1.0]), 0);
        assert_eq!(skip_initial_descent(&[]), 0);
    }

    #[test]
    fn values_at_or_below_floor_have_no_peak() {
        assert_eq!(find_peak(&[-1.0, -2.0, -3.0]), None);
        assert_eq!(pitch_from_correlation(&[-1.0, -2.0, -3.0], 44100.0), Estimate::Undetected);
    }

    #[test]
    fn estimator_rejects_wrong_window_length() {
        let estimator = PitchEstimator::new(1024, PitchConfig { threshold: 0.01, ..Default::default() });
        let window = sine(440.0, 44100.0, 0.5, 2048);
        assert_eq!(estimator.estimate(&window), Estimate::Undetected);
        assert_close(estimator.pitch(&window[..1024]), 440.0, 0.01);
    }

    #[test]
    fn estimate_accessors() {
        assert_eq!(Estimate::Refined(440.0).frequency(), Some(440.0));
        assert_eq!(Estimate::Unrefined(220.0).hz_or_sentinel(), 220.0);
        assert!(!Estimate::Undetected.is_detected());
        assert_eq!(Estimate::Undetected.hz_or_sentinel(), NO_PITCH);
    }
}
