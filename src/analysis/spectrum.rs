// SpectralAnalyzer - windowed FFT and perceptual bar aggregation
//
// Magnitude spectra are computed with a Hann window to reduce spectral
// leakage, scaled by 2/N. Bars aggregate spectrum bins through a mel-spaced
// triangular filterbank (50 Hz - 18 kHz) so visual spacing follows perceived
// pitch spacing. The filterbank is cached by (bar_count, sample_rate,
// spectrum_len) and rebuilt only when the key changes.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Mutex;

use crate::types::AudioFrame;

/// Largest FFT size the analyzer will use; longer frames are truncated.
pub const MAX_FFT_SIZE: usize = 4096;

/// Frequency range covered by the bar filterbank.
const BAR_FREQ_MIN_HZ: f32 = 50.0;
const BAR_FREQ_MAX_HZ: f32 = 18_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FilterbankKey {
    bar_count: usize,
    sample_rate: u32,
    spectrum_len: usize,
}

struct BarFilter {
    start: usize,
    weights: Vec<f32>,
}

struct Filterbank {
    key: FilterbankKey,
    filters: Vec<BarFilter>,
}

// Everything mutable lives behind one lock: FFT plan, window, scratch buffer,
// and the filterbank cache. Callers only ever receive owned snapshots.
struct SpectrumState {
    planner: FftPlanner<f32>,
    fft_size: usize,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    filterbank: Option<Filterbank>,
    filterbank_rebuilds: u64,
}

/// Windowing + FFT + magnitude spectrum + bar aggregation.
pub struct SpectralAnalyzer {
    state: Mutex<SpectrumState>,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SpectrumState {
                planner: FftPlanner::new(),
                fft_size: 0,
                window: Vec::new(),
                scratch: Vec::new(),
                filterbank: None,
                filterbank_rebuilds: 0,
            }),
        }
    }

    /// Compute the magnitude spectrum of a frame.
    ///
    /// N is the next power of two >= min(sample_count, 4096); short frames are
    /// zero-padded, long ones truncated. Returns N/2 magnitudes scaled by 2/N.
    /// Degenerate frames (fewer than 2 samples) yield an empty spectrum.
    pub fn compute_magnitudes(&self, frame: &AudioFrame) -> Vec<f32> {
        let samples = &frame.samples;
        if samples.is_empty() {
            return Vec::new();
        }

        let n = next_power_of_two(samples.len().min(MAX_FFT_SIZE));
        if n < 2 {
            return Vec::new();
        }

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Rebuild window and scratch only when the FFT size changes.
        if state.fft_size != n {
            state.window = (0..n)
                .map(|i| {
                    0.5 * (1.0
                        - ((2.0 * std::f32::consts::PI * i as f32) / (n as f32 - 1.0)).cos())
                })
                .collect();
            state.scratch = vec![Complex::new(0.0, 0.0); n];
            state.fft_size = n;
        }

        for i in 0..n {
            let sample = if i < samples.len() { samples[i] } else { 0.0 };
            let windowed = sample * state.window[i];
            state.scratch[i] = Complex::new(windowed, 0.0);
        }

        let fft = state.planner.plan_fft_forward(n);
        fft.process(&mut state.scratch);

        let scale = 2.0 / n as f32;
        state.scratch[..n / 2].iter().map(|c| c.norm() * scale).collect()
    }

    /// Aggregate a magnitude spectrum into `bar_count` perceptual bars.
    ///
    /// # Returns
    /// `bar_count` values, each in [0, 1]. Degenerate spectra yield all zeros.
    pub fn compute_bars(&self, spectrum: &[f32], sample_rate: u32, bar_count: usize) -> Vec<f32> {
        if bar_count == 0 {
            return Vec::new();
        }
        if spectrum.len() < 2 || sample_rate == 0 {
            return vec![0.0; bar_count];
        }

        let nyquist = sample_rate as f32 / 2.0;
        let f_max = BAR_FREQ_MAX_HZ.min(nyquist);
        if f_max <= BAR_FREQ_MIN_HZ {
            return vec![0.0; bar_count];
        }

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let key = FilterbankKey {
            bar_count,
            sample_rate,
            spectrum_len: spectrum.len(),
        };
        let needs_rebuild = state
            .filterbank
            .as_ref()
            .map(|fb| fb.key != key)
            .unwrap_or(true);
        if needs_rebuild {
            state.filterbank = Some(build_filterbank(key, BAR_FREQ_MIN_HZ, f_max, nyquist));
            state.filterbank_rebuilds += 1;
            tracing::debug!(
                "[SpectralAnalyzer] filterbank rebuilt: bars={} rate={} bins={}",
                bar_count,
                sample_rate,
                spectrum.len()
            );
        }
        let filterbank = state.filterbank.as_ref().unwrap();

        let mut bars = vec![0.0f32; bar_count];
        for (bar, filter) in bars.iter_mut().zip(filterbank.filters.iter()) {
            let mut energy = 0.0f32;
            for (i, &w) in filter.weights.iter().enumerate() {
                energy += spectrum[filter.start + i] * w;
            }
            // Perceptual compression: log-like curve keeps low levels visible
            // without flattening strong transients.
            let compressed = (1.0 + energy * 9.0).log10() * 1.1;
            *bar = compressed.clamp(0.0, 1.0);
        }
        bars
    }

    /// Number of filterbank rebuilds since construction (cache diagnostics).
    pub fn filterbank_rebuilds(&self) -> u64 {
        match self.state.lock() {
            Ok(guard) => guard.filterbank_rebuilds,
            Err(poisoned) => poisoned.into_inner().filterbank_rebuilds,
        }
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn next_power_of_two(x: usize) -> usize {
    let mut p = 1;
    while p < x {
        p <<= 1;
    }
    p
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

fn build_filterbank(key: FilterbankKey, f_min: f32, f_max: f32, nyquist: f32) -> Filterbank {
    let len = key.spectrum_len;
    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    let mel_step = (mel_max - mel_min) / (key.bar_count as f32 + 1.0);

    let mut filters = Vec::with_capacity(key.bar_count);
    for b in 0..key.bar_count {
        let f_left = mel_to_hz(mel_min + b as f32 * mel_step);
        let f_center = mel_to_hz(mel_min + (b as f32 + 1.0) * mel_step);
        let f_right = mel_to_hz(mel_min + (b as f32 + 2.0) * mel_step);

        let i_start = (((f_left / nyquist) * (len as f32 - 1.0)).floor() as usize).min(len - 2);
        let i_end = (((f_right / nyquist) * (len as f32 - 1.0)).ceil() as usize)
            .clamp(i_start + 1, len - 1);

        let mut weights = vec![0.0f32; i_end - i_start + 1];
        let mut sum = 0.0f32;
        for (i, w) in weights.iter_mut().enumerate() {
            let bin = i_start + i;
            let freq = bin as f32 / (len as f32 - 1.0) * nyquist;
            let value = if freq <= f_left || freq >= f_right {
                0.0
            } else if freq <= f_center {
                (freq - f_left) / (f_center - f_left).max(1e-6)
            } else {
                (f_right - freq) / (f_right - f_center).max(1e-6)
            };
            *w = value.max(0.0);
            sum += *w;
        }
        if sum > 1e-9 {
            for w in &mut weights {
                *w /= sum;
            }
        }

        filters.push(BarFilter {
            start: i_start,
            weights,
        });
    }

    Filterbank { key, filters }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frame(frequency: f32, sample_rate: u32, count: usize) -> AudioFrame {
        let samples = (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect();
        AudioFrame::new(samples, sample_rate)
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(1000), 1024);
        assert_eq!(next_power_of_two(1024), 1024);
        assert_eq!(next_power_of_two(1025), 2048);
    }

    #[test]
    fn test_magnitude_length_is_half_fft_size() {
        let analyzer = SpectralAnalyzer::new();
        let frame = sine_frame(440.0, 48_000, 1024);
        assert_eq!(analyzer.compute_magnitudes(&frame).len(), 512);

        // Non-power-of-two input rounds up and zero-pads
        let frame = sine_frame(440.0, 48_000, 1500);
        assert_eq!(analyzer.compute_magnitudes(&frame).len(), 1024);
    }

    #[test]
    fn test_long_frames_are_capped_at_max_fft_size() {
        let analyzer = SpectralAnalyzer::new();
        let frame = sine_frame(440.0, 48_000, 10_000);
        assert_eq!(analyzer.compute_magnitudes(&frame).len(), MAX_FFT_SIZE / 2);
    }

    #[test]
    fn test_empty_frame_yields_empty_spectrum() {
        let analyzer = SpectralAnalyzer::new();
        let frame = AudioFrame::new(Vec::new(), 48_000);
        assert!(analyzer.compute_magnitudes(&frame).is_empty());
    }

    #[test]
    fn test_sine_peak_lands_in_expected_bin() {
        let analyzer = SpectralAnalyzer::new();
        let sample_rate = 48_000;
        let frame = sine_frame(1000.0, sample_rate, 4096);
        let spectrum = analyzer.compute_magnitudes(&frame);

        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let bin_width = sample_rate as f32 / 4096.0;
        let peak_freq = peak_bin as f32 * bin_width;
        assert!(
            (peak_freq - 1000.0).abs() < 2.0 * bin_width,
            "peak at {} Hz, expected ~1000 Hz",
            peak_freq
        );
    }

    #[test]
    fn test_bars_length_and_range_for_valid_bar_counts() {
        let analyzer = SpectralAnalyzer::new();
        let frame = sine_frame(440.0, 48_000, 2048);
        let spectrum = analyzer.compute_magnitudes(&frame);

        for bar_count in [8usize, 16, 64, 256] {
            let bars = analyzer.compute_bars(&spectrum, 48_000, bar_count);
            assert_eq!(bars.len(), bar_count);
            assert!(bars.iter().all(|&b| (0.0..=1.0).contains(&b)));
        }
    }

    #[test]
    fn test_bars_of_empty_spectrum_are_zero() {
        let analyzer = SpectralAnalyzer::new();
        let bars = analyzer.compute_bars(&[], 48_000, 16);
        assert_eq!(bars, vec![0.0; 16]);
    }

    #[test]
    fn test_filterbank_cache_hit_and_rebuild() {
        let analyzer = SpectralAnalyzer::new();
        let frame = sine_frame(440.0, 48_000, 2048);
        let spectrum = analyzer.compute_magnitudes(&frame);

        analyzer.compute_bars(&spectrum, 48_000, 32);
        analyzer.compute_bars(&spectrum, 48_000, 32);
        assert_eq!(analyzer.filterbank_rebuilds(), 1, "identical key must not rebuild");

        analyzer.compute_bars(&spectrum, 48_000, 64);
        assert_eq!(analyzer.filterbank_rebuilds(), 2, "changed bar count rebuilds once");

        analyzer.compute_bars(&spectrum, 48_000, 64);
        assert_eq!(analyzer.filterbank_rebuilds(), 2);
    }

    #[test]
    fn test_loud_sine_raises_some_bar() {
        let analyzer = SpectralAnalyzer::new();
        let frame = sine_frame(440.0, 48_000, 4096);
        let spectrum = analyzer.compute_magnitudes(&frame);
        let bars = analyzer.compute_bars(&spectrum, 48_000, 32);
        let max = bars.iter().cloned().fold(0.0f32, f32::max);
        assert!(max > 0.1, "expected a visible bar, max was {}", max);
    }
}
