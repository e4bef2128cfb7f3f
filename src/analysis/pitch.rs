// PitchEstimator - autocorrelation pitch with a chroma fallback.
//
// Primary path: normalized autocorrelation over the 60-800 Hz fundamental
// range, mapped to a pitch class on the hue circle. When the correlation peak
// is weak (chords, noise) a 12-bin chroma histogram over the spectrum picks
// the dominant pitch class instead.

use crate::types::AudioFrame;

/// Longest prefix of the frame used for autocorrelation.
const MAX_ANALYSIS_SAMPLES: usize = 4096;
/// Fundamental search range in Hz; lag range is sample_rate / these.
const MIN_FUNDAMENTAL_HZ: f32 = 60.0;
const MAX_FUNDAMENTAL_HZ: f32 = 800.0;
/// Mean-square power below which the frame counts as silent.
const ENERGY_GATE: f32 = 1e-7;
/// Correlation peaks rescale from [0.5, 1] onto [0, 1].
const CORRELATION_FLOOR: f32 = 0.5;
/// Below this strength the chroma fallback takes over.
const CHROMA_FALLBACK_STRENGTH: f32 = 0.25;
/// Spectrum range contributing to the chroma histogram.
const CHROMA_MIN_HZ: f32 = 60.0;
const CHROMA_MAX_HZ: f32 = 5000.0;
/// Chroma dominance converts to strength at this rate.
const CHROMA_STRENGTH_SCALE: f32 = 0.8;
/// Minimum spectrum length worth scanning for chroma.
const MIN_CHROMA_SPECTRUM_LEN: usize = 16;

/// Pitch estimate: hue in [0, 1), strength in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchReading {
    pub hue: f32,
    pub strength: f32,
}

/// Autocorrelation pitch estimator with chroma fallback.
pub struct PitchEstimator {
    _unit: (),
}

impl PitchEstimator {
    pub fn new() -> Self {
        Self { _unit: () }
    }

    /// Estimate the dominant pitch of a frame.
    ///
    /// Near-silent input yields (0, 0). Only called on non-silent frames by
    /// the pipeline, but the guards stand on their own.
    pub fn estimate(&self, frame: &AudioFrame, spectrum: &[f32]) -> PitchReading {
        let samples = &frame.samples[..frame.samples.len().min(MAX_ANALYSIS_SAMPLES)];
        if samples.len() < 2 || frame.sample_rate == 0 {
            return PitchReading::default();
        }

        let power: f32 =
            samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32;
        if power < ENERGY_GATE {
            return PitchReading::default();
        }

        let mut reading = PitchReading::default();
        if let Some((frequency, peak)) = autocorrelation_peak(samples, frame.sample_rate) {
            let note = midi_note(frequency);
            reading.hue = note.rem_euclid(12.0) / 12.0;
            reading.strength =
                ((peak - CORRELATION_FLOOR) / (1.0 - CORRELATION_FLOOR)).clamp(0.0, 1.0);
        }

        if reading.strength < CHROMA_FALLBACK_STRENGTH {
            if let Some((class, dominance)) =
                dominant_chroma_class(spectrum, frame.sample_rate)
            {
                reading.hue = class as f32 / 12.0;
                reading.strength = reading
                    .strength
                    .max((dominance * CHROMA_STRENGTH_SCALE).clamp(0.0, 1.0));
            }
        }

        reading
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self::new()
    }
}

fn midi_note(frequency: f32) -> f32 {
    69.0 + 12.0 * (frequency / 440.0).log2()
}

// Scan lags for the fundamental range and return (frequency, normalized peak).
// Correlations are normalized by the geometric mean of segment energies so a
// pure periodic signal peaks near 1 regardless of amplitude.
fn autocorrelation_peak(samples: &[f32], sample_rate: u32) -> Option<(f32, f32)> {
    let n = samples.len();
    let lag_min = ((sample_rate as f32 / MAX_FUNDAMENTAL_HZ).floor() as usize).max(1);
    let lag_max = ((sample_rate as f32 / MIN_FUNDAMENTAL_HZ).ceil() as usize).min(n / 2);
    if lag_min >= lag_max {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0f32;
    for lag in lag_min..=lag_max {
        let overlap = n - lag;
        let mut cross = 0.0f32;
        let mut energy_a = 0.0f32;
        let mut energy_b = 0.0f32;
        for i in 0..overlap {
            let a = samples[i];
            let b = samples[i + lag];
            cross += a * b;
            energy_a += a * a;
            energy_b += b * b;
        }
        let norm = (energy_a * energy_b).sqrt();
        if norm <= f32::EPSILON {
            continue;
        }
        let corr = cross / norm;
        if corr.is_finite() && corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return None;
    }
    Some((sample_rate as f32 / best_lag as f32, best_corr))
}

// Magnitude-weighted 12-bin chroma histogram over 60-5000 Hz; returns the
// dominant pitch class and its share of the total.
fn dominant_chroma_class(spectrum: &[f32], sample_rate: u32) -> Option<(usize, f32)> {
    if spectrum.len() < MIN_CHROMA_SPECTRUM_LEN || sample_rate == 0 {
        return None;
    }
    let nyquist = sample_rate as f32 / 2.0;
    let last = (spectrum.len() - 1) as f32;

    let mut chroma = [0.0f32; 12];
    for (bin, &magnitude) in spectrum.iter().enumerate().skip(1) {
        let freq = bin as f32 / last * nyquist;
        if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&freq) {
            continue;
        }
        let class = (midi_note(freq).round() as i32).rem_euclid(12) as usize;
        chroma[class] += magnitude;
    }

    let total: f32 = chroma.iter().sum();
    if total <= f32::EPSILON {
        return None;
    }
    let (class, &peak) = chroma
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;
    Some((class, peak / total))
}
