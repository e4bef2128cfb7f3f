// BeatDetector - multi-band spectral flux onset detection with tempo-aware
// refractory gating.
//
// Algorithm, per analysis frame:
// 1. Positive spectral flux per band (bass/mid/treble), normalized by the
//    band's total energy so loudness changes don't shift the operating point
// 2. Adaptive threshold per band: mean + k * stddev over a short flux history
// 3. 3-tap median prefilter on the flux before thresholding
// 4. Combined onset score: weighted average of per-band median/threshold ratios
// 5. Refractory gate: candidates inside the minimum inter-beat gap are
//    rejected; the gap adapts to the median of recent inter-beat intervals

use std::time::{Duration, Instant};

use super::bands::{band_bin_range, BASS_BAND_HZ, MID_BAND_HZ, TREBLE_BAND_HZ};
use super::history::FluxRing;

/// Flux history depth per band.
const BAND_FLUX_CAPACITY: usize = 32;
/// Flux history depth for the combined (full-spectrum) signal.
const COMBINED_FLUX_CAPACITY: usize = 64;
/// Inter-beat-interval history depth.
const INTERVAL_CAPACITY: usize = 32;

/// Threshold multipliers: threshold = mean + k * stddev.
const BAND_THRESHOLD_K: f32 = 1.2;
const COMBINED_THRESHOLD_K: f32 = 1.5;

/// Minimum filled window before a band may vote.
const MIN_WINDOW_FILL: usize = 4;
/// Combined score a candidate must clear to fire.
const COMBINED_FIRE_SCORE: f32 = 1.05;
/// Floor below which flux is treated as numerical noise.
const FLUX_EPSILON: f32 = 1e-6;

/// Refractory gate bounds.
const MIN_GAP_FLOOR: Duration = Duration::from_millis(80);
const MIN_GAP_CEILING_FLOOR: Duration = Duration::from_millis(160);
/// Recorded intervals required before the tempo estimate is trusted.
const STABLE_TEMPO_INTERVALS: usize = 4;

/// Band weights for the combined score (bass/mid/treble), renormalized over
/// whichever bands have a usable threshold.
const BAND_WEIGHTS: [f32; 3] = [0.5, 0.3, 0.2];

const BAND_RANGES: [(f32, f32); 3] = [BASS_BAND_HZ, MID_BAND_HZ, TREBLE_BAND_HZ];

/// Outcome of one detection step.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatReading {
    pub is_beat: bool,
    /// Onset strength in [0, 1]; 0 when no beat was accepted.
    pub strength: f32,
}

/// Multi-band adaptive onset detector.
pub struct BeatDetector {
    prev_magnitudes: Vec<f32>,
    band_flux: [FluxRing; 3],
    combined_flux: FluxRing,
    intervals: FluxRing,
    last_beat_at: Option<Instant>,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self {
            prev_magnitudes: Vec::new(),
            band_flux: [
                FluxRing::new(BAND_FLUX_CAPACITY),
                FluxRing::new(BAND_FLUX_CAPACITY),
                FluxRing::new(BAND_FLUX_CAPACITY),
            ],
            combined_flux: FluxRing::new(COMBINED_FLUX_CAPACITY),
            intervals: FluxRing::new(INTERVAL_CAPACITY),
            last_beat_at: None,
        }
    }

    /// Process one magnitude spectrum and decide whether a beat fires at `now`.
    pub fn process(&mut self, spectrum: &[f32], sample_rate: u32, now: Instant) -> BeatReading {
        if spectrum.len() < 3 {
            return BeatReading::default();
        }

        if self.prev_magnitudes.len() != spectrum.len() {
            // Spectrum size changed (adaptive FFT window); restart comparisons.
            self.prev_magnitudes = vec![0.0; spectrum.len()];
        }

        // Per-band normalized positive flux
        let mut band_medians = [0.0f32; 3];
        let mut band_thresholds = [0.0f32; 3];
        let mut band_fired = [false; 3];
        for (i, range_hz) in BAND_RANGES.iter().enumerate() {
            let flux = match band_bin_range(spectrum.len(), sample_rate, *range_hz) {
                Some((start, end)) => {
                    normalized_flux(&spectrum[start..=end], &self.prev_magnitudes[start..=end])
                }
                None => 0.0,
            };
            self.band_flux[i].push(flux);

            let median = self.band_flux[i].recent_median(3);
            let threshold =
                self.band_flux[i].mean() + BAND_THRESHOLD_K * self.band_flux[i].stddev();
            band_medians[i] = median;
            band_thresholds[i] = threshold;
            band_fired[i] = self.band_flux[i].len() > MIN_WINDOW_FILL
                && median > threshold
                && median > FLUX_EPSILON;
        }

        // Combined (full-spectrum) flux
        let combined = normalized_flux(spectrum, &self.prev_magnitudes);
        self.combined_flux.push(combined);
        let combined_threshold =
            self.combined_flux.mean() + COMBINED_THRESHOLD_K * self.combined_flux.stddev();

        self.prev_magnitudes.copy_from_slice(spectrum);

        // Weighted combined score over bands with a usable threshold
        let mut score = 0.0f32;
        let mut weight_sum = 0.0f32;
        for i in 0..3 {
            if self.band_flux[i].len() > MIN_WINDOW_FILL && band_thresholds[i] > FLUX_EPSILON {
                score += BAND_WEIGHTS[i] * (band_medians[i] / band_thresholds[i]);
                weight_sum += BAND_WEIGHTS[i];
            }
        }
        if weight_sum > 0.0 {
            score /= weight_sum;
        }

        let candidate = band_fired.iter().any(|&fired| fired) && score > COMBINED_FIRE_SCORE;
        if !candidate {
            return BeatReading::default();
        }

        // Refractory gate
        let min_gap = self.min_beat_gap();
        if let Some(last) = self.last_beat_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < min_gap {
                tracing::trace!(
                    "[BeatDetector] candidate rejected: {:?} inside refractory gap {:?}",
                    elapsed,
                    min_gap
                );
                return BeatReading::default();
            }
            self.intervals.push(elapsed.as_secs_f32());
        }
        self.last_beat_at = Some(now);

        let combined_ratio = if combined_threshold > FLUX_EPSILON {
            combined / combined_threshold
        } else {
            0.0
        };
        let strength = (0.55 * score + 0.45 * combined_ratio - 1.0).clamp(0.0, 1.0);
        tracing::debug!(
            "[BeatDetector] beat accepted: score {:.2}, strength {:.2}",
            score,
            strength
        );
        BeatReading {
            is_beat: true,
            strength,
        }
    }

    // Minimum gap between accepted beats. With a stable tempo the gap tracks
    // the median inter-beat interval; without one it falls back to the floor.
    fn min_beat_gap(&self) -> Duration {
        if self.intervals.len() < STABLE_TEMPO_INTERVALS {
            return MIN_GAP_FLOOR;
        }
        let median_ibi = Duration::from_secs_f32(self.intervals.median().max(0.0));
        let ceiling = MIN_GAP_CEILING_FLOOR.max(median_ibi.mul_f32(0.9));
        median_ibi.mul_f32(0.35).clamp(MIN_GAP_FLOOR, ceiling)
    }

    /// Drop all histories and the previous-spectrum snapshot.
    ///
    /// Called on silence transitions so the first frames after audio resumes
    /// are not compared against stale magnitudes.
    pub fn reset(&mut self) {
        for ring in &mut self.band_flux {
            ring.clear();
        }
        self.combined_flux.clear();
        self.intervals.clear();
        self.last_beat_at = None;
        self.prev_magnitudes.clear();
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new()
    }
}

// Positive-difference flux normalized by current total energy, so the result
// is invariant to overall volume. Near-silent bands read as zero flux.
fn normalized_flux(current: &[f32], previous: &[f32]) -> f32 {
    let total: f32 = current.iter().sum();
    if total <= FLUX_EPSILON {
        return 0.0;
    }
    let rise: f32 = current
        .iter()
        .zip(previous.iter())
        .map(|(cur, prev)| (cur - prev).max(0.0))
        .sum();
    rise / total
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48_000;
    const SPECTRUM_LEN: usize = 512;

    fn flat_spectrum(level: f32) -> Vec<f32> {
        vec![level; SPECTRUM_LEN]
    }

    fn bass_spike(base: f32, bass_level: f32) -> Vec<f32> {
        let mut spectrum = flat_spectrum(base);
        let (start, end) = band_bin_range(SPECTRUM_LEN, SAMPLE_RATE, BASS_BAND_HZ).unwrap();
        for bin in start..=end {
            spectrum[bin] = bass_level;
        }
        spectrum
    }

    fn warm_up(detector: &mut BeatDetector, start: Instant, frames: usize) -> Instant {
        let mut now = start;
        for _ in 0..frames {
            detector.process(&flat_spectrum(0.02), SAMPLE_RATE, now);
            now += Duration::from_millis(16);
        }
        now
    }

    #[test]
    fn test_no_beat_on_constant_spectrum() {
        let mut detector = BeatDetector::new();
        let mut now = Instant::now();
        for _ in 0..40 {
            let reading = detector.process(&flat_spectrum(0.05), SAMPLE_RATE, now);
            assert!(!reading.is_beat);
            now += Duration::from_millis(16);
        }
    }

    #[test]
    fn test_no_beat_on_silence() {
        let mut detector = BeatDetector::new();
        let mut now = Instant::now();
        for _ in 0..40 {
            let reading = detector.process(&flat_spectrum(0.0), SAMPLE_RATE, now);
            assert!(!reading.is_beat);
            now += Duration::from_millis(16);
        }
    }

    #[test]
    fn test_bass_attack_fires_after_window_fills() {
        let mut detector = BeatDetector::new();
        let mut now = warm_up(&mut detector, Instant::now(), 24);

        // Sustained rising attack: each frame quadruples the bass magnitude so
        // the 3-tap median stays elevated while the threshold lags behind.
        let mut fired = false;
        let mut strength = 0.0;
        for level in [0.4f32, 1.6, 6.4] {
            let reading = detector.process(&bass_spike(0.02, level), SAMPLE_RATE, now);
            if reading.is_beat {
                fired = true;
                strength = reading.strength;
            }
            now += Duration::from_millis(16);
        }
        assert!(fired, "rising bass attack should fire a beat");
        assert!(strength > 0.0, "accepted beat must carry strength");
    }

    #[test]
    fn test_refractory_gap_suppresses_immediate_retrigger() {
        let mut detector = BeatDetector::new();
        let mut now = warm_up(&mut detector, Instant::now(), 24);

        let mut first_beat_at = None;
        for level in [0.4f32, 1.6, 6.4, 25.6] {
            let reading = detector.process(&bass_spike(0.02, level), SAMPLE_RATE, now);
            if reading.is_beat {
                first_beat_at = Some(now);
                break;
            }
            now += Duration::from_millis(16);
        }
        let first_beat_at = first_beat_at.expect("attack should fire");

        // Identical rising attack 10 ms later: still a candidate, but inside
        // the 80 ms refractory floor.
        now = first_beat_at + Duration::from_millis(10);
        let reading = detector.process(&bass_spike(0.02, 102.4), SAMPLE_RATE, now);
        assert!(!reading.is_beat, "retrigger inside min gap must be rejected");

        // Well past the gap the detector may fire again.
        now = first_beat_at + Duration::from_millis(400);
        let reading = detector.process(&bass_spike(0.02, 409.6), SAMPLE_RATE, now);
        assert!(reading.is_beat, "beat after the gap should be accepted");
    }

    #[test]
    fn test_reset_clears_history() {
        let mut detector = BeatDetector::new();
        let now = warm_up(&mut detector, Instant::now(), 24);
        detector.reset();

        // Right after a reset the window is empty, so even a strong attack
        // cannot vote until the fill gate is passed again.
        let reading = detector.process(&bass_spike(0.02, 6.4), SAMPLE_RATE, now);
        assert!(!reading.is_beat);
    }

    #[test]
    fn test_degenerate_spectrum_is_ignored() {
        let mut detector = BeatDetector::new();
        let reading = detector.process(&[], SAMPLE_RATE, Instant::now());
        assert!(!reading.is_beat);
        let reading = detector.process(&[1.0, 2.0], SAMPLE_RATE, Instant::now());
        assert!(!reading.is_beat);
    }
}
