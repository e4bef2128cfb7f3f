// EnvelopeSmoother - asymmetric attack/release smoothing with band emphasis.
//
// Rising values blend fast, falling values blend slow, so bars snap up on
// transients and settle gently. Before blending, each raw bar is scaled by the
// responsiveness gain and by triangular bass/treble emphasis ramps over the
// outer bars.

use crate::config::VisualizerSettings;

/// Release blend ceiling applied while silent with fade-on-silence disabled.
/// Tuned constant from the legacy decay mode, not a derived value.
pub const SILENT_RELEASE_BLEND: f32 = 0.35;

/// Fraction of bars covered by each emphasis ramp.
const EMPHASIS_EDGE_FRACTION: f32 = 0.45;

/// Per-bar asymmetric IIR smoother.
pub struct EnvelopeSmoother {
    previous: Vec<f32>,
}

impl EnvelopeSmoother {
    pub fn new() -> Self {
        Self {
            previous: Vec::new(),
        }
    }

    /// Last smoothed bar values (the held shape during silence).
    pub fn current(&self) -> &[f32] {
        &self.previous
    }

    /// Smooth one set of raw bar values.
    ///
    /// `silent` selects the legacy fast-decay mode when fade-on-silence is
    /// disabled. Output values are clamped to [0, 1] and stored as the new
    /// previous state.
    pub fn smooth(
        &mut self,
        raw_bars: &[f32],
        settings: &VisualizerSettings,
        silent: bool,
    ) -> Vec<f32> {
        if self.previous.len() != raw_bars.len() {
            self.previous = vec![0.0; raw_bars.len()];
        }

        let smoothing = settings.smoothing;
        let attack_blend = 0.25 + 0.35 * smoothing;
        let mut release_blend = 0.65 + 0.25 * smoothing;
        if silent && !settings.fade_on_silence_enabled {
            release_blend = release_blend.min(SILENT_RELEASE_BLEND);
        }
        let gain = 0.5 + 0.5 * settings.responsiveness;

        let count = raw_bars.len();
        let mut output = Vec::with_capacity(count);
        for (i, (&raw, prev)) in raw_bars.iter().zip(self.previous.iter_mut()).enumerate() {
            let mut value = (raw * gain).clamp(0.0, 1.0);
            value = (value * emphasis_gain(i, count, settings)).clamp(0.0, 1.0);

            let blend = if value >= *prev {
                attack_blend
            } else {
                release_blend
            };
            let smoothed = (blend * *prev + (1.0 - blend) * value).clamp(0.0, 1.0);
            *prev = smoothed;
            output.push(smoothed);
        }
        output
    }
}

impl Default for EnvelopeSmoother {
    fn default() -> Self {
        Self::new()
    }
}

// Triangular emphasis: full factor at the outermost bar, fading linearly to
// neutral at the edge of the ramp region.
fn emphasis_gain(index: usize, count: usize, settings: &VisualizerSettings) -> f32 {
    if count < 2 {
        return 1.0;
    }
    let position = index as f32 / (count as f32 - 1.0);
    let mut gain = 1.0;
    if position < EMPHASIS_EDGE_FRACTION {
        let ramp = 1.0 - position / EMPHASIS_EDGE_FRACTION;
        gain *= 1.0 + (settings.bass_emphasis - 1.0) * ramp;
    }
    let treble_start = 1.0 - EMPHASIS_EDGE_FRACTION;
    if position > treble_start {
        let ramp = (position - treble_start) / EMPHASIS_EDGE_FRACTION;
        gain *= 1.0 + (settings.treble_emphasis - 1.0) * ramp;
    }
    gain.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VisualizerSettings {
        VisualizerSettings {
            responsiveness: 1.0,
            smoothing: 0.5,
            bass_emphasis: 1.0,
            treble_emphasis: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_rise_is_faster_than_decay() {
        let mut smoother = EnvelopeSmoother::new();
        let cfg = settings();

        let up = smoother.smooth(&[1.0; 8], &cfg, false);
        let risen = up[0];
        assert!(risen > 0.4, "rise too slow: {}", risen);

        let down = smoother.smooth(&[0.0; 8], &cfg, false);
        // Release keeps most of the previous value
        assert!(down[0] > risen * 0.6, "decay too fast: {}", down[0]);
        assert!(down[0] < risen);
    }

    #[test]
    fn test_decays_instead_of_dropping_instantly() {
        let mut smoother = EnvelopeSmoother::new();
        let cfg = VisualizerSettings {
            smoothing: 0.8,
            responsiveness: 1.0,
            ..Default::default()
        };
        let first = smoother.smooth(&[0.8; 16], &cfg, false);
        let second = smoother.smooth(&[0.0; 16], &cfg, false);
        assert!(first[0] > 0.01);
        assert!(second[0] <= first[0]);
        assert!(second[0] > 0.0, "bars must fade, not vanish");
    }

    #[test]
    fn test_silent_legacy_mode_floors_release() {
        let cfg = VisualizerSettings {
            fade_on_silence_enabled: false,
            smoothing: 1.0,
            responsiveness: 1.0,
            ..Default::default()
        };

        let mut floored = EnvelopeSmoother::new();
        floored.smooth(&[1.0; 4], &cfg, false);
        let fast = floored.smooth(&[0.0; 4], &cfg, true)[0];

        let mut normal = EnvelopeSmoother::new();
        normal.smooth(&[1.0; 4], &cfg, false);
        let slow = normal.smooth(&[0.0; 4], &cfg, false)[0];

        assert!(
            fast < slow,
            "floored release ({}) should decay faster than normal ({})",
            fast,
            slow
        );
    }

    #[test]
    fn test_responsiveness_scales_input() {
        let sluggish_cfg = VisualizerSettings {
            responsiveness: 0.0,
            smoothing: 0.0,
            ..Default::default()
        };
        let lively_cfg = VisualizerSettings {
            responsiveness: 1.0,
            smoothing: 0.0,
            ..Default::default()
        };

        let mut sluggish = EnvelopeSmoother::new();
        let mut lively = EnvelopeSmoother::new();
        let low = sluggish.smooth(&[1.0; 4], &sluggish_cfg, false)[0];
        let high = lively.smooth(&[1.0; 4], &lively_cfg, false)[0];
        assert!(high > low);
    }

    #[test]
    fn test_bass_emphasis_boosts_low_bars_only() {
        let cfg = VisualizerSettings {
            bass_emphasis: 2.0,
            treble_emphasis: 1.0,
            responsiveness: 1.0,
            smoothing: 0.0,
            ..Default::default()
        };
        let mut boosted = EnvelopeSmoother::new();
        let mut neutral = EnvelopeSmoother::new();
        let neutral_cfg = VisualizerSettings {
            bass_emphasis: 1.0,
            ..cfg.clone()
        };

        let raw = vec![0.3; 32];
        let with_boost = boosted.smooth(&raw, &cfg, false);
        let without = neutral.smooth(&raw, &neutral_cfg, false);

        assert!(with_boost[0] > without[0], "lowest bar should be boosted");
        // Middle of the range is outside both ramps
        assert!((with_boost[16] - without[16]).abs() < 1e-6);
    }

    #[test]
    fn test_output_stays_in_unit_range() {
        let cfg = VisualizerSettings {
            bass_emphasis: 2.0,
            treble_emphasis: 2.0,
            responsiveness: 1.0,
            smoothing: 0.0,
            ..Default::default()
        };
        let mut smoother = EnvelopeSmoother::new();
        for _ in 0..10 {
            let out = smoother.smooth(&[5.0; 16], &cfg, false);
            assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_bar_count_change_resets_state() {
        let mut smoother = EnvelopeSmoother::new();
        let cfg = settings();
        smoother.smooth(&[1.0; 8], &cfg, false);
        let out = smoother.smooth(&[0.0; 16], &cfg, false);
        assert_eq!(out.len(), 16);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
