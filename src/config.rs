//! Visualizer settings shared with the settings collaborator.
//!
//! The settings port hands the engine a `VisualizerSettings` every frame.
//! Validation is fail-fast at engine construction; after that every runtime
//! read goes through [`VisualizerSettings::clamped`] so a store that slips an
//! out-of-range value past us cannot destabilize a running pipeline.

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Allowed bar counts for the spectrum display.
pub const BAR_COUNT_RANGE: (u32, u32) = (8, 256);
/// Allowed target frame rates for the scheduler.
pub const TARGET_FPS_RANGE: (u32, u32) = (10, 240);
/// Allowed silence fade durations in seconds.
pub const FADE_SECONDS_RANGE: (f32, f32) = (0.05, 10.0);
/// Allowed band emphasis factors.
pub const EMPHASIS_RANGE: (f32, f32) = (0.0, 2.0);

/// Analysis-relevant visualizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizerSettings {
    /// Number of spectrum bars to produce
    pub bar_count: u32,
    /// How strongly bars react to new input (0 = sluggish, 1 = immediate)
    pub responsiveness: f32,
    /// Temporal smoothing amount (0 = none, 1 = heavy)
    pub smoothing: f32,
    /// Frame rate the scheduler throttles to
    pub target_fps: u32,
    /// Low-end bar emphasis factor
    pub bass_emphasis: f32,
    /// High-end bar emphasis factor
    pub treble_emphasis: f32,
    /// Fade bars out/in around silence instead of dropping them
    pub fade_on_silence_enabled: bool,
    /// Seconds for the fade toward black once audio goes silent
    pub silence_fade_out_seconds: f32,
    /// Seconds for the fade back in once audio resumes
    pub silence_fade_in_seconds: f32,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            bar_count: 64,
            responsiveness: 0.7,
            smoothing: 0.5,
            target_fps: 60,
            bass_emphasis: 1.0,
            treble_emphasis: 1.0,
            fade_on_silence_enabled: true,
            silence_fade_out_seconds: 1.0,
            silence_fade_in_seconds: 0.3,
        }
    }
}

impl VisualizerSettings {
    /// Check every field against its documented range.
    ///
    /// # Returns
    /// * `Ok(())` - All fields in range
    /// * `Err(SettingsError::OutOfRange)` - First violating field
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range(
            "bar_count",
            self.bar_count as f64,
            BAR_COUNT_RANGE.0 as f64,
            BAR_COUNT_RANGE.1 as f64,
        )?;
        check_range("responsiveness", self.responsiveness as f64, 0.0, 1.0)?;
        check_range("smoothing", self.smoothing as f64, 0.0, 1.0)?;
        check_range(
            "target_fps",
            self.target_fps as f64,
            TARGET_FPS_RANGE.0 as f64,
            TARGET_FPS_RANGE.1 as f64,
        )?;
        check_range(
            "bass_emphasis",
            self.bass_emphasis as f64,
            EMPHASIS_RANGE.0 as f64,
            EMPHASIS_RANGE.1 as f64,
        )?;
        check_range(
            "treble_emphasis",
            self.treble_emphasis as f64,
            EMPHASIS_RANGE.0 as f64,
            EMPHASIS_RANGE.1 as f64,
        )?;
        check_range(
            "silence_fade_out_seconds",
            self.silence_fade_out_seconds as f64,
            FADE_SECONDS_RANGE.0 as f64,
            FADE_SECONDS_RANGE.1 as f64,
        )?;
        check_range(
            "silence_fade_in_seconds",
            self.silence_fade_in_seconds as f64,
            FADE_SECONDS_RANGE.0 as f64,
            FADE_SECONDS_RANGE.1 as f64,
        )?;
        Ok(())
    }

    /// Copy of these settings with every field forced into range.
    ///
    /// The pipeline applies this to every runtime read so one bad value from
    /// the settings store degrades to its nearest legal neighbour instead of
    /// propagating NaNs or division blowups through the DSP chain.
    pub fn clamped(&self) -> Self {
        Self {
            bar_count: self.bar_count.clamp(BAR_COUNT_RANGE.0, BAR_COUNT_RANGE.1),
            responsiveness: sanitize(self.responsiveness, 0.0, 1.0, 0.7),
            smoothing: sanitize(self.smoothing, 0.0, 1.0, 0.5),
            target_fps: self.target_fps.clamp(TARGET_FPS_RANGE.0, TARGET_FPS_RANGE.1),
            bass_emphasis: sanitize(self.bass_emphasis, EMPHASIS_RANGE.0, EMPHASIS_RANGE.1, 1.0),
            treble_emphasis: sanitize(
                self.treble_emphasis,
                EMPHASIS_RANGE.0,
                EMPHASIS_RANGE.1,
                1.0,
            ),
            fade_on_silence_enabled: self.fade_on_silence_enabled,
            silence_fade_out_seconds: sanitize(
                self.silence_fade_out_seconds,
                FADE_SECONDS_RANGE.0,
                FADE_SECONDS_RANGE.1,
                1.0,
            ),
            silence_fade_in_seconds: sanitize(
                self.silence_fade_in_seconds,
                FADE_SECONDS_RANGE.0,
                FADE_SECONDS_RANGE.1,
                0.3,
            ),
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    if value.is_nan() || value < min || value > max {
        return Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// NaN-aware clamp; NaN falls back to the default rather than poisoning math.
fn sanitize(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}
