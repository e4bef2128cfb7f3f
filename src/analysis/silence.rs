// SilenceGate - RMS silence detection and fade-factor state.
//
// The gate owns the silence fade factor: it integrates toward 0 while silent
// and back toward 1 while active, at the rates configured in settings. It also
// reports the silent->active and active->silent transitions the pipeline uses
// to clear beat state.

use std::time::Duration;

use crate::config::VisualizerSettings;

/// RMS level below which a frame counts as silent.
pub const SILENCE_RMS_THRESHOLD: f32 = 1e-3;

/// Result of advancing the gate by one frame.
#[derive(Debug, Clone, Copy)]
pub struct SilenceUpdate {
    pub is_silent: bool,
    /// True exactly on the active->silent transition.
    pub became_silent: bool,
    /// Current fade factor in [0, 1].
    pub fade: f32,
}

pub struct SilenceGate {
    fade: f32,
    was_silent: bool,
}

impl SilenceGate {
    pub fn new() -> Self {
        Self {
            fade: 1.0,
            was_silent: false,
        }
    }

    /// Advance the gate by `dt` given the frame's RMS level.
    pub fn update(
        &mut self,
        rms: f32,
        dt: Duration,
        settings: &VisualizerSettings,
    ) -> SilenceUpdate {
        let is_silent = rms < SILENCE_RMS_THRESHOLD;
        let became_silent = is_silent && !self.was_silent;
        self.was_silent = is_silent;

        if settings.fade_on_silence_enabled {
            let dt = dt.as_secs_f32();
            if is_silent {
                let rate = dt / settings.silence_fade_out_seconds.max(f32::EPSILON);
                self.fade = (self.fade - rate).clamp(0.0, 1.0);
            } else {
                let rate = dt / settings.silence_fade_in_seconds.max(f32::EPSILON);
                self.fade = (self.fade + rate).clamp(0.0, 1.0);
            }
        } else {
            // Legacy mode: bars decay through the smoother instead of fading.
            self.fade = 1.0;
        }

        SilenceUpdate {
            is_silent,
            became_silent,
            fade: self.fade,
        }
    }

    pub fn fade(&self) -> f32 {
        self.fade
    }
}

impl Default for SilenceGate {
    fn default() -> Self {
        Self::new()
    }
}
