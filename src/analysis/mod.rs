// Analysis module - the synchronous DSP pipeline behind the frame scheduler.
//
// Pipeline per frame:
//   SilenceGate -> SpectralAnalyzer -> {BandEnergyEstimator, BeatDetector,
//   PitchEstimator} -> EnvelopeSmoother -> VisualizerFrame
//
// The scheduler owns one AnalysisPipeline behind a std::sync::Mutex and calls
// process() once per accepted cycle; nothing here ever awaits.

use std::time::{Duration, Instant};

use crate::config::VisualizerSettings;
use crate::types::{AudioFrame, VisualizerFrame};

pub mod bands;
pub mod beat;
pub mod envelope;
pub mod history;
pub mod pitch;
pub mod silence;
pub mod spectrum;

use beat::BeatDetector;
use envelope::EnvelopeSmoother;
use pitch::PitchEstimator;
use silence::SilenceGate;
use spectrum::SpectralAnalyzer;

/// Owns every analyzer plus the inter-frame timing state.
pub struct AnalysisPipeline {
    spectral: SpectralAnalyzer,
    beat: BeatDetector,
    pitch: PitchEstimator,
    envelope: EnvelopeSmoother,
    gate: SilenceGate,
    last_processed_at: Option<Instant>,
}

impl AnalysisPipeline {
    pub fn new() -> Self {
        Self {
            spectral: SpectralAnalyzer::new(),
            beat: BeatDetector::new(),
            pitch: PitchEstimator::new(),
            envelope: EnvelopeSmoother::new(),
            gate: SilenceGate::new(),
            last_processed_at: None,
        }
    }

    /// Run one full analysis pass over a captured frame.
    ///
    /// Settings are re-clamped here so a bad value from the store degrades
    /// instead of destabilizing the pipeline. Zero-length frames produce
    /// all-zero output rather than failing.
    pub fn process(
        &mut self,
        frame: &AudioFrame,
        settings: &VisualizerSettings,
        now: Instant,
    ) -> VisualizerFrame {
        let settings = settings.clamped();
        let bar_count = settings.bar_count as usize;

        let dt = match self.last_processed_at {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_secs_f64(1.0 / settings.target_fps as f64),
        };
        self.last_processed_at = Some(now);

        let rms = frame.rms();
        let update = self.gate.update(rms, dt, &settings);

        if update.became_silent {
            tracing::debug!("[AnalysisPipeline] silence transition, clearing beat state");
            self.beat.reset();
        }

        if update.is_silent || frame.samples.is_empty() {
            return self.silent_frame(bar_count, &settings, update.is_silent, update.fade);
        }

        let spectrum = self.spectral.compute_magnitudes(frame);
        if spectrum.len() < 2 {
            return self.silent_frame(bar_count, &settings, false, update.fade);
        }

        let raw_bars = self
            .spectral
            .compute_bars(&spectrum, frame.sample_rate, bar_count);
        let energies = bands::band_energies(&spectrum, frame.sample_rate);
        let beat = self.beat.process(&spectrum, frame.sample_rate, now);
        let pitch = self.pitch.estimate(frame, &spectrum);
        let bars = self.envelope.smooth(&raw_bars, &settings, false);

        tracing::trace!(
            "[AnalysisPipeline] frame: rms {:.4}, bass {:.2}, beat {}, fade {:.2}",
            rms,
            energies.bass,
            beat.is_beat,
            update.fade
        );

        VisualizerFrame {
            bars,
            bass: energies.bass,
            mid: energies.mid,
            treble: energies.treble,
            is_beat: beat.is_beat,
            beat_strength: beat.strength,
            silence_fade: update.fade,
            pitch_hue: pitch.hue,
            pitch_strength: pitch.strength,
        }
    }

    // Output while silent (or for degenerate frames): bands, beat and pitch
    // read neutral. With fade enabled the bars hold their last shape and the
    // renderer applies the fade factor; in legacy mode they decay through the
    // smoother's floored release.
    fn silent_frame(
        &mut self,
        bar_count: usize,
        settings: &VisualizerSettings,
        silent: bool,
        fade: f32,
    ) -> VisualizerFrame {
        let bars = if settings.fade_on_silence_enabled {
            let held = self.envelope.current();
            if held.len() == bar_count {
                held.to_vec()
            } else {
                vec![0.0; bar_count]
            }
        } else {
            self.envelope
                .smooth(&vec![0.0; bar_count], settings, silent)
        };

        VisualizerFrame {
            bars,
            ..VisualizerFrame::empty(0, fade)
        }
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}
