// Boundary types shared between the capture side and the rendering side.

use serde::{Deserialize, Serialize};

/// One chunk of raw PCM delivered by an [`crate::ports::AudioInputPort`].
///
/// Samples are mono amplitudes, nominally in [-1, 1]. Frames are ephemeral:
/// the pipeline consumes them immediately and never stores one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Root-mean-square level of the frame. Empty frames read as 0.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_squares / self.samples.len() as f64).sqrt() as f32
    }
}

/// Immutable per-frame output of the analysis pipeline.
///
/// Produced once per accepted scheduler cycle; every numeric field is already
/// clamped to its documented range so renderers can consume it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizerFrame {
    /// One height per bar, each in [0, 1].
    pub bars: Vec<f32>,
    /// Band energies in [0, 1].
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    /// Whether an onset was accepted this cycle.
    pub is_beat: bool,
    /// Strength of the accepted onset, in [0, 1]; 0 when `is_beat` is false.
    pub beat_strength: f32,
    /// Silence fade factor in [0, 1]; 1 while audio is active.
    pub silence_fade: f32,
    /// Dominant pitch class mapped onto the hue circle, in [0, 1).
    pub pitch_hue: f32,
    /// Confidence of the pitch estimate, in [0, 1].
    pub pitch_strength: f32,
}

impl VisualizerFrame {
    /// All-zero frame with `bar_count` bars and a given fade factor.
    pub(crate) fn empty(bar_count: usize, silence_fade: f32) -> Self {
        Self {
            bars: vec![0.0; bar_count],
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            is_beat: false,
            beat_strength: 0.0,
            silence_fade,
            pitch_hue: 0.0,
            pitch_strength: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant_signal() {
        let frame = AudioFrame::new(vec![0.5; 1024], 48_000);
        assert!((frame.rms() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rms_of_empty_frame_is_zero() {
        let frame = AudioFrame::new(Vec::new(), 48_000);
        assert_eq!(frame.rms(), 0.0);
    }

    #[test]
    fn test_visualizer_frame_serializes() {
        let frame = VisualizerFrame::empty(16, 1.0);
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: VisualizerFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bars.len(), 16);
        assert!(!parsed.is_beat);
    }
}
