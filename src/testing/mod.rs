//! Deterministic fixtures for tests and the CLI demo.
//!
//! The engine only ever sees ports, so a scripted audio source plus a manual
//! clock are enough to drive the whole pipeline without hardware. The signal
//! generators produce the synthetic scenarios (tones, kick bursts, silence)
//! used across unit tests, integration tests and `flux_cli`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::ports::{AudioInputPort, TimeSource};
use crate::types::AudioFrame;

/// Sample rate used by the synthetic fixtures.
pub const FIXTURE_SAMPLE_RATE: u32 = 48_000;

enum ExhaustionMode {
    /// Keep returning the final frame (a source that went quiet).
    RepeatLast,
    /// Wrap around to the first frame (a looping pattern).
    Loop,
}

/// Scripted audio source: serves a fixed sequence of frames.
///
/// Optionally gated behind a semaphore so tests can hold a read open and
/// observe callers coalescing on the in-flight execution.
pub struct ScriptedAudioInput {
    frames: Vec<AudioFrame>,
    cursor: Mutex<usize>,
    mode: ExhaustionMode,
    gate: Option<Arc<Semaphore>>,
    reads: AtomicU64,
}

impl ScriptedAudioInput {
    /// Source that repeats its last frame once the script runs out.
    pub fn repeating(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            cursor: Mutex::new(0),
            mode: ExhaustionMode::RepeatLast,
            gate: None,
            reads: AtomicU64::new(0),
        }
    }

    /// Source that plays its script in a loop.
    pub fn looping(frames: Vec<AudioFrame>) -> Self {
        Self {
            mode: ExhaustionMode::Loop,
            ..Self::repeating(frames)
        }
    }

    /// Gate every read behind a semaphore permit (starts with none).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Handle for releasing gated reads.
    pub fn gate(&self) -> Option<Arc<Semaphore>> {
        self.gate.clone()
    }

    /// Number of frames served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn next_frame(&self, min_samples: usize) -> AudioFrame {
        if self.frames.is_empty() {
            return silence_frame(FIXTURE_SAMPLE_RATE, min_samples);
        }
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = (*cursor).min(self.frames.len() - 1);
        *cursor = match self.mode {
            ExhaustionMode::RepeatLast => (index + 1).min(self.frames.len() - 1),
            ExhaustionMode::Loop => (index + 1) % self.frames.len(),
        };
        self.frames[index].clone()
    }
}

impl AudioInputPort for ScriptedAudioInput {
    fn read_frame(
        &self,
        min_samples: usize,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioFrame, EngineError>> {
        async move {
            if let Some(gate) = &self.gate {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    permit = gate.acquire() => match permit {
                        Ok(permit) => permit.forget(),
                        Err(_) => {
                            return Err(EngineError::AudioSource {
                                reason: "fixture gate closed".to_string(),
                            })
                        }
                    },
                }
            } else if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.reads.fetch_add(1, Ordering::Relaxed);
            Ok(self.next_frame(min_samples))
        }
        .boxed()
    }
}

/// Manually advanced clock for deterministic throttle/refractory tests.
pub struct ManualTimeSource {
    now: Mutex<Instant>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *now += delta;
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Pure sine tone.
pub fn sine_frame(frequency: f32, sample_rate: u32, count: usize, amplitude: f32) -> AudioFrame {
    let samples = (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect();
    AudioFrame::new(samples, sample_rate)
}

/// All-zero frame.
pub fn silence_frame(sample_rate: u32, count: usize) -> AudioFrame {
    AudioFrame::new(vec![0.0; count], sample_rate)
}

/// Kick-style burst: a low sine with an exponentially decaying envelope.
pub fn kick_frame(sample_rate: u32, count: usize, amplitude: f32) -> AudioFrame {
    let decay_samples = sample_rate as f32 * 0.05;
    let samples = (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = (-(i as f32) / decay_samples).exp();
            amplitude * envelope * (2.0 * std::f32::consts::PI * 55.0 * t).sin()
        })
        .collect();
    AudioFrame::new(samples, sample_rate)
}
