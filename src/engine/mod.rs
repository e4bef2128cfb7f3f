//! FluxEngine: the frame scheduler that fronts the analysis pipeline.
//!
//! Decouples rendering cadence from capture cadence: frames are throttled to
//! the configured target FPS and served from a cache in between, and
//! concurrent callers coalesce onto a single in-flight pipeline execution
//! through a mutex-guarded pending-operation slot holding a shared future.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalysisPipeline;
use crate::config::VisualizerSettings;
use crate::error::{log_engine_error, EngineError};
use crate::ports::{AudioInputPort, SettingsPort, SystemTimeSource, TimeSource};
use crate::types::VisualizerFrame;

/// FFT window sizes for the adaptive capture profiles.
pub const LOW_LATENCY_WINDOW: usize = 512;
pub const BALANCED_WINDOW: usize = 1024;
pub const STABLE_WINDOW: usize = 2048;

type FrameResult = Result<VisualizerFrame, EngineError>;
type SharedExecution = Shared<BoxFuture<'static, FrameResult>>;

struct CachedFrame {
    frame: VisualizerFrame,
    produced_at: Instant,
}

#[derive(Default)]
struct FlightState {
    cached: Option<CachedFrame>,
    inflight: Option<SharedExecution>,
}

/// Frame scheduler over one analysis pipeline instance.
///
/// Cheap to share: callers hold it behind an `Arc` and invoke
/// [`FluxEngine::get_frame`] from any task.
pub struct FluxEngine {
    audio: Arc<dyn AudioInputPort>,
    settings: Arc<dyn SettingsPort>,
    time: Arc<dyn TimeSource>,
    pipeline: Arc<Mutex<AnalysisPipeline>>,
    flight: Arc<Mutex<FlightState>>,
    executions: Arc<AtomicU64>,
}

impl FluxEngine {
    /// Create an engine with the system clock.
    ///
    /// Fails fast if the settings store currently holds out-of-range values.
    pub fn new(
        audio: Arc<dyn AudioInputPort>,
        settings: Arc<dyn SettingsPort>,
    ) -> Result<Self, EngineError> {
        Self::with_time_source(audio, settings, Arc::new(SystemTimeSource::default()))
    }

    /// Create an engine with an explicit time source (deterministic tests).
    pub fn with_time_source(
        audio: Arc<dyn AudioInputPort>,
        settings: Arc<dyn SettingsPort>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, EngineError> {
        settings.get().validate()?;
        Ok(Self {
            audio,
            settings,
            time,
            pipeline: Arc::new(Mutex::new(AnalysisPipeline::new())),
            flight: Arc::new(Mutex::new(FlightState::default())),
            executions: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Produce the current visualizer frame.
    ///
    /// Within one frame interval the cached frame is returned unchanged. While
    /// a computation is in flight, callers attach to it instead of starting a
    /// duplicate pass. Cancellation is honored only while the execution is
    /// blocked on the audio read; a completed frame is always delivered whole.
    pub async fn get_frame(&self, cancel: CancellationToken) -> FrameResult {
        let execution = {
            let mut flight = self
                .flight
                .lock()
                .map_err(|_| EngineError::LockPoisoned { component: "flight" })?;

            let settings = self.settings.get().clamped();
            let interval = Duration::from_secs_f64(1.0 / settings.target_fps as f64);
            if let Some(cached) = &flight.cached {
                let elapsed = self
                    .time
                    .now()
                    .saturating_duration_since(cached.produced_at);
                if elapsed < interval {
                    tracing::trace!("[FluxEngine] serving cached frame ({:?} old)", elapsed);
                    return Ok(cached.frame.clone());
                }
            }

            match &flight.inflight {
                Some(shared) => {
                    tracing::trace!("[FluxEngine] joining in-flight execution");
                    shared.clone()
                }
                None => {
                    let shared = self.start_execution(settings, cancel).shared();
                    flight.inflight = Some(shared.clone());
                    shared
                }
            }
        };

        execution.await
    }

    /// Convenience accessor for bar heights only.
    pub async fn get_bars(&self, cancel: CancellationToken) -> Result<Vec<f32>, EngineError> {
        Ok(self.get_frame(cancel).await?.bars)
    }

    /// Number of physical pipeline executions so far.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    fn start_execution(
        &self,
        settings: VisualizerSettings,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, FrameResult> {
        let audio = Arc::clone(&self.audio);
        let pipeline = Arc::clone(&self.pipeline);
        let flight = Arc::clone(&self.flight);
        let time = Arc::clone(&self.time);
        let executions = Arc::clone(&self.executions);

        async move {
            let min_samples = fft_window_for(&settings);
            let result = match audio.read_frame(min_samples, cancel).await {
                Ok(frame) => {
                    executions.fetch_add(1, Ordering::Relaxed);
                    let now = time.now();
                    match pipeline.lock() {
                        Ok(mut pipeline) => Ok(pipeline.process(&frame, &settings, now)),
                        Err(_) => Err(EngineError::LockPoisoned {
                            component: "pipeline",
                        }),
                    }
                }
                Err(err) => Err(err),
            };

            // Clear the pending slot and refresh the cache before any joined
            // caller observes the result.
            match flight.lock() {
                Ok(mut flight) => {
                    flight.inflight = None;
                    if let Ok(frame) = &result {
                        flight.cached = Some(CachedFrame {
                            frame: frame.clone(),
                            produced_at: time.now(),
                        });
                    }
                }
                Err(_) => {
                    return Err(EngineError::LockPoisoned { component: "flight" });
                }
            }
            if let Err(err) = &result {
                if *err != EngineError::Cancelled {
                    log_engine_error(err, "get_frame");
                }
            }
            result
        }
        .boxed()
    }
}

/// Capture window size for the current settings profile.
///
/// Low smoothing plus a high frame rate wants the small low-latency window;
/// heavy smoothing at a relaxed rate can afford the long stable window.
pub fn fft_window_for(settings: &VisualizerSettings) -> usize {
    if settings.smoothing <= 0.3 && settings.target_fps >= 120 {
        LOW_LATENCY_WINDOW
    } else if settings.smoothing >= 0.7 && settings.target_fps <= 60 {
        STABLE_WINDOW
    } else {
        BALANCED_WINDOW
    }
}
