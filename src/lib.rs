// Flux Core - audio visualizer analysis engine
// Turns raw PCM into per-frame bar/beat/pitch descriptions for real-time display

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod testing;
pub mod types;

// Re-exports for convenience
pub use config::VisualizerSettings;
pub use engine::FluxEngine;
pub use error::{EngineError, SettingsError};
pub use ports::{
    AudioInputPort, InMemorySettingsStore, JsonSettingsStore, SettingsPort, SystemTimeSource,
    TimeSource,
};
pub use types::{AudioFrame, VisualizerFrame};
