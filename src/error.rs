// Error types for the Flux analysis core
//
// Settings violations fail fast at construction time; engine errors cover the
// async frame path. EngineError is Clone because a single in-flight frame
// computation fans its result out to every caller that joined it.

use log::error;
use std::fmt;

/// Settings validation errors
///
/// Raised when a settings value falls outside its documented range. Validation
/// runs once at engine construction; the running pipeline only ever sees
/// clamped values.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// A numeric field is outside its allowed range
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The backing store could not persist or load settings
    Storage { reason: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "setting `{}` = {} outside allowed range [{}, {}]",
                field, value, min, max
            ),
            SettingsError::Storage { reason } => {
                write!(f, "settings store failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Errors surfaced by the frame scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The caller's cancellation token fired while waiting on the audio read
    Cancelled,

    /// The audio source failed to deliver a frame
    AudioSource { reason: String },

    /// Settings were invalid at engine construction
    Settings(SettingsError),

    /// A pipeline lock was poisoned by a panicking thread
    LockPoisoned { component: &'static str },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Cancelled => write!(f, "frame request cancelled during audio read"),
            EngineError::AudioSource { reason } => {
                write!(f, "audio source failed: {}", reason)
            }
            EngineError::Settings(err) => write!(f, "invalid settings: {}", err),
            EngineError::LockPoisoned { component } => {
                write!(f, "lock poisoned on {}", component)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Settings(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SettingsError> for EngineError {
    fn from(err: SettingsError) -> Self {
        EngineError::Settings(err)
    }
}

/// Log an engine error with component context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!("Engine error in {}: {}", context, err);
}
