// Audio backend error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio backend error code constants
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Sample rate, block size, or channel count is zero
    pub const INVALID_FORMAT: i32 = 1001;

    /// The OS refused to spawn the audio thread
    pub const THREAD_SPAWN_FAILED: i32 = 1002;

    /// The audio thread panicked; its dispatcher is lost
    pub const THREAD_PANICKED: i32 = 1003;

    /// The backend was already stopped
    pub const NOT_RUNNING: i32 = 1004;
}

/// Log an audio error with structured context
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=StubAudioBackend, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while starting or stopping the audio thread
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    InvalidFormat { reason: String },

    ThreadSpawnFailed { reason: String },

    ThreadPanicked,

    NotRunning,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::InvalidFormat { .. } => AudioErrorCodes::INVALID_FORMAT,
            AudioError::ThreadSpawnFailed { .. } => AudioErrorCodes::THREAD_SPAWN_FAILED,
            AudioError::ThreadPanicked => AudioErrorCodes::THREAD_PANICKED,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::InvalidFormat { reason } => format!("Invalid audio format: {}", reason),
            AudioError::ThreadSpawnFailed { reason } => {
                format!("Failed to spawn audio thread: {}", reason)
            }
            AudioError::ThreadPanicked => "Audio thread panicked".to_string(),
            AudioError::NotRunning => "Audio backend not running".to_string(),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::ThreadSpawnFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            AudioError::InvalidFormat {
                reason: String::new(),
            }
            .code(),
            AudioError::ThreadSpawnFailed {
                reason: String::new(),
            }
            .code(),
            AudioError::ThreadPanicked.code(),
            AudioError::NotRunning.code(),
        ];
        assert_eq!(codes, [1001, 1002, 1003, 1004]);
    }

    #[test]
    fn test_io_error_maps_to_spawn_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
        let err: AudioError = io.into();
        assert_eq!(err.code(), AudioErrorCodes::THREAD_SPAWN_FAILED);
        assert!(err.message().contains("no threads left"));
    }

    #[test]
    fn test_display_includes_code() {
        let display = AudioError::ThreadPanicked.to_string();
        assert!(display.contains("1003"));
        assert!(display.contains("Audio thread panicked"));
    }
}
