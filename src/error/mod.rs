// Error types for the engine dispatcher
//
// This module defines the dispatcher and audio backend error types together
// with numeric error codes, so callers on the control side can report failures consistently.

mod audio;
mod dispatch;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use dispatch::{log_dispatch_error, DispatchError, DispatchErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
