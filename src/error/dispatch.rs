// Dispatcher error types and constants

use crate::engine::EngineType;
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Dispatcher error code constants
///
/// Single source of truth for the numeric codes reported by [`DispatchError`].
///
/// Error code range: 3001-3008
pub struct DispatchErrorCodes {}

impl DispatchErrorCodes {
    /// Engine index outside the registered range (direct API only)
    pub const INVALID_SELECTION: i32 = 3001;

    /// No engine registered under the requested name
    pub const ENGINE_NOT_FOUND: i32 = 3002;

    /// A factory with the same name is already registered
    pub const DUPLICATE_FACTORY: i32 = 3003;

    /// A persisted state segment could not be applied
    pub const MALFORMED_PERSISTED_STATE: i32 = 3004;

    /// Engine category does not match the dispatcher's category
    pub const TYPE_MISMATCH: i32 = 3005;

    /// Dispatcher constructed from a registry without factories
    pub const EMPTY_REGISTRY: i32 = 3006;

    /// Action queue has no free slot
    pub const ACTION_QUEUE_FULL: i32 = 3007;

    /// Preset index outside the active engine's preset list
    pub const PRESET_NOT_FOUND: i32 = 3008;
}

/// Log a dispatcher error with structured context
///
/// Used for errors that have no synchronous caller to report to (drained
/// actions, lenient document loading).
pub fn log_dispatch_error(err: &DispatchError, context: &str) {
    error!(
        "Dispatch error in {}: code={}, component=EngineDispatcher, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Dispatcher-related errors
///
/// Direct calls (`select`, `register_factory`, ...) surface these to the
/// caller. Errors produced while draining actions are absorbed and only
/// logged.
///
/// Error code range: 3001-3008
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Engine index is outside `[0, count)`
    InvalidSelection { index: usize, count: usize },

    /// No registered engine carries this name
    EngineNotFound { name: String },

    /// Registration collided with an existing factory name
    DuplicateFactory { name: String },

    /// A state blob or preset list failed to parse or apply
    MalformedPersistedState { engine: String, reason: String },

    /// Engine category mismatch between factory and dispatcher
    TypeMismatch {
        expected: EngineType,
        found: EngineType,
    },

    /// Registry has no factories to construct from
    EmptyRegistry,

    /// Action queue is full; the action was not enqueued
    ActionQueueFull,

    /// Preset index is outside the active engine's preset list
    PresetNotFound { index: usize },
}

impl DispatchError {
    pub(crate) fn malformed(engine: &str, reason: impl fmt::Display) -> Self {
        DispatchError::MalformedPersistedState {
            engine: engine.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ErrorCode for DispatchError {
    fn code(&self) -> i32 {
        match self {
            DispatchError::InvalidSelection { .. } => DispatchErrorCodes::INVALID_SELECTION,
            DispatchError::EngineNotFound { .. } => DispatchErrorCodes::ENGINE_NOT_FOUND,
            DispatchError::DuplicateFactory { .. } => DispatchErrorCodes::DUPLICATE_FACTORY,
            DispatchError::MalformedPersistedState { .. } => {
                DispatchErrorCodes::MALFORMED_PERSISTED_STATE
            }
            DispatchError::TypeMismatch { .. } => DispatchErrorCodes::TYPE_MISMATCH,
            DispatchError::EmptyRegistry => DispatchErrorCodes::EMPTY_REGISTRY,
            DispatchError::ActionQueueFull => DispatchErrorCodes::ACTION_QUEUE_FULL,
            DispatchError::PresetNotFound { .. } => DispatchErrorCodes::PRESET_NOT_FOUND,
        }
    }

    fn message(&self) -> String {
        match self {
            DispatchError::InvalidSelection { index, count } => {
                format!("Engine index {} out of range (have {} engines)", index, count)
            }
            DispatchError::EngineNotFound { name } => {
                format!("No engine registered with name '{}'", name)
            }
            DispatchError::DuplicateFactory { name } => {
                format!("An engine factory named '{}' is already registered", name)
            }
            DispatchError::MalformedPersistedState { engine, reason } => {
                format!("Malformed persisted state for '{}': {}", engine, reason)
            }
            DispatchError::TypeMismatch { expected, found } => {
                format!("Engine type mismatch: expected {}, found {}", expected, found)
            }
            DispatchError::EmptyRegistry => {
                "Engine registry is empty. Register at least one engine first.".to_string()
            }
            DispatchError::ActionQueueFull => {
                "Action queue full. Drain the dispatcher before sending more.".to_string()
            }
            DispatchError::PresetNotFound { index } => {
                format!("No preset at index {} for the active engine", index)
            }
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DispatchError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DispatchError {}

impl From<rtrb::PushError<crate::dispatcher::Action>> for DispatchError {
    fn from(_: rtrb::PushError<crate::dispatcher::Action>) -> Self {
        DispatchError::ActionQueueFull
    }
}
