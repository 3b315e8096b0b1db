//! Decoded input events and the input-handling capability.
//!
//! Raw hardware decoding happens elsewhere; these types are what the
//! dispatcher and engines consume.

use serde::{Deserialize, Serialize};

/// Relative encoder movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderEvent {
    pub encoder: u8,
    /// Signed detent count since the last event
    pub steps: i32,
}

impl EncoderEvent {
    pub fn new(encoder: u8, steps: i32) -> Self {
        Self { encoder, steps }
    }
}

/// Keys with a meaning to the dispatcher. Everything else is `Pad`/`Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Opens the engine/preset selector
    Select,
    /// Modifier: encoders adjust the engine instead of the preset
    Shift,
    /// Commits the highlighted selector entry
    Confirm,
    Pad(u8),
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum InputEvent {
    Encoder(EncoderEvent),
    KeyPress(Key),
    KeyRelease(Key),
}

/// Input handling capability.
///
/// Every method returns `true` when the event was consumed.
pub trait InputHandler {
    fn encoder(&mut self, _event: EncoderEvent) -> bool {
        false
    }

    fn keypress(&mut self, _key: Key) -> bool {
        false
    }

    fn keyrelease(&mut self, _key: Key) -> bool {
        false
    }

    fn handle(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Encoder(ev) => self.encoder(ev),
            InputEvent::KeyPress(key) => self.keypress(key),
            InputEvent::KeyRelease(key) => self.keyrelease(key),
        }
    }
}
