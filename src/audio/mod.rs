// Audio module - block callback and stub backend hosting a dispatcher

pub mod backend;
pub mod callback;

pub use backend::{Pacing, StubAudioBackend};
pub use callback::DispatchCallback;
