// Background keyboard listener with ordered callback delivery

pub mod backend;
pub mod key_log;
pub mod listener;

pub use backend::{CaptureBackend, DeviceQueryBackend, KeyPoller};
pub use key_log::KeyLog;
pub use listener::{KeyboardListener, ListenerConfig, ListenerState};
