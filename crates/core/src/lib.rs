// Core types and traits for keyclack

pub mod callback;
pub mod error;
pub mod key;
pub mod pcm;

// Re-export commonly used types
pub use callback::{CallbackId, CallbackRegistry, KeyCallback};
pub use error::{KeyclackError, Result};
pub use key::{EventType, KeyIdentity};
pub use pcm::{PcmData, PcmSpec, SampleFormat, SoundLoader};
