// Error handling shared by every keyclack crate

use thiserror::Error;

/// keyclack error types
#[derive(Debug, Clone, Error)]
pub enum KeyclackError {
    /// Sound file could not be opened or read
    #[error("Load error: {0}")]
    LoadError(String),

    /// File is readable but not PCM wave data we can play
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Output device could not be opened or written
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Keyboard capture could not be started
    #[error("Listener error: {0}")]
    ListenerError(String),

    /// Rejected configuration value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type alias for keyclack operations
pub type Result<T> = std::result::Result<T, KeyclackError>;

impl From<std::io::Error> for KeyclackError {
    fn from(err: std::io::Error) -> Self {
        KeyclackError::IoError(err.to_string())
    }
}
