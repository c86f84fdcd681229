//! Error types for Disha

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Disha error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognized mode selector or other unrecoverable control-flow input
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Sensor read failed
    #[error("Sensor error on {channel}: {message}")]
    Sensor {
        /// Channel or device that failed
        channel: &'static str,
        /// Failure description
        message: String,
    },

    /// Motor command failed
    #[error("Actuator error: {0}")]
    Actuator(String),

    /// Worker thread could not be started
    #[error("Failed to spawn {0} thread: {1}")]
    Spawn(&'static str, std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
