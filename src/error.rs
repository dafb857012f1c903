//! Error handling for the CEC remote crate.

/// A specialized `Result` type for CEC remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// The main error type for CEC remote operations.
///
/// Command results are not errors: the control channel reports them as
/// [`CommandOutcome`](crate::cec::CommandOutcome) values. This type covers
/// setup, I/O and configuration failures underneath that.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input source or the control channel could not be initialised
    #[error("Setup failure: {0}")]
    Setup(String),

    /// Talking to the external control process failed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Reading a digital input failed
    #[error("Input error: {0}")]
    Input(String),

    /// GPIO driver error (only available with gpio feature)
    #[cfg(feature = "gpio")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl RemoteError {
    /// Create a new setup error
    pub fn setup_error(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Create a new channel error
    pub fn channel_error(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Create a new input error
    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }
}
