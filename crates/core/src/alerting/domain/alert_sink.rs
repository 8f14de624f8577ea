use thiserror::Error;

/// The alert mechanism is missing or broken. Never fatal to a session.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("alert sink unavailable: {0}")]
    Unavailable(String),
    #[error("alert playback failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a fired alert, typically as a sound.
pub trait AlertSink: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn fire(&self) -> Result<(), SinkError>;
}

/// Sink that does nothing, for silent runs and tests.
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn name(&self) -> &str {
        "none"
    }

    fn fire(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
