use std::time::Duration;

use super::frame_source::SourceError;

/// Turns a share link into a URL a decoder can play.
pub trait StreamResolver: Send {
    /// Must give up and return [`SourceError`] once `timeout` has elapsed.
    fn resolve(&self, link: &str, timeout: Duration) -> Result<String, SourceError>;
}
