use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// The source cannot be opened. Raised at open time only; mid-stream
/// failures end the stream instead. A resolver timeout is one more reason.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source unavailable: {location}: {reason}")]
    Unavailable { location: String, reason: String },
}

impl SourceError {
    pub fn unavailable(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        SourceError::Unavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

/// What the user asked to watch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    File(PathBuf),
    /// Share link or direct stream URL.
    Remote(String),
    /// Capture device name or index, e.g. `0` or `/dev/video2`.
    Camera(String),
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::File(path) => write!(f, "file {}", path.display()),
            SourceDescriptor::Remote(url) => write!(f, "remote {url}"),
            SourceDescriptor::Camera(device) => write!(f, "camera {device}"),
        }
    }
}

/// A sequence of frames from a file, stream or camera.
///
/// `next_frame` returns `None` at end of stream, after `close`, and on any
/// mid-stream read failure; implementations log such failures rather than
/// surfacing them.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<StreamInfo, SourceError>;

    fn next_frame(&mut self) -> Option<Frame>;

    /// Releases the underlying decoder or device. Idempotent.
    fn close(&mut self);
}
