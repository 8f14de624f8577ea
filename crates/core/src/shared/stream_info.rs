use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Remote,
    Camera,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File => write!(f, "file"),
            SourceKind::Remote => write!(f, "remote"),
            SourceKind::Camera => write!(f, "camera"),
        }
    }
}

/// Properties of an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub kind: SourceKind,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Unknown for live and most network sources.
    pub total_frames: Option<usize>,
    pub codec: String,
    /// Path or URL actually opened (the resolved URL for share links).
    pub location: String,
}
