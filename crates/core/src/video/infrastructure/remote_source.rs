use std::time::Duration;

use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_source::{FrameSource, SourceError};
use crate::video::domain::stream_resolver::StreamResolver;

use super::ffmpeg_source::FfmpegSource;

const STREAMING_SCHEMES: &[&str] = &["rtsp://", "rtsps://", "rtmp://", "rtmps://", "srt://", "udp://"];
const MEDIA_SUFFIXES: &[&str] = &[".m3u8", ".mpd", ".mp4", ".mkv", ".webm", ".mov", ".ts", ".flv"];

/// A network source given as a share link or a direct stream URL.
///
/// Share links go through the [`StreamResolver`] once per `open`; direct
/// URLs are handed to ffmpeg unchanged.
pub struct RemoteSource {
    link: String,
    resolver: Box<dyn StreamResolver>,
    timeout: Duration,
    inner: Option<FfmpegSource>,
}

impl RemoteSource {
    pub fn new(link: impl Into<String>, resolver: Box<dyn StreamResolver>, timeout: Duration) -> Self {
        Self {
            link: link.into(),
            resolver,
            timeout,
            inner: None,
        }
    }

    fn playable_url(&self) -> Result<String, SourceError> {
        if is_direct_stream_url(&self.link) {
            log::debug!("{} is a direct stream, skipping resolution", self.link);
            return Ok(self.link.clone());
        }
        self.resolver.resolve(&self.link, self.timeout)
    }
}

impl FrameSource for RemoteSource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        self.close();
        let url = self.playable_url()?;
        let mut source = FfmpegSource::url(url);
        let info = source.open()?;
        self.inner = Some(source);
        Ok(info)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.inner.as_mut()?.next_frame()
    }

    fn close(&mut self) {
        if let Some(mut source) = self.inner.take() {
            source.close();
        }
    }
}

/// True for URLs ffmpeg can play without a resolver: streaming protocols and
/// http(s) links that point straight at a media file or playlist.
pub fn is_direct_stream_url(link: &str) -> bool {
    let lower = link.trim().to_ascii_lowercase();
    if STREAMING_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return true;
    }
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    let path = lower
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    MEDIA_SUFFIXES.iter().any(|ext| path.ends_with(ext))
}
