use std::time::Duration;

use crate::video::domain::frame_source::{FrameSource, SourceDescriptor};

use super::ffmpeg_source::FfmpegSource;
use super::latest_frame_source::LatestFrameSource;
use super::remote_source::RemoteSource;
use super::ytdlp_resolver::YtDlpResolver;

/// Creates the frame source for a descriptor.
///
/// Share links are resolved with yt-dlp. With `drop_stale_frames`, the
/// source is read on its own thread and only the newest frame is kept.
pub fn create_frame_source(
    descriptor: &SourceDescriptor,
    resolve_timeout: Duration,
    drop_stale_frames: bool,
) -> Box<dyn FrameSource> {
    let source: Box<dyn FrameSource> = match descriptor {
        SourceDescriptor::File(path) => Box::new(FfmpegSource::file(path)),
        SourceDescriptor::Remote(link) => Box::new(RemoteSource::new(
            link.clone(),
            Box::new(YtDlpResolver::new()),
            resolve_timeout,
        )),
        SourceDescriptor::Camera(device) => Box::new(FfmpegSource::camera(device.clone())),
    };
    log::debug!("Created source for {descriptor}");

    if drop_stale_frames {
        log::info!("Dropping stale frames: only the newest frame is processed");
        Box::new(LatestFrameSource::new(source))
    } else {
        source
    }
}
