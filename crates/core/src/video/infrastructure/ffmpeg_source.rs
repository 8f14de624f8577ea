use std::path::PathBuf;
use std::time::Duration;

use crate::shared::frame::Frame;
use crate::shared::stream_info::{SourceKind, StreamInfo};
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// Read timeout for network inputs; a stalled stream ends instead of hanging.
const NETWORK_RW_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive EAGAIN reads tolerated before the input is treated as gone.
const MAX_READ_RETRIES: u32 = 500;
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// What an [`FfmpegSource`] opens.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Target {
    File(PathBuf),
    Url(String),
    Camera(String),
}

/// Decodes frames from a file, network URL or capture device via
/// ffmpeg-next (libavformat + libavcodec + libavdevice).
///
/// Every decoded frame is converted to RGB24. Files are finite and can be
/// reopened from the start; cameras produce frames until closed, and
/// reopening reinitializes the device.
pub struct FfmpegSource {
    target: Target,
    decoder: Option<DecodeState>,
}

// Safety: FfmpegSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_target(Target::File(path.into()))
    }

    /// A URL ffmpeg can play directly (http(s), rtsp, rtmp, HLS...).
    pub fn url(url: impl Into<String>) -> Self {
        Self::with_target(Target::Url(url.into()))
    }

    /// A capture device: an index such as `0`, or a platform device name.
    pub fn camera(device: impl Into<String>) -> Self {
        Self::with_target(Target::Camera(device.into()))
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            decoder: None,
        }
    }

    fn location(&self) -> String {
        match &self.target {
            Target::File(path) => path.display().to_string(),
            Target::Url(url) => url.clone(),
            Target::Camera(device) => camera_device_path(device),
        }
    }

    fn kind(&self) -> SourceKind {
        match self.target {
            Target::File(_) => SourceKind::File,
            Target::Url(_) => SourceKind::Remote,
            Target::Camera(_) => SourceKind::Camera,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
        match &self.target {
            Target::File(path) => ffmpeg_next::format::input(path),
            Target::Url(url) => {
                let mut options = ffmpeg_next::Dictionary::new();
                options.set("rw_timeout", &NETWORK_RW_TIMEOUT.as_micros().to_string());
                ffmpeg_next::format::input_with_dictionary(url, options)
            }
            Target::Camera(device) => open_camera(device),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        self.close();
        let location = self.location();
        ffmpeg_next::init().map_err(|e| SourceError::unavailable(&location, e))?;

        let input = self
            .open_input()
            .map_err(|e| SourceError::unavailable(&location, e))?;
        let (state, info) = DecodeState::new(input, self.kind(), location.clone())
            .map_err(|e| SourceError::unavailable(&location, e))?;

        log::info!(
            "Opened {} source {location} ({}x{} @ {:.1} fps, {})",
            info.kind,
            info.width,
            info.height,
            info.fps,
            info.codec
        );
        self.decoder = Some(state);
        Ok(info)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let state = self.decoder.as_mut()?;
        match state.next_frame() {
            Some(Ok(frame)) => Some(frame),
            Some(Err(e)) => {
                log::warn!("Read failure on {}, ending stream: {e}", self.location());
                self.close();
                None
            }
            None => {
                log::debug!("End of stream on {}", self.location());
                None
            }
        }
    }

    fn close(&mut self) {
        self.decoder = None;
    }
}

/// Decoder pipeline for one opened input.
struct DecodeState {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<ScalerState>,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

/// RGB24 converter, rebuilt whenever the decoded geometry changes.
struct ScalerState {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

impl DecodeState {
    fn new(
        input: ffmpeg_next::format::context::Input,
        kind: SourceKind,
        location: String,
    ) -> Result<(Self, StreamInfo), Box<dyn std::error::Error>> {
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let total_frames = match (kind, stream.frames()) {
            (SourceKind::File, n) if n > 0 => Some(n as usize),
            _ => None,
        };

        let info = StreamInfo {
            kind,
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            location,
        };

        let state = Self {
            input,
            decoder,
            scaler: None,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        };
        Ok((state, info))
    }

    fn try_receive(&mut self) -> Option<Result<Frame, ffmpeg_next::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        Some(self.convert(&decoded))
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<Frame, ffmpeg_next::Error> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.format != format || s.width != width || s.height != height);
        if stale {
            if self.scaler.is_some() {
                log::info!("Stream geometry changed to {width}x{height}");
            }
            let context = ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(ScalerState {
                context,
                format,
                width,
                height,
            });
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.context.run(decoded, &mut rgb_frame)?;
        }
        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }

    fn next_frame(&mut self) -> Option<Result<Frame, ffmpeg_next::Error>> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        let mut retries = 0;
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => retries = 0,
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    if let Some(result) = self.try_receive() {
                        return Some(result);
                    }
                    self.done = true;
                    return None;
                }
                Err(ffmpeg_next::Error::Other { errno }) if is_retryable(errno) => {
                    retries += 1;
                    if retries > MAX_READ_RETRIES {
                        self.done = true;
                        return Some(Err(ffmpeg_next::Error::Other { errno }));
                    }
                    std::thread::sleep(READ_RETRY_DELAY);
                    continue;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            if packet.stream() != self.video_stream_index {
                continue;
            }

            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// A device with nothing ready yet reports EAGAIN; anything else is fatal.
fn is_retryable(errno: i32) -> bool {
    errno == ffmpeg_next::util::error::EAGAIN
}

/// Maps a bare device index to the platform's device naming.
fn camera_device_path(device: &str) -> String {
    if device.parse::<u32>().is_err() {
        return device.to_string();
    }
    if cfg!(target_os = "linux") {
        format!("/dev/video{device}")
    } else if cfg!(target_os = "macos") {
        // avfoundation takes "<video>:<audio>"; no audio wanted
        format!("{device}:none")
    } else {
        device.to_string()
    }
}

/// libavdevice demuxer used for cameras on this platform.
fn camera_format_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

fn open_camera(device: &str) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
    ffmpeg_next::device::register_all();
    let wanted = camera_format_name();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == wanted)
        .ok_or(ffmpeg_next::Error::DemuxerNotFound)?;
    let context = ffmpeg_next::format::open_with(
        &camera_device_path(device),
        &ffmpeg_next::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )?;
    if !context.is_input() {
        return Err(ffmpeg_next::Error::InvalidData);
    }
    Ok(context.input())
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    /// Encodes `num_frames` solid gray frames to an MPEG-4 file.
    pub(crate) fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32) {
        let fps = 30;
        ffmpeg_next::init().unwrap();
        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let mut drain = |encoder: &mut ffmpeg_next::encoder::Video,
                         octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let value = ((i * 40) % 256) as u8;
            rgb_frame.data_mut(0).fill(value);
            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));
            encoder.send_frame(&yuv_frame).unwrap();
            drain(&mut encoder, &mut octx);
        }
        encoder.send_eof().unwrap();
        drain(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    /// Writes a Matroska clip and cuts it off halfway through its clusters,
    /// like a recording interrupted mid-write.
    pub(crate) fn create_truncated_video(path: &Path, num_frames: usize) {
        create_test_video(path, num_frames, 160, 120);
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        let len = file.metadata().unwrap().len();
        file.set_len(len / 2).unwrap();
    }

    fn drain_source(source: &mut FfmpegSource) -> Vec<Frame> {
        std::iter::from_fn(|| source.next_frame()).collect()
    }

    #[test]
    fn test_open_returns_stream_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 5, 160, 120);

        let mut source = FfmpegSource::file(&path);
        let info = source.open().unwrap();
        assert_eq!(info.kind, SourceKind::File);
        assert_eq!((info.width, info.height), (160, 120));
        assert!(info.fps > 0.0);
        assert_eq!(info.location, path.display().to_string());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let mut source = FfmpegSource::file("/nonexistent/test.mp4");
        let err = source.open().unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[test]
    fn test_frames_are_sequential_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 5, 160, 120);

        let mut source = FfmpegSource::file(&path);
        source.open().unwrap();
        let frames = drain_source(&mut source);

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_reopen_restarts_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 3, 64, 48);

        let mut source = FfmpegSource::file(&path);
        source.open().unwrap();
        assert_eq!(drain_source(&mut source).len(), 3);
        source.open().unwrap();
        let again = drain_source(&mut source);
        assert_eq!(again.len(), 3);
        assert_eq!(again[0].index(), 0);
    }

    #[test]
    fn test_unopened_and_closed_sources_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 3, 64, 48);

        let mut source = FfmpegSource::file(&path);
        assert!(source.next_frame().is_none());
        source.open().unwrap();
        source.close();
        source.close();
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_truncated_file_ends_after_readable_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.mkv");
        create_truncated_video(&path, 60);

        let mut source = FfmpegSource::file(&path);
        source.open().unwrap();
        let frames = drain_source(&mut source);

        assert!(frames.len() < 60);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
        }
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_only_eagain_is_retried() {
        assert!(is_retryable(ffmpeg_next::util::error::EAGAIN));
        assert!(!is_retryable(ffmpeg_next::util::error::ENODEV));
        assert!(!is_retryable(ffmpeg_next::util::error::EIO));
    }

    #[test]
    fn test_camera_device_path() {
        if cfg!(target_os = "linux") {
            assert_eq!(camera_device_path("0"), "/dev/video0");
        }
        assert_eq!(camera_device_path("/dev/video3"), "/dev/video3");
    }
}
