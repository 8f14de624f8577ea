pub mod ffmpeg_source;
pub mod latest_frame_source;
pub mod remote_source;
pub mod source_factory;
pub mod ytdlp_resolver;
