use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use roiwatch_core::alerting::infrastructure::sink_factory::{create_alert_sink, SinkKind};
use roiwatch_core::detection::domain::object_detector::ObjectDetector;
use roiwatch_core::detection::infrastructure::model_resolver::{self, ModelLocation};
use roiwatch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use roiwatch_core::pipeline::frame_display::{FrameDisplay, NullDisplay};
use roiwatch_core::pipeline::infrastructure::image_file_display::ImageFileDisplay;
use roiwatch_core::pipeline::pipeline_driver::{DriverOptions, PipelineDriver};
use roiwatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use roiwatch_core::pipeline::region_input::FixedRegionInput;
use roiwatch_core::pipeline::session_config::{PolicyKind, SessionConfig};
use roiwatch_core::shared::constants::{ModelVariant, DEFAULT_CAMERA_DEVICE, VIDEO_EXTENSIONS};
use roiwatch_core::shared::region_spec::{parse_quad, RegionSpec};
use roiwatch_core::video::domain::frame_source::SourceDescriptor;
use roiwatch_core::video::infrastructure::source_factory::create_frame_source;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    /// Guess from the input: URL, existing file, or camera device.
    Auto,
    File,
    Remote,
    Camera,
}

/// Watch a video, stream or camera and beep when a person enters a region.
#[derive(Parser)]
#[command(name = "roiwatch")]
struct Cli {
    /// Video file, stream URL / share link, or camera device (default: camera 0).
    input: Option<String>,

    /// How to interpret the input.
    #[arg(long, value_enum, default_value = "auto")]
    source: SourceArg,

    /// Region of interest as left,top,right,bottom pixels.
    #[arg(long, conflicts_with = "roi_xywh")]
    roi: Option<String>,

    /// Region of interest as x,y,width,height pixels.
    #[arg(long)]
    roi_xywh: Option<String>,

    /// Minimum person confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Detector size: small or nano.
    #[arg(long)]
    model_variant: Option<String>,

    /// Explicit ONNX model file.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download the model from this URL when it isn't cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Alert policy: edge (once per entry) or cooldown (repeat while present).
    #[arg(long)]
    policy: Option<String>,

    /// Seconds between repeated alerts under the cooldown policy.
    #[arg(long)]
    cooldown: Option<f64>,

    /// Alert output: auto, bell or none.
    #[arg(long, conflicts_with = "alert_command")]
    alert: Option<String>,

    /// Run this command for each alert instead (program and arguments).
    #[arg(long)]
    alert_command: Option<String>,

    /// Keep this image updated with the latest annotated frame.
    #[arg(long)]
    preview_image: Option<PathBuf>,

    /// Write the preview image every Nth frame.
    #[arg(long, default_value = "1")]
    preview_every: usize,

    /// Don't draw the region outline.
    #[arg(long)]
    no_outline: bool,

    /// Process only the newest frame when detection falls behind.
    #[arg(long)]
    drop_stale_frames: bool,

    /// Seconds to wait for a share link to resolve.
    #[arg(long)]
    resolve_timeout: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// JSON session config; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective session config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let descriptor = describe_source(cli.input.as_deref(), cli.source)?;
    let detector = build_detector(&config)?;
    let source = create_frame_source(
        &descriptor,
        config.resolve_timeout(),
        config.drop_stale_frames,
    );
    let display: Box<dyn FrameDisplay> = match &cli.preview_image {
        Some(path) => Box::new(ImageFileDisplay::with_interval(path, cli.preview_every)),
        None => Box::new(NullDisplay),
    };

    let mut driver = PipelineDriver::new(
        source,
        detector,
        create_alert_sink(&config.alert),
        DriverOptions::from(&config),
    )
    .with_display(display)
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    log::info!("Opening {descriptor}");
    let info = driver.open()?;
    log::info!(
        "Source ready: {}x{} @ {:.1} fps",
        info.width,
        info.height,
        info.fps
    );
    driver.configure_with(&mut FixedRegionInput::new(config.region))?;

    if let Some(secs) = cli.duration {
        let handle = driver.stop_handle();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f64(secs));
            log::info!("Duration of {secs}s reached, stopping");
            handle.request_stop();
        });
    }

    let summary = driver.run()?;
    log::info!(
        "Done: {} frames, {} with a person, {} alerts, {} detection failures",
        summary.frames_processed,
        summary.frames_with_person,
        summary.alerts_fired,
        summary.detection_failures
    );
    Ok(())
}

/// Config file (explicit, else the per-user default if present), then flags.
fn build_config(cli: &Cli) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => match SessionConfig::default_path().filter(|p| p.exists()) {
            Some(path) => SessionConfig::load(&path)?,
            None => SessionConfig::default(),
        },
    };

    if let Some(confidence) = cli.confidence {
        config.confidence = confidence;
    }
    if let Some(variant) = &cli.model_variant {
        config.model_variant = variant.parse::<ModelVariant>()?;
    }
    if let Some(model) = &cli.model {
        config.model_path = Some(model.clone());
    }
    if let Some(url) = &cli.model_url {
        config.model_url = Some(url.clone());
    }
    if let Some(policy) = &cli.policy {
        config.policy = parse_policy(policy)?;
    }
    if let Some(cooldown) = cli.cooldown {
        config.cooldown_secs = cooldown;
    }
    if let Some(alert) = &cli.alert {
        config.alert = parse_alert(alert)?;
    }
    if let Some(command) = &cli.alert_command {
        config.alert = parse_alert_command(command)?;
    }
    if cli.no_outline {
        config.outline_region = false;
    }
    if cli.drop_stale_frames {
        config.drop_stale_frames = true;
    }
    if let Some(timeout) = cli.resolve_timeout {
        config.resolve_timeout_secs = timeout;
    }
    if let Some(region) = parse_region(cli.roi.as_deref(), cli.roi_xywh.as_deref())? {
        config.region = Some(region);
    }

    validate(cli)?;
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.preview_every == 0 {
        return Err("--preview-every must be at least 1".into());
    }
    if let Some(secs) = cli.duration {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!("Duration must be a positive number of seconds, got {secs}").into());
        }
    }
    if cli.source == SourceArg::File {
        if let Some(input) = &cli.input {
            if !Path::new(input).exists() {
                return Err(format!("Input file not found: {input}").into());
            }
        }
    }
    Ok(())
}

fn build_detector(config: &SessionConfig) -> Result<Arc<dyn ObjectDetector>, Box<dyn std::error::Error>> {
    let location = ModelLocation {
        name: config.model_variant.model_file_name().to_string(),
        explicit_path: config.model_path.clone(),
        bundled_dir: bundled_model_dir(),
        download_url: config.model_url.clone(),
    };
    log::info!("Resolving model: {}", location.name);
    let model_path = model_resolver::resolve(&location, Some(Box::new(download_progress)))?;
    if config.model_url.is_some() {
        eprintln!();
    }
    log::info!("Loading detector from {}", model_path.display());
    Ok(Arc::new(OnnxYoloDetector::new(&model_path)?))
}

/// `models/` next to the executable.
fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

fn describe_source(input: Option<&str>, kind: SourceArg) -> Result<SourceDescriptor, String> {
    let Some(input) = input else {
        return match kind {
            SourceArg::Auto | SourceArg::Camera => {
                Ok(SourceDescriptor::Camera(DEFAULT_CAMERA_DEVICE.to_string()))
            }
            _ => Err("An input is required for file and remote sources".to_string()),
        };
    };

    Ok(match kind {
        SourceArg::File => SourceDescriptor::File(PathBuf::from(input)),
        SourceArg::Remote => SourceDescriptor::Remote(input.to_string()),
        SourceArg::Camera => SourceDescriptor::Camera(input.to_string()),
        SourceArg::Auto if input.contains("://") => SourceDescriptor::Remote(input.to_string()),
        SourceArg::Auto if input.parse::<u32>().is_ok() || input.starts_with("/dev/video") => {
            SourceDescriptor::Camera(input.to_string())
        }
        SourceArg::Auto => {
            if !Path::new(input).exists() {
                return Err(format!("Input file not found: {input}"));
            }
            if !is_video(Path::new(input)) {
                log::warn!("{input} doesn't look like a video file, trying anyway");
            }
            SourceDescriptor::File(PathBuf::from(input))
        }
    })
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_region(
    ltrb: Option<&str>,
    xywh: Option<&str>,
) -> Result<Option<RegionSpec>, Box<dyn std::error::Error>> {
    if let Some(s) = ltrb {
        return Ok(Some(s.parse::<RegionSpec>()?));
    }
    if let Some(s) = xywh {
        let [x, y, w, h] = parse_quad(s)?;
        return Ok(Some(RegionSpec::from_xywh(x, y, w, h)?));
    }
    Ok(None)
}

fn parse_policy(policy: &str) -> Result<PolicyKind, String> {
    match policy {
        "edge" => Ok(PolicyKind::Edge),
        "cooldown" => Ok(PolicyKind::Cooldown),
        other => Err(format!("Policy must be 'edge' or 'cooldown', got '{other}'")),
    }
}

fn parse_alert(alert: &str) -> Result<SinkKind, String> {
    match alert {
        "auto" => Ok(SinkKind::Auto),
        "bell" => Ok(SinkKind::Bell),
        "none" => Ok(SinkKind::None),
        other => Err(format!("Alert must be one of: auto, bell, none, got '{other}'")),
    }
}

fn parse_alert_command(command: &str) -> Result<SinkKind, String> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| "--alert-command must not be empty".to_string())?;
    Ok(SinkKind::Command {
        program,
        args: parts.collect(),
    })
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading person detection model... {pct}%");
    } else {
        eprint!("\rDownloading person detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_input_means_default_camera() {
        assert_eq!(
            describe_source(None, SourceArg::Auto).unwrap(),
            SourceDescriptor::Camera("0".into())
        );
        assert!(describe_source(None, SourceArg::File).is_err());
    }

    #[test]
    fn test_auto_detects_urls_and_devices() {
        assert_eq!(
            describe_source(Some("https://youtu.be/abc"), SourceArg::Auto).unwrap(),
            SourceDescriptor::Remote("https://youtu.be/abc".into())
        );
        assert_eq!(
            describe_source(Some("1"), SourceArg::Auto).unwrap(),
            SourceDescriptor::Camera("1".into())
        );
        assert!(describe_source(Some("/nonexistent/clip.mp4"), SourceArg::Auto).is_err());
    }

    #[test]
    fn test_region_flags() {
        assert_eq!(
            parse_region(Some("10,20,110,220"), None).unwrap(),
            Some(RegionSpec::new(10, 20, 110, 220).unwrap())
        );
        assert_eq!(
            parse_region(None, Some("10,20,100,200")).unwrap(),
            Some(RegionSpec::new(10, 20, 110, 220).unwrap())
        );
        assert!(parse_region(Some("10,20,5,220"), None).is_err());
        assert_eq!(parse_region(None, None).unwrap(), None);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "roiwatch",
            "--policy",
            "edge",
            "--confidence",
            "0.8",
            "--alert",
            "none",
            "--roi",
            "1,2,3,4",
            "--no-outline",
        ]);
        let mut config = SessionConfig::default();
        config.model_variant = ModelVariant::Nano;
        let file = tempfile_config(&config);
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..cli
        };

        let merged = build_config(&cli).unwrap();
        assert_eq!(merged.policy, PolicyKind::Edge);
        assert_eq!(merged.confidence, 0.8);
        assert_eq!(merged.alert, SinkKind::None);
        assert_eq!(merged.region, Some(RegionSpec::new(1, 2, 3, 4).unwrap()));
        assert!(!merged.outline_region);
        assert_eq!(merged.model_variant, ModelVariant::Nano);
    }

    #[test]
    fn test_out_of_range_flag_is_rejected() {
        let file = tempfile_config(&SessionConfig::default());
        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["roiwatch", "--confidence", "1.5", "--config", path.as_str()]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_alert_command_splits_arguments() {
        assert_eq!(
            parse_alert_command("paplay /tmp/ding.oga").unwrap(),
            SinkKind::Command {
                program: "paplay".into(),
                args: vec!["/tmp/ding.oga".into()],
            }
        );
        assert!(parse_alert_command("  ").is_err());
    }

    fn tempfile_config(config: &SessionConfig) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(config).unwrap()).unwrap();
        file
    }
}
