use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::alerting::domain::alert_debouncer::{AlertDebouncer, DebouncePolicy};
use crate::alerting::domain::alert_sink::AlertSink;
use crate::annotation::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::pipeline::frame_display::{FrameDisplay, NullDisplay};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::region_input::RegionInput;
use crate::pipeline::roi_detection_step::RoiDetectionStep;
use crate::pipeline::session_config::{ConfigError, SessionConfig};
use crate::shared::frame::Frame;
use crate::shared::region_spec::{RegionError, RegionSpec};
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_source::{FrameSource, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Configuring,
    Running,
    Stopped,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Idle => write!(f, "idle"),
            DriverState::Configuring => write!(f, "configuring"),
            DriverState::Running => write!(f, "running"),
            DriverState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] RegionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: DriverState,
    },
}

/// Counters for one watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_processed: usize,
    pub frames_with_person: usize,
    pub alerts_fired: usize,
    pub detection_failures: usize,
}

/// What one [`PipelineDriver::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Processed {
        frame_index: usize,
        person_present: bool,
        alerted: bool,
    },
    EndOfStream,
    Stopped,
}

/// Requests a stop from another thread (signal handler, UI, test).
///
/// The running driver notices within one iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Detection settings fixed for the life of a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverOptions {
    pub confidence_threshold: f64,
    pub policy: DebouncePolicy,
    pub outline_region: bool,
}

impl From<&SessionConfig> for DriverOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            confidence_threshold: config.confidence,
            policy: config.debounce_policy(),
            outline_region: config.outline_region,
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

pub type Clock = Box<dyn Fn() -> Duration + Send>;

/// Runs one watch session: source → detect in region → debounce → alert →
/// display.
///
/// Lifecycle is `Idle → Configuring → Running → Stopped`. `open` reads a
/// preview frame for region selection; that frame is then the first one
/// processed once `configure` succeeds.
pub struct PipelineDriver {
    source: Box<dyn FrameSource>,
    detector: Arc<dyn ObjectDetector>,
    sink: Box<dyn AlertSink>,
    display: Box<dyn FrameDisplay>,
    logger: Box<dyn PipelineLogger>,
    clock: Clock,
    step: RoiDetectionStep,
    debouncer: AlertDebouncer,
    confidence_threshold: f64,
    state: DriverState,
    stream: Option<StreamInfo>,
    preview: Option<Frame>,
    region: Option<RegionSpec>,
    stop: StopHandle,
    summary: SessionSummary,
}

impl PipelineDriver {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Arc<dyn ObjectDetector>,
        sink: Box<dyn AlertSink>,
        options: DriverOptions,
    ) -> Self {
        let epoch = Instant::now();
        Self {
            source,
            detector,
            sink,
            display: Box::new(NullDisplay),
            logger: Box::new(NullPipelineLogger),
            clock: Box::new(move || epoch.elapsed()),
            step: RoiDetectionStep::new(FrameAnnotator::default(), options.outline_region),
            debouncer: AlertDebouncer::new(options.policy),
            confidence_threshold: options.confidence_threshold,
            state: DriverState::Idle,
            stream: None,
            preview: None,
            region: None,
            stop: StopHandle::default(),
            summary: SessionSummary::default(),
        }
    }

    pub fn with_display(mut self, display: Box<dyn FrameDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the monotonic clock used for debouncing.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    /// The frame shown for region selection, until processing starts.
    pub fn preview(&self) -> Option<&Frame> {
        self.preview.as_ref()
    }

    pub fn region(&self) -> Option<&RegionSpec> {
        self.region.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Opens the source and grabs the preview frame. On failure the driver
    /// stays idle and `open` may be retried.
    pub fn open(&mut self) -> Result<&StreamInfo, PipelineError> {
        self.expect_state(DriverState::Idle, "open")?;

        let info = self.source.open()?;
        let Some(preview) = self.source.next_frame() else {
            self.source.close();
            return Err(SourceError::unavailable(&info.location, "produced no frames").into());
        };

        self.logger.info(&format!(
            "Opened {} ({}x{}), waiting for region",
            info.location, info.width, info.height
        ));
        self.preview = Some(preview);
        self.state = DriverState::Configuring;
        Ok(self.stream.insert(info))
    }

    /// Sets the region (or none for the full frame) and starts running.
    ///
    /// A region that doesn't fit the preview frame is rejected and the
    /// driver stays in `Configuring`.
    pub fn configure(&mut self, region: Option<RegionSpec>) -> Result<(), PipelineError> {
        self.expect_state(DriverState::Configuring, "configure")?;
        let Some(preview) = self.preview.as_ref() else {
            return Err(PipelineError::InvalidState {
                action: "configure without a preview frame",
                state: self.state,
            });
        };
        if let Some(region) = &region {
            region.validate_within(preview.width(), preview.height())?;
        }

        match &region {
            Some(r) => self.logger.info(&format!("Watching region {r}")),
            None => self.logger.info("Watching the full frame"),
        }
        self.region = region;
        self.debouncer.reset();
        self.summary = SessionSummary::default();
        self.state = DriverState::Running;
        Ok(())
    }

    /// Asks `input` for a region using the preview frame, then configures.
    pub fn configure_with(&mut self, input: &mut dyn RegionInput) -> Result<(), PipelineError> {
        self.expect_state(DriverState::Configuring, "configure")?;
        let candidate = match self.preview.as_ref() {
            Some(preview) => input.select(preview),
            None => None,
        };
        self.configure(candidate)
    }

    /// One iteration: read, detect, debounce, alert, display.
    pub fn step(&mut self) -> Result<StepOutcome, PipelineError> {
        match self.state {
            DriverState::Running => {}
            DriverState::Stopped => return Ok(StepOutcome::Stopped),
            state => {
                return Err(PipelineError::InvalidState {
                    action: "step",
                    state,
                })
            }
        }
        if self.stop.is_stop_requested() {
            self.stop();
            return Ok(StepOutcome::Stopped);
        }

        let read_start = Instant::now();
        let next = match self.preview.take() {
            Some(frame) => Some(frame),
            None => self.source.next_frame(),
        };
        let Some(frame) = next else {
            self.logger.info("End of stream");
            self.stop();
            return Ok(StepOutcome::EndOfStream);
        };
        self.logger.timing("read", elapsed_ms(read_start));

        let detect_start = Instant::now();
        let (shown, person_present) = match self.step.process(
            &frame,
            self.region.as_ref(),
            self.detector.as_ref(),
            self.confidence_threshold,
        ) {
            Ok(result) => {
                self.logger.metric("detections", result.detections.len() as f64);
                (result.annotated_frame, result.person_present)
            }
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                self.summary.detection_failures += 1;
                (frame, false)
            }
        };
        self.logger.timing("detect", elapsed_ms(detect_start));

        let alerted = self.debouncer.update(person_present, (self.clock)());
        if alerted {
            let alert_start = Instant::now();
            self.logger
                .info(&format!("Person detected in region (frame {})", shown.index()));
            if let Err(e) = self.sink.fire() {
                log::warn!("Alert via '{}' failed: {e}", self.sink.name());
            }
            self.summary.alerts_fired += 1;
            self.logger.timing("alert", elapsed_ms(alert_start));
        }

        self.summary.frames_processed += 1;
        if person_present {
            self.summary.frames_with_person += 1;
        }

        if self.stop.is_stop_requested() {
            self.stop();
            return Ok(StepOutcome::Stopped);
        }

        let display_start = Instant::now();
        if let Err(e) = self.display.show(&shown) {
            log::warn!("Display failed on frame {}: {e}", shown.index());
        }
        self.logger.timing("display", elapsed_ms(display_start));
        self.logger.progress(
            self.summary.frames_processed,
            self.stream.as_ref().and_then(|s| s.total_frames),
        );

        Ok(StepOutcome::Processed {
            frame_index: shown.index(),
            person_present,
            alerted,
        })
    }

    /// Steps until end of stream or a stop request.
    pub fn run(&mut self) -> Result<SessionSummary, PipelineError> {
        loop {
            match self.step()? {
                StepOutcome::Processed { .. } => {}
                StepOutcome::EndOfStream | StepOutcome::Stopped => break,
            }
        }
        self.logger.summary();
        Ok(self.summary)
    }

    /// Ends the session and releases the source. Idempotent.
    pub fn stop(&mut self) {
        if self.state == DriverState::Stopped {
            return;
        }
        self.stop.request_stop();
        self.source.close();
        self.preview = None;
        if self.state == DriverState::Running {
            self.display.finish();
        }
        log::info!(
            "Session stopped: {} frames, {} with a person, {} alerts",
            self.summary.frames_processed,
            self.summary.frames_with_person,
            self.summary.alerts_fired
        );
        self.state = DriverState::Stopped;
    }

    fn expect_state(&self, expected: DriverState, action: &'static str) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::domain::alert_sink::{NullAlertSink, SinkError};
    use crate::detection::domain::object_detector::DetectionError;
    use crate::pipeline::region_input::FixedRegionInput;
    use crate::shared::detection::{BoundingBox, Detection};
    use crate::shared::stream_info::SourceKind;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ScriptedSource {
        frames: Vec<Frame>,
        next: usize,
        fail_open: bool,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(count: usize, width: u32, height: u32) -> Self {
            Self {
                frames: (0..count)
                    .map(|i| Frame::filled(width, height, [30, 30, 30], i))
                    .collect(),
                next: 0,
                fail_open: false,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> Result<StreamInfo, SourceError> {
            if self.fail_open {
                return Err(SourceError::unavailable("scripted", "no such device"));
            }
            self.next = 0;
            let (width, height) = self
                .frames
                .first()
                .map_or((0, 0), |f| (f.width(), f.height()));
            Ok(StreamInfo {
                kind: SourceKind::File,
                width,
                height,
                fps: 30.0,
                total_frames: Some(self.frames.len()),
                codec: "raw".into(),
                location: "scripted".into(),
            })
        }

        fn next_frame(&mut self) -> Option<Frame> {
            let frame = self.frames.get(self.next).cloned();
            self.next += 1;
            frame
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    /// Returns canned detections keyed by frame index.
    #[derive(Default)]
    struct ScriptedDetector {
        by_frame: HashMap<usize, Vec<Detection>>,
        fail_on: Option<usize>,
        stop_on: Option<(usize, StopHandle)>,
    }

    impl ObjectDetector for ScriptedDetector {
        fn predict(&self, image: &Frame, _confidence: f64) -> Result<Vec<Detection>, DetectionError> {
            if let Some((index, handle)) = &self.stop_on {
                if *index == image.index() {
                    handle.request_stop();
                }
            }
            if self.fail_on == Some(image.index()) {
                return Err(DetectionError::Failed("session lost".into()));
            }
            Ok(self.by_frame.get(&image.index()).cloned().unwrap_or_default())
        }
    }

    struct CountingSink {
        fired: Arc<AtomicUsize>,
        fail: bool,
    }

    impl AlertSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn fire(&self) -> Result<(), SinkError> {
            self.fired.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(SinkError::Unavailable("speaker unplugged".into()));
            }
            Ok(())
        }
    }

    struct RecordingDisplay {
        shown: Arc<Mutex<Vec<usize>>>,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl FrameDisplay for RecordingDisplay {
        fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.shown.lock().unwrap().push(frame.index());
            if let Some((index, handle)) = &self.stop_after {
                if *index == frame.index() {
                    handle.request_stop();
                }
            }
            Ok(())
        }
    }

    struct Harness {
        driver: PipelineDriver,
        fired: Arc<AtomicUsize>,
        shown: Arc<Mutex<Vec<usize>>>,
        closed: Arc<AtomicBool>,
    }

    fn person(conf: f64) -> Detection {
        Detection::new("person", conf, BoundingBox::new(5.0, 5.0, 40.0, 80.0))
    }

    /// 30 fps frame clock: each call advances by one frame interval.
    fn frame_clock() -> Clock {
        let ticks = AtomicUsize::new(0);
        Box::new(move || {
            let n = ticks.fetch_add(1, Ordering::Relaxed) as u32;
            Duration::from_millis(33) * n
        })
    }

    fn harness(source: ScriptedSource, detector: ScriptedDetector, policy: DebouncePolicy) -> Harness {
        let fired = Arc::new(AtomicUsize::new(0));
        let shown = Arc::new(Mutex::new(Vec::new()));
        let closed = source.closed.clone();
        let options = DriverOptions {
            confidence_threshold: 0.5,
            policy,
            outline_region: true,
        };
        let driver = PipelineDriver::new(
            Box::new(source),
            Arc::new(detector),
            Box::new(CountingSink {
                fired: fired.clone(),
                fail: false,
            }),
            options,
        )
        .with_display(Box::new(RecordingDisplay {
            shown: shown.clone(),
            stop_after: None,
        }))
        .with_clock(frame_clock());
        Harness {
            driver,
            fired,
            shown,
            closed,
        }
    }

    #[test]
    fn test_person_entering_region_fires_once() {
        let detector = ScriptedDetector {
            by_frame: (4..=6).map(|i| (i, vec![person(0.9)])).collect(),
            ..ScriptedDetector::default()
        };
        let mut h = harness(
            ScriptedSource::new(10, 640, 480),
            detector,
            DebouncePolicy::EdgeTriggered,
        );

        h.driver.open().unwrap();
        h.driver
            .configure(Some(RegionSpec::new(10, 10, 100, 100).unwrap()))
            .unwrap();

        let mut alerted_frames = Vec::new();
        while let StepOutcome::Processed {
            frame_index,
            alerted,
            ..
        } = h.driver.step().unwrap()
        {
            if alerted {
                alerted_frames.push(frame_index);
            }
        }

        assert_eq!(alerted_frames, vec![4]);
        assert_eq!(h.fired.load(Ordering::Relaxed), 1);
        assert_eq!(
            h.driver.summary(),
            SessionSummary {
                frames_processed: 10,
                frames_with_person: 3,
                alerts_fired: 1,
                detection_failures: 0,
            }
        );
        assert_eq!(h.driver.state(), DriverState::Stopped);
        assert!(h.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_cars_alone_never_alert() {
        let car = Detection::new("car", 0.95, BoundingBox::new(0.0, 0.0, 50.0, 50.0));
        let detector = ScriptedDetector {
            by_frame: (0..10).map(|i| (i, vec![car.clone()])).collect(),
            ..ScriptedDetector::default()
        };
        let mut h = harness(
            ScriptedSource::new(10, 320, 240),
            detector,
            DebouncePolicy::cooldown_secs(2.0),
        );

        h.driver.open().unwrap();
        h.driver.configure(None).unwrap();
        let summary = h.driver.run().unwrap();

        assert_eq!(summary.alerts_fired, 0);
        assert_eq!(summary.frames_with_person, 0);
        assert_eq!(h.fired.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_preview_frame_is_processed_first() {
        let mut h = harness(
            ScriptedSource::new(3, 64, 48),
            ScriptedDetector::default(),
            DebouncePolicy::EdgeTriggered,
        );
        h.driver.open().unwrap();
        assert_eq!(h.driver.preview().map(Frame::index), Some(0));
        h.driver.configure(None).unwrap();
        h.driver.run().unwrap();
        assert_eq!(*h.shown.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unavailable_source_stays_idle() {
        let mut source = ScriptedSource::new(3, 64, 48);
        source.fail_open = true;
        let mut h = harness(source, ScriptedDetector::default(), DebouncePolicy::EdgeTriggered);

        let err = h.driver.open().unwrap_err();
        assert!(matches!(err, PipelineError::Source(SourceError::Unavailable { .. })));
        assert_eq!(h.driver.state(), DriverState::Idle);
    }

    #[test]
    fn test_empty_source_stays_idle() {
        let mut h = harness(
            ScriptedSource::new(0, 64, 48),
            ScriptedDetector::default(),
            DebouncePolicy::EdgeTriggered,
        );
        assert!(h.driver.open().is_err());
        assert_eq!(h.driver.state(), DriverState::Idle);
        assert!(h.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_invalid_region_keeps_configuring() {
        let mut h = harness(
            ScriptedSource::new(3, 640, 480),
            ScriptedDetector::default(),
            DebouncePolicy::EdgeTriggered,
        );
        h.driver.open().unwrap();

        let err = h
            .driver
            .configure(Some(RegionSpec::new(600, 400, 700, 500).unwrap()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRegion(_)));
        assert_eq!(h.driver.state(), DriverState::Configuring);

        h.driver.configure(None).unwrap();
        assert_eq!(h.driver.state(), DriverState::Running);
    }

    #[test]
    fn test_configure_with_region_input() {
        let mut h = harness(
            ScriptedSource::new(2, 640, 480),
            ScriptedDetector::default(),
            DebouncePolicy::EdgeTriggered,
        );
        h.driver.open().unwrap();
        let region = RegionSpec::from_xywh(10, 20, 100, 50).unwrap();
        h.driver
            .configure_with(&mut FixedRegionInput::new(Some(region)))
            .unwrap();
        assert_eq!(h.driver.region(), Some(&region));
    }

    #[test]
    fn test_calls_out_of_order_are_rejected() {
        let mut h = harness(
            ScriptedSource::new(2, 64, 48),
            ScriptedDetector::default(),
            DebouncePolicy::EdgeTriggered,
        );
        assert!(matches!(
            h.driver.step(),
            Err(PipelineError::InvalidState {
                state: DriverState::Idle,
                ..
            })
        ));
        assert!(h.driver.configure(None).is_err());
        h.driver.open().unwrap();
        assert!(matches!(
            h.driver.open(),
            Err(PipelineError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_detection_failure_is_recovered() {
        let detector = ScriptedDetector {
            by_frame: HashMap::from([(2, vec![person(0.9)])]),
            fail_on: Some(1),
            ..ScriptedDetector::default()
        };
        let mut h = harness(
            ScriptedSource::new(4, 64, 48),
            detector,
            DebouncePolicy::EdgeTriggered,
        );
        h.driver.open().unwrap();
        h.driver.configure(None).unwrap();
        let summary = h.driver.run().unwrap();

        assert_eq!(summary.detection_failures, 1);
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.alerts_fired, 1);
        assert_eq!(*h.shown.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failing_sink_does_not_abort() {
        let fired = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            by_frame: HashMap::from([(0, vec![person(0.9)])]),
            ..ScriptedDetector::default()
        };
        let mut driver = PipelineDriver::new(
            Box::new(ScriptedSource::new(3, 64, 48)),
            Arc::new(detector),
            Box::new(CountingSink {
                fired: fired.clone(),
                fail: true,
            }),
            DriverOptions::default(),
        );
        driver.open().unwrap();
        driver.configure(None).unwrap();
        let summary = driver.run().unwrap();
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stop_handle_ends_run() {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let source = ScriptedSource::new(100, 64, 48);
        let closed = source.closed.clone();
        let mut driver = PipelineDriver::new(
            Box::new(source),
            Arc::new(ScriptedDetector::default()),
            Box::new(CountingSink {
                fired: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }),
            DriverOptions::default(),
        );
        let handle = driver.stop_handle();
        driver = driver.with_display(Box::new(RecordingDisplay {
            shown: shown.clone(),
            stop_after: Some((2, handle)),
        }));

        driver.open().unwrap();
        driver.configure(None).unwrap();
        let summary = driver.run().unwrap();

        assert_eq!(summary.frames_processed, 3);
        assert_eq!(*shown.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(driver.step().unwrap(), StepOutcome::Stopped);
    }

    #[test]
    fn test_nothing_displayed_after_stop_mid_frame() {
        let source = ScriptedSource::new(10, 64, 48);
        let mut h = harness(source, ScriptedDetector::default(), DebouncePolicy::EdgeTriggered);
        let detector = ScriptedDetector {
            stop_on: Some((3, h.driver.stop_handle())),
            ..ScriptedDetector::default()
        };
        h.driver.detector = Arc::new(detector);

        h.driver.open().unwrap();
        h.driver.configure(None).unwrap();
        h.driver.run().unwrap();

        assert_eq!(*h.shown.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(h.driver.state(), DriverState::Stopped);
    }

    #[test]
    fn test_explicit_stop_is_idempotent() {
        let mut h = harness(
            ScriptedSource::new(5, 64, 48),
            ScriptedDetector::default(),
            DebouncePolicy::EdgeTriggered,
        );
        h.driver.open().unwrap();
        h.driver.configure(None).unwrap();
        h.driver.step().unwrap();
        h.driver.stop();
        h.driver.stop();
        assert_eq!(h.driver.state(), DriverState::Stopped);
        assert_eq!(h.driver.step().unwrap(), StepOutcome::Stopped);
        assert_eq!(*h.shown.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_truncated_recording_stops_the_driver() {
        use crate::video::infrastructure::ffmpeg_source::tests::create_truncated_video;
        use crate::video::infrastructure::ffmpeg_source::FfmpegSource;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.mkv");
        create_truncated_video(&path, 60);

        let mut driver = PipelineDriver::new(
            Box::new(FfmpegSource::file(&path)),
            Arc::new(ScriptedDetector::default()),
            Box::new(NullAlertSink),
            DriverOptions::default(),
        );
        driver.open().unwrap();
        driver.configure(None).unwrap();
        let summary = driver.run().unwrap();

        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(summary.frames_processed >= 1);
        assert!(summary.frames_processed < 60);
        assert_eq!(driver.step().unwrap(), StepOutcome::Stopped);
    }
}
