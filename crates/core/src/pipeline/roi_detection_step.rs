use crate::annotation::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::{DetectionError, ObjectDetector};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;
use crate::shared::region_spec::RegionSpec;

/// Outcome of running detection on one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub annotated_frame: Frame,
    pub person_present: bool,
    /// Qualifying person detections, in full-frame coordinates.
    pub detections: Vec<Detection>,
}

/// Crops a frame to the region of interest, runs the detector on the crop
/// and maps the results back onto the full frame.
///
/// The input frame is never modified; annotation happens on a copy.
#[derive(Clone, Debug)]
pub struct RoiDetectionStep {
    annotator: FrameAnnotator,
    outline_region: bool,
}

impl RoiDetectionStep {
    pub fn new(annotator: FrameAnnotator, outline_region: bool) -> Self {
        Self {
            annotator,
            outline_region,
        }
    }

    pub fn process(
        &self,
        frame: &Frame,
        region: Option<&RegionSpec>,
        detector: &dyn ObjectDetector,
        confidence_threshold: f64,
    ) -> Result<DetectionResult, DetectionError> {
        let mut annotated = frame.clone();

        let (detections, active) = match region {
            None => (detector.predict(frame, confidence_threshold)?, None),
            Some(region) => {
                let Some(clamped) = region.clamp_to(frame.width(), frame.height()) else {
                    log::debug!(
                        "Frame {}: region {region} lies outside {}x{} frame, skipping detection",
                        frame.index(),
                        frame.width(),
                        frame.height()
                    );
                    return Ok(DetectionResult {
                        annotated_frame: annotated,
                        person_present: false,
                        detections: Vec::new(),
                    });
                };
                let crop = frame.crop(&clamped);
                let local = detector.predict(&crop, confidence_threshold)?;
                let mapped = local
                    .iter()
                    .map(|d| to_full_frame(d, &clamped))
                    .collect();
                (mapped, Some(clamped))
            }
        };

        if let Some(active) = active.as_ref().filter(|_| self.outline_region) {
            self.annotator.draw_region(&mut annotated, active);
        }

        let qualifying: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.qualifies(confidence_threshold))
            .collect();
        for det in &qualifying {
            self.annotator.draw_detection(&mut annotated, det);
        }

        Ok(DetectionResult {
            annotated_frame: annotated,
            person_present: !qualifying.is_empty(),
            detections: qualifying,
        })
    }
}

impl Default for RoiDetectionStep {
    fn default() -> Self {
        Self::new(FrameAnnotator::default(), true)
    }
}

/// Maps a detection produced on the cropped `region` back to full-frame
/// coordinates: a pure `(left, top)` shift.
pub fn to_full_frame(detection: &Detection, region: &RegionSpec) -> Detection {
    let (dx, dy) = region.origin();
    Detection {
        bbox: detection.bbox.translate(dx, dy),
        ..detection.clone()
    }
}
