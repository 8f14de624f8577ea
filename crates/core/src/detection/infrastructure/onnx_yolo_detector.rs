//! YOLOv8 object detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, and class-aware NMS. Boxes
//! are mapped back to the input image's own coordinates.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::object_detector::{DetectionError, ObjectDetector};
use crate::shared::constants::COCO_LABELS;
use crate::shared::detection::{BoundingBox, Detection};
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of box coordinates preceding the class scores in each output row.
const BOX_VALUES: usize = 4;

/// YOLOv8 detector backed by a shared ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: Mutex<ort::session::Session>,
    labels: Vec<String>,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLOv8 ONNX model with the COCO label set.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let labels = COCO_LABELS.iter().map(|s| s.to_string()).collect();
        Self::with_labels(model_path, labels)
    }

    pub fn with_labels(
        model_path: &Path,
        labels: Vec<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // [N, C, H, W], square input
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded detector {} (input {input_size}px, {} classes)",
            model_path.display(),
            labels.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_size,
        })
    }

    fn infer(&self, image: &Frame) -> Result<(Vec<f32>, Vec<usize>), Box<dyn std::error::Error>> {
        let (input_tensor, _, _, _) = letterbox(image, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_standard_layout()
            .as_slice()
            .ok_or("Cannot get tensor slice")?
            .to_vec();
        Ok((data, shape))
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn predict(&self, image: &Frame, confidence: f64) -> Result<Vec<Detection>, DetectionError> {
        if image.width() == 0 || image.height() == 0 || image.channels() != 3 {
            return Err(DetectionError::InvalidInput {
                width: image.width(),
                height: image.height(),
                reason: format!("expected non-empty RGB image, got {} channels", image.channels()),
            });
        }

        let (_, _, scale, pad_x, pad_y) = letterbox_geometry(image, self.input_size);
        let (data, shape) = self.infer(image).map_err(DetectionError::failed)?;
        let layout = OutputLayout::from_shape(&shape)
            .ok_or_else(|| DetectionError::failed(format!("Unexpected YOLO output shape: {shape:?}")))?;

        let mut raw_dets = decode_rows(&data, layout, confidence);
        for det in &mut raw_dets {
            det.bbox = unletterbox(&det.bbox, scale, pad_x, pad_y, image.width(), image.height());
        }
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|d| {
                let label = self
                    .labels
                    .get(d.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", d.class_id));
                Detection::new(label, d.confidence, d.bbox)
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Scale and padding that fit `frame` into a `target_size` square.
///
/// Returns `(new_w, new_h, scale, pad_x, pad_y)`.
fn letterbox_geometry(frame: &Frame, target_size: u32) -> (u32, u32, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;
    (new_w, new_h, scale, pad_x, pad_y)
}

/// Letterbox-resize a frame to `target_size` x `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let (new_w, new_h, scale, pad_x, pad_y) = letterbox_geometry(frame, target_size);

    // Padding uses 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded area
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Maps a box from letterbox space back to the source image, clipped to it.
fn unletterbox(
    bbox: &BoundingBox,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
    width: u32,
    height: u32,
) -> BoundingBox {
    let map_x = |v: f64| ((v - pad_x as f64) / scale).clamp(0.0, width as f64);
    let map_y = |v: f64| ((v - pad_y as f64) / scale).clamp(0.0, height as f64);
    BoundingBox::new(map_x(bbox.x1), map_y(bbox.y1), map_x(bbox.x2), map_y(bbox.y2))
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// How predictions are laid out in the flat output tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OutputLayout {
    num_dets: usize,
    num_feats: usize,
    /// `[1, features, detections]`, the stock YOLOv8 export.
    transposed: bool,
}

impl OutputLayout {
    fn from_shape(shape: &[usize]) -> Option<Self> {
        if shape.len() != 3 {
            return None;
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats <= BOX_VALUES {
            return None;
        }
        Some(Self {
            num_dets,
            num_feats,
            transposed,
        })
    }

    fn value(&self, data: &[f32], det: usize, feat: usize) -> f32 {
        if self.transposed {
            data[feat * self.num_dets + det]
        } else {
            data[det * self.num_feats + feat]
        }
    }
}

#[derive(Clone, Debug)]
struct RawDetection {
    bbox: BoundingBox,
    confidence: f64,
    class_id: usize,
}

/// Decodes `[cx, cy, w, h, score_0 .. score_n]` rows, keeping the best class
/// per row when its score reaches `confidence`.
fn decode_rows(data: &[f32], layout: OutputLayout, confidence: f64) -> Vec<RawDetection> {
    let mut dets = Vec::new();
    if data.len() < layout.num_dets * layout.num_feats {
        return dets;
    }
    for i in 0..layout.num_dets {
        let (class_id, score) = (BOX_VALUES..layout.num_feats)
            .map(|f| (f - BOX_VALUES, layout.value(data, i, f) as f64))
            .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < confidence {
            continue;
        }

        let cx = layout.value(data, i, 0) as f64;
        let cy = layout.value(data, i, 1) as f64;
        let w = layout.value(data, i, 2) as f64;
        let h = layout.value(data, i, 3) as f64;
        dets.push(RawDetection {
            bbox: BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
            confidence: score,
            class_id,
        });
    }
    dets
}

/// Greedy per-class NMS: sort by confidence descending, suppress overlapping
/// boxes of the same class.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] || dets[j].class_id != dets[i].class_id {
                continue;
            }
            if dets[i].bbox.iou(&dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
