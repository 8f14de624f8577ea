use serde::{Deserialize, Serialize};

/// Default minimum confidence for a detection to count.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Default minimum interval between alerts under the cooldown policy.
pub const DEFAULT_COOLDOWN_SECS: f64 = 2.0;

/// Upper bound on share-link resolution before the source is declared
/// unavailable.
pub const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 20;

/// Camera device opened when none is given.
pub const DEFAULT_CAMERA_DEVICE: &str = "0";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// YOLOv8 checkpoint size: a speed/accuracy tradeoff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    #[default]
    Small,
    Nano,
}

impl ModelVariant {
    pub fn model_file_name(&self) -> &'static str {
        match self {
            ModelVariant::Small => "yolov8s.onnx",
            ModelVariant::Nano => "yolov8n.onnx",
        }
    }
}

impl std::str::FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(ModelVariant::Small),
            "nano" | "n" => Ok(ModelVariant::Nano),
            other => Err(format!("unknown model variant '{other}' (expected small or nano)")),
        }
    }
}

/// COCO class names in YOLOv8 output order.
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];
