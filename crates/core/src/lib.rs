//! Region-gated person detection: read frames from a file, stream or camera,
//! detect people inside a region of interest, and raise debounced alerts.

pub mod alerting;
pub mod annotation;
pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod video;
