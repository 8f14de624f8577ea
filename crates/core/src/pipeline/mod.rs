pub mod frame_display;
pub mod infrastructure;
pub mod pipeline_driver;
pub mod pipeline_logger;
pub mod region_input;
pub mod roi_detection_step;
pub mod session_config;
