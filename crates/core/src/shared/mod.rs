pub mod constants;
pub mod detection;
pub mod frame;
pub mod region_spec;
pub mod stream_info;
