pub mod object_detector;
