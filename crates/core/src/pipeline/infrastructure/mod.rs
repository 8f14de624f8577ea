pub mod image_file_display;
