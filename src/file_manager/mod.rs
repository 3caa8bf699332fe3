// File storage helpers
pub mod json_ops;

pub use json_ops::{initialize_json_file, read_json_file, read_json_file_or_default, write_json_file};
