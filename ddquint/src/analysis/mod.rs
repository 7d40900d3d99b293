pub mod clustering;
pub mod copy_number;
pub mod file_processor;
