//! Services layer for separating I/O and batch orchestration from the
//! pixel stages

pub mod batch;
pub mod io;

pub use batch::{
    discover_inputs, output_file_name, plan_jobs, prepare_output_dir, sanitize_filename,
    validate_input_dir, BatchJob, BatchOptions, BatchProcessor, BatchSummary, FileOutcome,
};
pub use io::ImageIOService;
