pub mod domain;
pub mod frame_buffer;
pub mod infrastructure;
pub mod pipeline_logger;
pub mod processing_pipeline;
