pub mod batch_scheduler;
pub mod frame_extractor;
pub mod locate_config;
pub mod locate_error;
pub mod locate_match_use_case;
pub mod pipeline_logger;
pub mod run_context;
