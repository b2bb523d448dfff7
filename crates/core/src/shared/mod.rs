pub mod cancellation;
pub mod constants;
pub mod frame_set;
pub mod model_resolver;
pub mod video_asset;
